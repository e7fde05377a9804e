use serde::de::DeserializeOwned;

use crate::models::{ItemKind, PlaylistDraft, RecommendationRequest, SearchQuery};
use crate::token::AccessToken;
use crate::user_auth::UserToken;
use crate::utils::Upstream;
use crate::{Error, Result, LOG};

pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const API_URL: &str = "https://api.spotify.com/v1";

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl Credentials {
    /// `Basic` authorization value for the accounts service
    pub fn basic_auth(&self) -> Result<String> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(Error::Config(
                "SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set".into(),
            ));
        }
        let auth = base64::encode(format!("{}:{}", self.client_id, self.client_secret).as_bytes());
        Ok(format!("Basic {}", auth))
    }
}

/// Response of the accounts token endpoint, for every grant type
#[derive(serde::Deserialize, Clone)]
pub struct SpotifyAccess {
    pub access_token: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for SpotifyAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyAccess")
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(serde::Serialize)]
struct ClientCredentialsParams {
    grant_type: &'static str,
}

#[derive(serde::Serialize)]
struct SpotifyAccessParams<'a> {
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: &'a str,
}

#[derive(serde::Serialize)]
struct RefreshParams<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

/// Exchange a form of `params` at the accounts service for an access token.
/// A 400 from the accounts service means bad client credentials or a bad
/// grant, neither of which improves with a retry.
async fn token_request<P: serde::Serialize>(
    token_url: &str,
    credentials: &Credentials,
    upstream: &Upstream,
    params: &P,
) -> Result<SpotifyAccess> {
    let auth = credentials.basic_auth()?;
    let auth = auth.as_str();
    upstream
        .call("token", move || async move {
            let body = surf::Body::from_form(params)
                .map_err(|e| Error::Config(format!("form error {}", e)))?;
            let resp = surf::post(token_url)
                .body(body)
                .header("authorization", auth)
                .header("accept", "application/json")
                .send()
                .await
                .map_err(|e| Error::Transport(format!("account request error {}", e)))?;
            match resp.status() as u16 {
                400 => {
                    let message = error_body(resp).await;
                    Err(Error::Unauthorized {
                        status: 400,
                        message,
                    })
                }
                _ => read_json(resp).await,
            }
        })
        .await
}

pub async fn client_credentials_token(
    token_url: &str,
    credentials: &Credentials,
    upstream: &Upstream,
) -> Result<SpotifyAccess> {
    let params = ClientCredentialsParams {
        grant_type: "client_credentials",
    };
    token_request(token_url, credentials, upstream, &params).await
}

pub async fn new_spotify_access_token(
    token_url: &str,
    credentials: &Credentials,
    upstream: &Upstream,
    code: &str,
    redirect_uri: &str,
) -> Result<SpotifyAccess> {
    let params = SpotifyAccessParams {
        grant_type: "authorization_code",
        code,
        redirect_uri,
    };
    token_request(token_url, credentials, upstream, &params).await
}

pub async fn refresh_access_token(
    token_url: &str,
    credentials: &Credentials,
    upstream: &Upstream,
    refresh_token: &str,
) -> Result<SpotifyAccess> {
    let params = RefreshParams {
        grant_type: "refresh_token",
        refresh_token,
    };
    token_request(token_url, credentials, upstream, &params).await
}

async fn error_body(mut resp: surf::Response) -> String {
    resp.body_string()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e))
}

async fn check_status(resp: surf::Response) -> Result<surf::Response> {
    let status = resp.status() as u16;
    if (200..300).contains(&status) {
        return Ok(resp);
    }
    let message = error_body(resp).await;
    Err(Error::from_status(status, message))
}

async fn read_json<T: DeserializeOwned>(resp: surf::Response) -> Result<T> {
    let mut resp = check_status(resp).await?;
    resp.body_json()
        .await
        .map_err(|e| Error::Decode(format!("json parse error {}", e)))
}

#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
pub struct TracksRef {
    pub total: u32,
}

#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
pub struct SimplePlaylist {
    pub name: String,
    pub uri: String,
    pub id: String,
    pub href: String,
    #[serde(default)]
    pub tracks: Option<TracksRef>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl SimplePlaylist {
    pub fn track_count(&self) -> u32 {
        self.tracks.as_ref().map(|t| t.total).unwrap_or(0)
    }
}

#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
pub struct SimpleArtist {
    pub name: String,
}

#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
pub struct SimpleAlbum {
    pub name: String,
    pub uri: String,
    pub id: String,
    pub href: String,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

/// A page of results. Search pages can contain `null` entries
/// for items that were removed after indexing.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<Option<T>>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub total: u32,
}

impl<T> Paging<T> {
    #[cfg(test)]
    pub fn new(items: Vec<T>, next: Option<String>) -> Self {
        Self {
            total: items.len() as u32,
            items: items.into_iter().map(Some).collect(),
            next,
        }
    }

    pub fn into_items(self) -> Vec<T> {
        self.items.into_iter().flatten().collect()
    }
}

#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    #[serde(default)]
    pub playlists: Option<Paging<SimplePlaylist>>,
    #[serde(default)]
    pub albums: Option<Paging<SimpleAlbum>>,
}

#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub uri: String,
}

#[derive(serde::Deserialize, Debug)]
struct Recommendations {
    tracks: Vec<Track>,
}

/// A playlist as returned when creating one
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub uri: String,
    pub href: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(serde::Serialize)]
struct NewPlaylist<'a> {
    name: &'a str,
    public: bool,
    collaborative: bool,
    description: &'a str,
}

#[derive(serde::Serialize)]
struct PlaylistUris<'a> {
    uris: &'a [String],
}

/// Everything we ask of the spotify web api. Search only needs the
/// application's own token, everything touching an account takes a
/// user-authorized token.
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    async fn search(&self, token: &AccessToken, query: &SearchQuery) -> Result<SearchResponse>;

    async fn recommendations(
        &self,
        token: &UserToken,
        request: &RecommendationRequest,
    ) -> Result<Vec<Track>>;

    async fn create_playlist(&self, token: &UserToken, draft: &PlaylistDraft) -> Result<Playlist>;

    async fn replace_playlist_tracks(
        &self,
        token: &UserToken,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<()>;

    async fn current_user(&self, token: &UserToken) -> Result<Profile>;

    /// First page of the user's playlists when `next` is `None`,
    /// otherwise the page at the `next` url of a previous page.
    async fn playlists_page(
        &self,
        token: &UserToken,
        next: Option<&str>,
    ) -> Result<Paging<SimplePlaylist>>;
}

pub struct SpotifyCatalog {
    api_url: String,
    upstream: Upstream,
}

impl SpotifyCatalog {
    pub fn new(api_url: impl Into<String>, upstream: Upstream) -> Self {
        Self {
            api_url: api_url.into(),
            upstream,
        }
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<surf::Url> {
        let url = format!("{}{}", self.api_url, path);
        surf::Url::parse_with_params(&url, params)
            .map_err(|e| Error::Config(format!("invalid spotify url {}: {}", url, e)))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        what: &str,
        url: &surf::Url,
        bearer: &str,
    ) -> Result<T> {
        self.upstream
            .call(what, move || async move {
                let resp = surf::get(url.clone())
                    .header("authorization", bearer)
                    .send()
                    .await
                    .map_err(|e| Error::Transport(format!("{} error {}", what, e)))?;
                read_json(resp).await
            })
            .await
    }
}

#[async_trait::async_trait]
impl Catalog for SpotifyCatalog {
    async fn search(&self, token: &AccessToken, query: &SearchQuery) -> Result<SearchResponse> {
        let url = self.url(
            "/search",
            &[
                ("q", query.term.clone()),
                ("type", query.kind.as_str().to_string()),
                ("limit", query.limit.to_string()),
                ("offset", query.offset.to_string()),
            ],
        )?;
        slog::debug!(LOG, "searching spotify"; "url" => url.as_str());
        let resp: SearchResponse = self.get_json("search", &url, &token.bearer()).await?;
        let missing = match query.kind {
            ItemKind::Playlist => resp.playlists.is_none(),
            ItemKind::Album => resp.albums.is_none(),
        };
        if missing {
            return Err(Error::Decode(format!(
                "search response without {} results",
                query.kind.as_str()
            )));
        }
        Ok(resp)
    }

    async fn recommendations(
        &self,
        token: &UserToken,
        request: &RecommendationRequest,
    ) -> Result<Vec<Track>> {
        let mut params = vec![
            ("limit", request.limit.to_string()),
            ("market", request.market.to_string()),
            ("target_popularity", request.target_popularity.to_string()),
        ];
        if let Some(genres) = &request.seed_genres {
            params.push(("seed_genres", genres.join(",")));
        }
        let url = self.url("/recommendations", &params)?;
        let resp: Recommendations = self
            .get_json("recommendations", &url, &token.bearer())
            .await?;
        Ok(resp.tracks)
    }

    async fn create_playlist(&self, token: &UserToken, draft: &PlaylistDraft) -> Result<Playlist> {
        let url = self.url(&format!("/users/{}/playlists", draft.owner), &[])?;
        let bearer = token.bearer();
        let new_playlist = NewPlaylist {
            name: &draft.name,
            public: draft.public,
            collaborative: draft.collaborative,
            description: &draft.description,
        };
        // not retried, a retry after a lost response would create a duplicate
        self.upstream
            .once(async {
                let body = surf::Body::from_json(&new_playlist)
                    .map_err(|e| Error::Config(format!("json body error {}", e)))?;
                let resp = surf::post(url)
                    .body(body)
                    .header("authorization", bearer.as_str())
                    .send()
                    .await
                    .map_err(|e| Error::Transport(format!("create playlist error {}", e)))?;
                read_json(resp).await
            })
            .await
    }

    async fn replace_playlist_tracks(
        &self,
        token: &UserToken,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<()> {
        let url = &self.url(&format!("/playlists/{}/tracks", playlist_id), &[])?;
        let bearer = token.bearer();
        let bearer = bearer.as_str();
        self.upstream
            .call("replace playlist tracks", move || async move {
                let body = surf::Body::from_json(&PlaylistUris { uris })
                    .map_err(|e| Error::Config(format!("json body error {}", e)))?;
                let resp = surf::put(url.clone())
                    .body(body)
                    .header("authorization", bearer)
                    .send()
                    .await
                    .map_err(|e| Error::Transport(format!("replace tracks error {}", e)))?;
                check_status(resp).await.map(|_| ())
            })
            .await
    }

    async fn current_user(&self, token: &UserToken) -> Result<Profile> {
        let url = self.url("/me", &[])?;
        self.get_json("current user", &url, &token.bearer()).await
    }

    async fn playlists_page(
        &self,
        token: &UserToken,
        next: Option<&str>,
    ) -> Result<Paging<SimplePlaylist>> {
        let url = match next {
            Some(next) => surf::Url::parse(next)
                .map_err(|e| Error::Decode(format!("invalid next page url {}: {}", next, e)))?,
            None => self.url("/me/playlists", &[("limit", "50".to_string())])?,
        };
        self.get_json("user playlists", &url, &token.bearer()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_encodes_id_and_secret() {
        let creds = Credentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
        };
        assert_eq!(creds.basic_auth().unwrap(), "Basic aWQ6c2VjcmV0");
    }

    #[test]
    fn debug_hides_the_secret() {
        let creds = Credentials {
            client_id: "id".into(),
            client_secret: "very-secret".into(),
        };
        let out = format!("{:?}", creds);
        assert!(out.contains("\"id\""));
        assert!(!out.contains("very-secret"));
    }

    #[test]
    fn missing_credentials_are_a_config_error() {
        let creds = Credentials {
            client_id: "id".into(),
            client_secret: "".into(),
        };
        assert!(matches!(creds.basic_auth(), Err(Error::Config(_))));
    }

    #[test]
    fn search_pages_drop_null_items() {
        let resp: SearchResponse = serde_json::from_value(serde_json::json!({
            "playlists": {
                "items": [
                    null,
                    {"name": "a", "uri": "spotify:playlist:a", "id": "a",
                     "href": "https://api.spotify.com/v1/playlists/a", "tracks": {"total": 3}},
                    null
                ],
                "next": null,
                "total": 3
            }
        }))
        .unwrap();
        let items = resp.playlists.unwrap().into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].track_count(), 3);
    }

    #[test]
    fn search_url_encodes_wildcards() {
        let catalog = SpotifyCatalog::new(API_URL, Upstream::new(std::time::Duration::from_secs(1), 0));
        let url = catalog
            .url(
                "/search",
                &[("q", "%q%".to_string()), ("type", "album".to_string())],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.spotify.com/v1/search?q=%25q%25&type=album"
        );
    }

    #[test]
    fn token_response_without_refresh_token() {
        let access: SpotifyAccess = serde_json::from_value(serde_json::json!({
            "access_token": "abc",
            "token_type": "Bearer",
            "expires_in": 3600
        }))
        .unwrap();
        assert_eq!(access.access_token, "abc");
        assert!(!format!("{:?}", access).contains("abc"));
        assert!(access.refresh_token.is_none());
        assert!(access.scope.is_none());
    }
}
