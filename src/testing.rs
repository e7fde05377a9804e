//! In-memory stand-ins for spotify used across the unit tests
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::{ItemKind, PlaylistDraft, RecommendationRequest, SearchQuery};
use crate::names::NameGenerator;
use crate::spotify::{
    Catalog, ExternalUrls, Paging, Playlist, Profile, SearchResponse, SimpleAlbum, SimpleArtist,
    SimplePlaylist, SpotifyAccess, Track, TracksRef,
};
use crate::token::{AccessToken, TokenSource};
use crate::user_auth::{UserAuthorizer, UserToken};
use crate::{Error, Result};

pub struct MockTokenSource {
    fetches: AtomicUsize,
    delay: Option<Duration>,
    expires_in: u64,
    fail_next: Mutex<Option<Error>>,
}

impl MockTokenSource {
    pub fn new() -> Self {
        Self {
            fetches: AtomicUsize::new(0),
            delay: None,
            expires_in: 3600,
            fail_next: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_expires_in(mut self, expires_in: u64) -> Self {
        self.expires_in = expires_in;
        self
    }

    pub fn fail_next(&self, e: Error) {
        *self.fail_next.lock().unwrap() = Some(e);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TokenSource for MockTokenSource {
    async fn fetch(&self) -> Result<AccessToken> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            async_std::task::sleep(delay).await;
        }
        let failure = self.fail_next.lock().unwrap().take();
        if let Some(e) = failure {
            return Err(e);
        }
        Ok(AccessToken::new(format!("token-{}", n), self.expires_in))
    }
}

pub struct MockAuthorizer {
    pub expires_in: u64,
    pub rotate_refresh_token: bool,
    pub reject_refresh: AtomicBool,
    pub exchanges: Mutex<Vec<String>>,
    pub refreshes: Mutex<Vec<String>>,
}

impl MockAuthorizer {
    pub fn new() -> Self {
        Self {
            expires_in: 3600,
            rotate_refresh_token: false,
            reject_refresh: AtomicBool::new(false),
            exchanges: Mutex::new(vec![]),
            refreshes: Mutex::new(vec![]),
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl UserAuthorizer for MockAuthorizer {
    async fn exchange_code(&self, code: &str) -> Result<SpotifyAccess> {
        self.exchanges.lock().unwrap().push(code.to_string());
        Ok(SpotifyAccess {
            access_token: format!("user-access-{}", code),
            scope: Some("playlist-modify-public playlist-read-private".into()),
            expires_in: self.expires_in,
            refresh_token: Some(format!("refresh-{}", code)),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SpotifyAccess> {
        let n = {
            let mut refreshes = self.refreshes.lock().unwrap();
            refreshes.push(refresh_token.to_string());
            refreshes.len()
        };
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(Error::Unauthorized {
                status: 400,
                message: "invalid_grant".into(),
            });
        }
        Ok(SpotifyAccess {
            access_token: format!("refreshed-{}", n),
            scope: None,
            expires_in: self.expires_in,
            refresh_token: if self.rotate_refresh_token {
                Some(format!("rotated-{}", n))
            } else {
                None
            },
        })
    }
}

pub fn playlist(id: &str, tracks: u32) -> SimplePlaylist {
    SimplePlaylist {
        name: format!("playlist {}", id),
        uri: format!("spotify:playlist:{}", id),
        id: id.to_string(),
        href: format!("https://api.spotify.com/v1/playlists/{}", id),
        tracks: Some(TracksRef { total: tracks }),
        external_urls: ExternalUrls {
            spotify: Some(format!("https://open.spotify.com/playlist/{}", id)),
        },
    }
}

pub fn album(id: &str, artists: &[&str]) -> SimpleAlbum {
    SimpleAlbum {
        name: format!("album {}", id),
        uri: format!("spotify:album:{}", id),
        id: id.to_string(),
        href: format!("https://api.spotify.com/v1/albums/{}", id),
        artists: artists
            .iter()
            .map(|name| SimpleArtist {
                name: name.to_string(),
            })
            .collect(),
        external_urls: ExternalUrls::default(),
    }
}

pub fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        name: format!("track {}", id),
        uri: format!("spotify:track:{}", id),
    }
}

#[derive(Default)]
pub struct MockCatalog {
    pub search_response: Mutex<SearchResponse>,
    pub tracks: Mutex<Vec<Track>>,
    pub pages: Mutex<Vec<Paging<SimplePlaylist>>>,
    pub fail_replace: AtomicBool,
    pub searches: Mutex<Vec<SearchQuery>>,
    pub search_bearers: Mutex<Vec<String>>,
    pub recommendation_requests: Mutex<Vec<RecommendationRequest>>,
    pub drafts: Mutex<Vec<PlaylistDraft>>,
    pub replaced: Mutex<Vec<(String, Vec<String>)>>,
    pub page_requests: Mutex<Vec<Option<String>>>,
}

impl MockCatalog {
    pub fn with_playlists(playlists: Vec<SimplePlaylist>) -> Self {
        let catalog = Self::default();
        *catalog.search_response.lock().unwrap() = SearchResponse {
            playlists: Some(Paging::new(playlists, None)),
            albums: None,
        };
        catalog
    }

    pub fn with_albums(albums: Vec<SimpleAlbum>) -> Self {
        let catalog = Self::default();
        *catalog.search_response.lock().unwrap() = SearchResponse {
            playlists: None,
            albums: Some(Paging::new(albums, None)),
        };
        catalog
    }

    pub fn with_tracks(tracks: Vec<Track>) -> Self {
        let catalog = Self::default();
        *catalog.tracks.lock().unwrap() = tracks;
        catalog
    }

    pub fn searches(&self) -> Vec<SearchQuery> {
        self.searches.lock().unwrap().clone()
    }

    pub fn drafts(&self) -> Vec<PlaylistDraft> {
        self.drafts.lock().unwrap().clone()
    }

    pub fn replaced(&self) -> Vec<(String, Vec<String>)> {
        self.replaced.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Catalog for MockCatalog {
    async fn search(&self, token: &AccessToken, query: &SearchQuery) -> Result<SearchResponse> {
        self.searches.lock().unwrap().push(query.clone());
        self.search_bearers.lock().unwrap().push(token.bearer());
        let resp = self.search_response.lock().unwrap().clone();
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
        _token: &UserToken,
        request: &RecommendationRequest,
    ) -> Result<Vec<Track>> {
        self.recommendation_requests
            .lock()
            .unwrap()
            .push(request.clone());
        Ok(self.tracks.lock().unwrap().clone())
    }

    async fn create_playlist(&self, _token: &UserToken, draft: &PlaylistDraft) -> Result<Playlist> {
        self.drafts.lock().unwrap().push(draft.clone());
        Ok(Playlist {
            id: "new-playlist".into(),
            name: draft.name.clone(),
            uri: "spotify:playlist:new-playlist".into(),
            href: "https://api.spotify.com/v1/playlists/new-playlist".into(),
            external_urls: ExternalUrls::default(),
        })
    }

    async fn replace_playlist_tracks(
        &self,
        _token: &UserToken,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<()> {
        if self.fail_replace.load(Ordering::SeqCst) {
            return Err(Error::from_status(500, "server error"));
        }
        self.replaced
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), uris.to_vec()));
        Ok(())
    }

    async fn current_user(&self, _token: &UserToken) -> Result<Profile> {
        Ok(Profile {
            id: "someone".into(),
            display_name: Some("Some One".into()),
        })
    }

    async fn playlists_page(
        &self,
        _token: &UserToken,
        next: Option<&str>,
    ) -> Result<Paging<SimplePlaylist>> {
        self.page_requests
            .lock()
            .unwrap()
            .push(next.map(|s| s.to_string()));
        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            return Ok(Paging::new(vec![], None));
        }
        Ok(pages.remove(0))
    }
}

pub struct FixedName(pub &'static str);

impl NameGenerator for FixedName {
    fn generate(&self) -> String {
        self.0.to_string()
    }
}
