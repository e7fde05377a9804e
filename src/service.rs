use std::sync::Arc;

use crate::config::Config;
use crate::discovery::Discovery;
use crate::models::ItemKind;
use crate::names::WordNames;
use crate::spotify::SpotifyCatalog;
use crate::token::{SpotifyTokenSource, TokenCache};
use crate::user_auth::{self, LoginStates, SpotifyAuthorizer, UserTokenStore};
use crate::{resp, Error, LOG};

/// One-time login states expire if spotify doesn't call back in time
pub const LOGIN_STATE_SECONDS: u64 = 300;

#[derive(Clone)]
pub struct Context {
    pub discovery: Arc<Discovery>,
    pub users: Arc<UserTokenStore>,
    pub login_states: Arc<LoginStates>,
    pub client_id: String,
    pub redirect_url: String,
    pub version: String,
}

impl Context {
    pub fn new(
        discovery: Arc<Discovery>,
        users: Arc<UserTokenStore>,
        client_id: impl Into<String>,
        redirect_url: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            discovery,
            users,
            login_states: Arc::new(LoginStates::new(LOGIN_STATE_SECONDS)),
            client_id: client_id.into(),
            redirect_url: redirect_url.into(),
            version: version.into(),
        }
    }

    /// Wire up the spotify backed components
    pub fn from_config(config: &Config) -> Self {
        let upstream = config.upstream();
        let tokens = Arc::new(TokenCache::new(
            Arc::new(SpotifyTokenSource::new(
                &config.spotify_token_url,
                config.credentials(),
                upstream.clone(),
            )),
            config.token_cache_seconds,
        ));
        let users = Arc::new(UserTokenStore::new(
            Arc::new(SpotifyAuthorizer::new(
                &config.spotify_token_url,
                config.credentials(),
                config.spotify_redirect_url(),
                upstream.clone(),
            )),
            config.spotify_refresh_token.clone(),
        ));
        let discovery = Arc::new(Discovery::new(
            Arc::new(SpotifyCatalog::new(&config.spotify_api_url, upstream)),
            tokens,
            users.clone(),
            Arc::new(WordNames),
            &config.spotify_account_id,
        ));
        Self::new(
            discovery,
            users,
            &config.spotify_client_id,
            config.spotify_redirect_url(),
            &config.version,
        )
    }
}

pub fn app(ctx: Context) -> tide::Server<Context> {
    let mut app = tide::with_state(ctx);
    app.at("/status").get(status);
    app.at("/playlist").get(playlist);
    app.at("/album").get(album);
    app.at("/generate").get(generate);
    app.at("/login").get(login);
    app.at("/auth").get(auth_callback);
    app.at("/me/playlists").get(account_playlists);
    app.with(crate::logging::LogMiddleware::new());
    app
}

pub async fn start(ctx: Context, host: String) -> anyhow::Result<()> {
    let app = app(ctx);
    slog::info!(LOG, "running at {}", host);
    app.listen(host).await?;
    Ok(())
}

/// Json `{"error": ..}` response carrying the error's status. A partial
/// playlist also returns the playlist that was left behind.
fn error_response(e: &Error) -> tide::Response {
    let status = e.status();
    match e {
        Error::NotFound(_) | Error::BadRequest(_) | Error::InsufficientAuthorization(_) => {
            slog::info!(LOG, "request not served"; "status" => status, "error" => e.to_string());
        }
        _ => {
            slog::error!(LOG, "request failed"; "status" => status, "error" => e.to_string());
        }
    }
    let body = match e {
        Error::PartialPlaylist { playlist, .. } => serde_json::json!({
            "error": e.to_string(),
            "playlist": playlist,
        }),
        _ => serde_json::json!({ "error": e.to_string() }),
    };
    tide::Response::builder(status).body(body).build()
}

macro_rules! json_or_error {
    ($res:expr) => {{
        match $res {
            Ok(value) => Ok(resp!(json => value)),
            Err(e) => Ok(error_response(&e)),
        }
    }};
}

#[derive(serde::Serialize)]
struct Status<'a> {
    ok: &'a str,
    version: &'a str,
}

async fn status(req: tide::Request<Context>) -> tide::Result {
    Ok(resp!(json => Status {
        ok: "ok",
        version: &req.state().version,
    }))
}

#[derive(serde::Deserialize)]
struct KeywordParams {
    #[serde(default)]
    keyword: String,
}

macro_rules! keyword_or_error {
    ($req:expr) => {{
        match $req.query::<KeywordParams>() {
            Err(e) => {
                return Ok(error_response(&Error::BadRequest(format!(
                    "invalid query parameters: {}",
                    e
                ))));
            }
            Ok(params) => params.keyword,
        }
    }};
}

async fn discover(req: tide::Request<Context>, kind: ItemKind) -> tide::Result {
    let keyword = keyword_or_error!(req);
    json_or_error!(req.state().discovery.random_discovery(&keyword, kind).await)
}

async fn playlist(req: tide::Request<Context>) -> tide::Result {
    discover(req, ItemKind::Playlist).await
}

async fn album(req: tide::Request<Context>) -> tide::Result {
    discover(req, ItemKind::Album).await
}

async fn generate(req: tide::Request<Context>) -> tide::Result {
    let keyword = keyword_or_error!(req);
    json_or_error!(req.state().discovery.generate_playlist(&keyword).await)
}

async fn account_playlists(req: tide::Request<Context>) -> tide::Result {
    json_or_error!(req.state().discovery.account_playlists().await)
}

/// Send the account owner to spotify to grant playlist access.
/// Spotify redirects back to `/auth` with a code and our state token.
async fn login(req: tide::Request<Context>) -> tide::Result {
    let ctx = req.state();
    let state = ctx.login_states.issue().await;
    let url = match user_auth::authorize_url(&ctx.client_id, &ctx.redirect_url, &state) {
        Ok(url) => url,
        Err(e) => return Ok(error_response(&e)),
    };
    slog::info!(LOG, "redirecting to spotify-auth"; "state" => &state);
    Ok(tide::Redirect::new(url.to_string()).into())
}

#[derive(serde::Deserialize)]
struct AuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(serde::Serialize)]
struct Authorized {
    ok: &'static str,
    scopes: Vec<String>,
}

async fn auth_callback(req: tide::Request<Context>) -> tide::Result {
    let ctx = req.state();
    let callback: AuthCallback = match req.query() {
        Ok(callback) => callback,
        Err(e) => {
            return Ok(error_response(&Error::BadRequest(format!(
                "invalid auth callback: {}",
                e
            ))))
        }
    };
    let state = callback.state.unwrap_or_default();
    if !ctx.login_states.consume(&state).await {
        return Ok(error_response(&Error::BadRequest(format!(
            "invalid one-time login token {:?}",
            state
        ))));
    }
    if let Some(error) = callback.error {
        return Ok(error_response(&Error::BadRequest(format!(
            "spotify authorization denied: {}",
            error
        ))));
    }
    let code = match callback.code {
        Some(code) if !code.is_empty() => code,
        _ => {
            return Ok(error_response(&Error::BadRequest(
                "auth callback without a code".into(),
            )))
        }
    };
    slog::info!(LOG, "completing spotify authorization");
    json_or_error!(ctx.users.authorize(&code).await.map(|token| Authorized {
        ok: "ok",
        scopes: token.scopes,
    }))
}
