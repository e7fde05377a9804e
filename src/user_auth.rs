/*!
User-authorized tokens

Creating playlists happens on behalf of an account, which needs a token
the account owner granted through spotify's authorization-code flow.
The service keeps exactly one such token: the one for the account that
generated playlists are created under.
*/
use std::fmt;
use std::sync::Arc;

use async_mutex::Mutex;
use cached::stores::TimedCache;
use cached::Cached;

use crate::spotify::{self, Credentials, SpotifyAccess};
use crate::utils::{self, Upstream};
use crate::{Error, Result, LOG};

pub const SCOPES: &str = "playlist-modify-public playlist-modify-private playlist-read-private";

#[derive(Clone)]
pub struct UserToken {
    pub access_token: String,
    pub refresh_token: String,
    pub scopes: Vec<String>,
    // epoch seconds, already includes a minute of slack
    pub expires_at: i64,
}

impl UserToken {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        scopes: Vec<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            scopes,
            expires_at,
        }
    }

    /// Build a token from an accounts response. Refreshes don't always
    /// hand out a new refresh token, in which case the previous one
    /// stays valid.
    pub fn from_access(access: SpotifyAccess, previous: Option<&UserToken>) -> Result<Self> {
        let refresh_token = access
            .refresh_token
            .or_else(|| previous.map(|p| p.refresh_token.clone()))
            .ok_or_else(|| {
                Error::InsufficientAuthorization("spotify did not issue a refresh token".into())
            })?;
        let scopes = match access.scope {
            Some(scope) => scope.split_whitespace().map(|s| s.to_string()).collect(),
            None => previous.map(|p| p.scopes.clone()).unwrap_or_default(),
        };
        Ok(Self {
            access_token: access.access_token,
            refresh_token,
            scopes,
            expires_at: utils::spotify_expiry_seconds_to_epoch_expiration(access.expires_in),
        })
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= utils::now_seconds()
    }
}

impl fmt::Debug for UserToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserToken")
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[async_trait::async_trait]
pub trait UserAuthorizer: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<SpotifyAccess>;
    async fn refresh(&self, refresh_token: &str) -> Result<SpotifyAccess>;
}

pub struct SpotifyAuthorizer {
    token_url: String,
    credentials: Credentials,
    redirect_url: String,
    upstream: Upstream,
}

impl SpotifyAuthorizer {
    pub fn new(
        token_url: impl Into<String>,
        credentials: Credentials,
        redirect_url: impl Into<String>,
        upstream: Upstream,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            credentials,
            redirect_url: redirect_url.into(),
            upstream,
        }
    }
}

#[async_trait::async_trait]
impl UserAuthorizer for SpotifyAuthorizer {
    async fn exchange_code(&self, code: &str) -> Result<SpotifyAccess> {
        spotify::new_spotify_access_token(
            &self.token_url,
            &self.credentials,
            &self.upstream,
            code,
            &self.redirect_url,
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SpotifyAccess> {
        spotify::refresh_access_token(
            &self.token_url,
            &self.credentials,
            &self.upstream,
            refresh_token,
        )
        .await
    }
}

enum Slot {
    Empty,
    // a configured refresh token nobody has exchanged yet
    Seeded(String),
    Ready(UserToken),
}

pub struct UserTokenStore {
    authorizer: Arc<dyn UserAuthorizer>,
    slot: Mutex<Slot>,
}

impl UserTokenStore {
    pub fn new(authorizer: Arc<dyn UserAuthorizer>, seed_refresh_token: Option<String>) -> Self {
        let slot = match seed_refresh_token {
            Some(token) => Slot::Seeded(token),
            None => Slot::Empty,
        };
        Self {
            authorizer,
            slot: Mutex::new(slot),
        }
    }

    /// The current user token, refreshed if it has expired. Fails with
    /// `InsufficientAuthorization` when no account has authorized us.
    pub async fn user_token(&self) -> Result<UserToken> {
        let mut slot = self.slot.lock().await;
        let previous = match &*slot {
            Slot::Empty => {
                return Err(Error::InsufficientAuthorization(
                    "no spotify account has authorized playlist changes, visit /login".into(),
                ))
            }
            Slot::Ready(token) if !token.is_expired() => return Ok(token.clone()),
            Slot::Ready(token) => token.clone(),
            Slot::Seeded(refresh_token) => UserToken::new("", refresh_token.clone(), vec![], 0),
        };

        slog::info!(LOG, "refreshing user access token");
        let access = match self.authorizer.refresh(&previous.refresh_token).await {
            Ok(access) => access,
            Err(Error::Unauthorized { status, message }) => {
                slog::error!(
                    LOG, "spotify rejected the user refresh token";
                    "status" => status, "message" => &message,
                );
                *slot = Slot::Empty;
                return Err(Error::InsufficientAuthorization(format!(
                    "user authorization was revoked or expired, visit /login: {}",
                    message
                )));
            }
            Err(e) => return Err(e),
        };
        let token = UserToken::from_access(access, Some(&previous))?;
        *slot = Slot::Ready(token.clone());
        Ok(token)
    }

    /// Complete the authorization-code flow, replacing any existing token
    pub async fn authorize(&self, code: &str) -> Result<UserToken> {
        let access = match self.authorizer.exchange_code(code).await {
            Ok(access) => access,
            Err(Error::Unauthorized { message, .. }) => {
                return Err(Error::BadRequest(format!(
                    "spotify rejected the authorization code: {}",
                    message
                )))
            }
            Err(e) => return Err(e),
        };
        let token = UserToken::from_access(access, None)?;
        let mut slot = self.slot.lock().await;
        *slot = Slot::Ready(token.clone());
        slog::info!(LOG, "stored user access token"; "scopes" => token.scopes.join(" "));
        Ok(token)
    }
}

/// One-time `state` values handed to spotify's authorize page, so an
/// authorization callback is only accepted once and only if we started it.
pub struct LoginStates {
    cache: Mutex<TimedCache<String, ()>>,
}

impl LoginStates {
    pub fn new(lifespan_seconds: u64) -> Self {
        Self {
            cache: Mutex::new(TimedCache::with_lifespan(lifespan_seconds)),
        }
    }

    pub async fn issue(&self) -> String {
        let s = uuid::Uuid::new_v4().simple().to_string();
        let mut lock = self.cache.lock().await;
        // abandoned logins are never read again, so expire them here
        lock.flush();
        lock.cache_set(s.clone(), ());
        s
    }

    pub async fn consume(&self, state: &str) -> bool {
        let mut lock = self.cache.lock().await;
        lock.cache_remove(&state.to_string()).is_some()
    }
}

pub fn authorize_url(client_id: &str, redirect_url: &str, state: &str) -> Result<surf::Url> {
    surf::Url::parse_with_params(
        spotify::AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("response_type", "code"),
            ("redirect_uri", redirect_url),
            ("scope", SCOPES),
            ("state", state),
        ],
    )
    .map_err(|e| Error::Config(format!("invalid authorize url: {}", e)))
}
