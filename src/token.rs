/*!
Client-credentials tokens

The application's own token is only good for catalog reads (search).
It's cached under a single key with a sliding expiration so that most
requests never touch the accounts service.
*/
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_mutex::Mutex;
use cached::stores::TimedCache;
use cached::Cached;

use crate::spotify::{self, Credentials, SpotifyAccess};
use crate::utils::Upstream;
use crate::{Result, LOG};

pub const ACCESS_TOKEN_KEY: &str = "access_token";

#[derive(Clone)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    // lifetime spotify reported when issuing the token
    pub expires_in: u64,
    obtained: Instant,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>, expires_in: u64) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            expires_in,
            obtained: Instant::now(),
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Whether spotify would reject this token regardless of what our cache thinks
    pub fn is_expired(&self) -> bool {
        self.obtained.elapsed() >= Duration::from_secs(self.expires_in)
    }
}

impl From<SpotifyAccess> for AccessToken {
    fn from(access: SpotifyAccess) -> Self {
        AccessToken::new(access.access_token, access.expires_in)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<AccessToken>;
}

/// Fetches tokens from spotify's accounts service with the client-credentials grant
pub struct SpotifyTokenSource {
    token_url: String,
    credentials: Credentials,
    upstream: Upstream,
}

impl SpotifyTokenSource {
    pub fn new(token_url: impl Into<String>, credentials: Credentials, upstream: Upstream) -> Self {
        Self {
            token_url: token_url.into(),
            credentials,
            upstream,
        }
    }
}

#[async_trait::async_trait]
impl TokenSource for SpotifyTokenSource {
    async fn fetch(&self) -> Result<AccessToken> {
        let access =
            spotify::client_credentials_token(&self.token_url, &self.credentials, &self.upstream)
                .await?;
        Ok(access.into())
    }
}

pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    cache: Mutex<TimedCache<String, AccessToken>>,
}

impl TokenCache {
    /// Every hit resets the `lifespan_seconds` countdown of the entry.
    pub fn new(source: Arc<dyn TokenSource>, lifespan_seconds: u64) -> Self {
        Self {
            source,
            cache: Mutex::new(TimedCache::with_lifespan_and_refresh(lifespan_seconds, true)),
        }
    }

    /// Return the cached token, fetching a new one on a miss.
    ///
    /// The cache lock is held for the duration of the fetch so that
    /// concurrent misses wait for and share a single fetch instead of
    /// each going to spotify.
    pub async fn access_token(&self) -> Result<AccessToken> {
        let key = ACCESS_TOKEN_KEY.to_string();
        let mut cache = self.cache.lock().await;
        match cache.cache_get(&key).cloned() {
            Some(token) if !token.is_expired() => return Ok(token),
            Some(_) => {
                slog::info!(LOG, "cached client token outlived its spotify lifetime");
                cache.cache_remove(&key);
            }
            None => {}
        }

        let token = self.source.fetch().await?;
        slog::info!(
            LOG, "fetched fresh client credentials token";
            "expires_in" => token.expires_in,
        );
        cache.cache_set(key, token.clone());
        Ok(token)
    }

    #[cfg(test)]
    pub async fn cached_entries(&self) -> usize {
        self.cache.lock().await.cache_size()
    }
}
