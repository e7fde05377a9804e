use std::fmt;
use std::io::Read;
use std::time::Duration;
use std::{env, fs};

use crate::{spotify, utils, LOG};

/// The account new playlists are created under unless
/// `SPOTIFY_ACCOUNT_ID` says otherwise.
pub const DEFAULT_ACCOUNT_ID: &str = "rsacr1m9ge9ur5tdceead2ziy";

#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub ssl: bool,
    pub host: String,
    pub real_hostname: Option<String>,
    pub port: u16,
    pub log_format: String,
    pub log_level: String,
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub spotify_account_id: String,
    // refresh token of the playlist account, lets /generate work
    // before anyone has gone through /login
    pub spotify_refresh_token: Option<String>,
    pub spotify_token_url: String,
    pub spotify_api_url: String,
    pub token_cache_seconds: u64,
    pub upstream_timeout_seconds: u64,
    pub upstream_retries: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("version", &self.version)
            .field("ssl", &self.ssl)
            .field("host", &self.host)
            .field("real_hostname", &self.real_hostname)
            .field("port", &self.port)
            .field("log_format", &self.log_format)
            .field("log_level", &self.log_level)
            .field("spotify_client_id", &self.spotify_client_id)
            .field("spotify_account_id", &self.spotify_account_id)
            .field("spotify_token_url", &self.spotify_token_url)
            .field("spotify_api_url", &self.spotify_api_url)
            .field("token_cache_seconds", &self.token_cache_seconds)
            .field("upstream_timeout_seconds", &self.upstream_timeout_seconds)
            .field("upstream_retries", &self.upstream_retries)
            .finish()
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let version = fs::File::open("commit_hash.txt")
            .and_then(|mut f| {
                let mut s = String::new();
                f.read_to_string(&mut s)?;
                Ok(s.trim().to_string())
            })
            .unwrap_or_else(|_| "unknown".to_string());
        Self::from_lookup(version, |k| env::var(k).ok())
    }

    /// Build a config from an arbitrary key lookup, `load` passes the
    /// process environment.
    pub fn from_lookup<F>(version: String, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str, default: &str| lookup(k).unwrap_or_else(|| default.to_string());
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        Ok(Self {
            version,
            ssl: get("SSL", "false") == "true",
            host: get("HOST", "localhost"),
            real_hostname: non_empty("REAL_HOSTNAME"),
            port: get("PORT", "3030")
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT: {}", e))?,
            log_format: get("LOG_FORMAT", "json").to_lowercase().trim().to_string(),
            log_level: get("LOG_LEVEL", "INFO"),
            spotify_client_id: get("SPOTIFY_CLIENT_ID", ""),
            spotify_client_secret: get("SPOTIFY_CLIENT_SECRET", ""),
            spotify_account_id: get("SPOTIFY_ACCOUNT_ID", DEFAULT_ACCOUNT_ID),
            spotify_refresh_token: non_empty("SPOTIFY_REFRESH_TOKEN"),
            spotify_token_url: get("SPOTIFY_TOKEN_URL", spotify::TOKEN_URL),
            spotify_api_url: get("SPOTIFY_API_URL", spotify::API_URL)
                .trim_end_matches('/')
                .to_string(),
            token_cache_seconds: get("TOKEN_CACHE_SECONDS", "3600")
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid TOKEN_CACHE_SECONDS: {}", e))?,
            upstream_timeout_seconds: get("UPSTREAM_TIMEOUT_SECONDS", "10")
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid UPSTREAM_TIMEOUT_SECONDS: {}", e))?,
            upstream_retries: get("UPSTREAM_RETRIES", "2")
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid UPSTREAM_RETRIES: {}", e))?,
        })
    }

    pub fn initialize(&self) -> anyhow::Result<()> {
        slog::info!(
            LOG, "initialized config";
            "version" => &self.version,
            "ssl" => &self.ssl,
            "host" => &self.host,
            "port" => &self.port,
            "log_format" => &self.log_format,
            "log_level" => &self.log_level,
            "account_id" => &self.spotify_account_id,
            "token_cache_seconds" => self.token_cache_seconds,
            "upstream_timeout_seconds" => self.upstream_timeout_seconds,
            "upstream_retries" => self.upstream_retries,
        );
        if self.credentials().basic_auth().is_err() {
            slog::warn!(
                LOG,
                "SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET not set, spotify calls will fail"
            );
        }
        Ok(())
    }

    pub fn host(&self) -> String {
        let p = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", p, self.host, self.port)
    }

    /// Public facing host, differs from `host` when running behind a proxy
    pub fn redirect_host(&self) -> String {
        self.real_hostname.clone().unwrap_or_else(|| self.host())
    }

    pub fn spotify_redirect_url(&self) -> String {
        format!("{}/auth", self.redirect_host())
    }

    pub fn credentials(&self) -> spotify::Credentials {
        spotify::Credentials {
            client_id: self.spotify_client_id.clone(),
            client_secret: self.spotify_client_secret.clone(),
        }
    }

    pub fn upstream(&self) -> utils::Upstream {
        utils::Upstream::new(
            Duration::from_secs(self.upstream_timeout_seconds),
            self.upstream_retries,
        )
    }
}
