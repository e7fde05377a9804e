use std::time::Duration;

use crate::models::GeneratedPlaylist;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("error reaching spotify: {0}")]
    Transport(String),

    #[error("spotify request timed out after {0:?}")]
    Timeout(Duration),

    #[error("spotify returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("spotify rejected our credentials ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("unexpected spotify response: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient authorization: {0}")]
    InsufficientAuthorization(String),

    #[error("playlist {} was created but its tracks were not set: {reason}", playlist.id)]
    PartialPlaylist {
        playlist: GeneratedPlaylist,
        reason: String,
    },

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl Error {
    /// Map a non-success provider status onto an error. Credential
    /// rejections are kept apart so they are never retried.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Error::Unauthorized { status, message },
            _ => Error::Upstream { status, message },
        }
    }

    /// Errors worth another attempt: the network, a timeout,
    /// rate limiting and provider-side failures.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(_) | Error::Timeout(_) => true,
            Error::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// HTTP status returned to our own callers
    pub fn status(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::Timeout(_) => 504,
            Error::Transport(_)
            | Error::Upstream { .. }
            | Error::Unauthorized { .. }
            | Error::Decode(_)
            | Error::PartialPlaylist { .. } => 502,
            Error::NotFound(_) => 404,
            Error::InsufficientAuthorization(_) => 403,
            Error::BadRequest(_) => 400,
        }
    }
}
