use std::future::Future;
use std::time::Duration;

use crate::{Error, Result, LOG};

pub fn now_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Convert spotify's `expires_in` into an epoch timestamp, shaving
/// off a minute so we refresh before spotify starts rejecting it.
pub fn spotify_expiry_seconds_to_epoch_expiration(expires_in: u64) -> i64 {
    now_seconds() + expires_in.saturating_sub(60) as i64
}

/// Bounds on every outbound call: a per-attempt timeout and a
/// number of retries for transient failures.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
}

impl Upstream {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            timeout,
            retries,
            backoff: Duration::from_millis(200),
        }
    }

    /// Run `fut` once, bounded by the timeout. For calls that are
    /// not safe to repeat.
    pub async fn once<T, Fut>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        async_std::future::timeout(self.timeout, fut)
            .await
            .unwrap_or(Err(Error::Timeout(self.timeout)))
    }

    /// Run `f`, retrying with exponential backoff while it fails with
    /// a transient error. `f` is called once per attempt so it must
    /// build a fresh request each time.
    pub async fn call<T, F, Fut>(&self, what: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let res = match async_std::future::timeout(self.timeout, f()).await {
                Ok(res) => res,
                Err(_) => Err(Error::Timeout(self.timeout)),
            };
            match res {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    let wait = self.backoff * 2u32.saturating_pow(attempt);
                    slog::warn!(
                        LOG, "retrying spotify call";
                        "call" => what,
                        "attempt" => attempt + 1,
                        "wait_ms" => wait.as_millis() as u64,
                        "error" => e.to_string(),
                    );
                    async_std::task::sleep(wait).await;
                    attempt += 1;
                }
                res => return res,
            }
        }
    }
}
