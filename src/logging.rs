use std::time::Instant;

use slog::{o, Drain};

use crate::LOG;

/// Root logger writing `pretty` terminal output or json lines to stderr.
/// Unknown levels fall back to `INFO`.
pub fn build_base_logger(format: &str, level: &str) -> slog::Logger {
    let level: slog::Level = level.parse().unwrap_or(slog::Level::Info);
    if format == "pretty" {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::CompactFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        let drain = slog::LevelFilter::new(drain, level).fuse();
        slog::Logger::root(drain, o!())
    } else {
        let drain = slog_json::Json::default(std::io::stderr()).fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        let drain = slog::LevelFilter::new(drain, level).fuse();
        slog::Logger::root(drain, o!())
    }
}

/// Logs one line per handled request
#[derive(Debug, Default, Clone)]
pub struct LogMiddleware;

impl LogMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl<State: Clone + Send + Sync + 'static> tide::Middleware<State> for LogMiddleware {
    async fn handle(&self, req: tide::Request<State>, next: tide::Next<'_, State>) -> tide::Result {
        let method = req.method().to_string();
        let path = req.url().path().to_string();
        let start = Instant::now();
        let resp = next.run(req).await;
        let status = resp.status() as u16;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        if status >= 500 {
            slog::error!(
                LOG, "request failed";
                "method" => method, "path" => path, "status" => status, "elapsed_ms" => elapsed_ms,
            );
        } else if status >= 400 {
            slog::warn!(
                LOG, "request rejected";
                "method" => method, "path" => path, "status" => status, "elapsed_ms" => elapsed_ms,
            );
        } else {
            slog::info!(
                LOG, "request";
                "method" => method, "path" => path, "status" => status, "elapsed_ms" => elapsed_ms,
            );
        }
        Ok(resp)
    }
}
