mod config;
mod discovery;
mod error;
mod logging;
mod models;
mod names;
mod service;
mod spotify;
mod token;
mod user_auth;
mod utils;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

use config::Config;

lazy_static::lazy_static! {
    pub static ref CONFIG: Config = Config::load().expect("invalid configuration");

    // The "base" logger that all modules should branch off of
    pub static ref BASE_LOG: slog::Logger =
        logging::build_base_logger(&CONFIG.log_format, &CONFIG.log_level);

    // Base logger
    pub static ref LOG: slog::Logger = BASE_LOG.new(slog::o!("app" => "wholeschool"));
}

/// Json 200 response, for handlers returning `tide::Result`
#[macro_export]
macro_rules! resp {
    (json => $obj:expr) => {{
        let body = tide::Body::from_json(&$obj)?;
        tide::Response::builder(200).body(body).build()
    }};
}

#[async_std::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    CONFIG.initialize()?;
    let ctx = service::Context::from_config(&CONFIG);
    service::start(ctx, CONFIG.host()).await
}
