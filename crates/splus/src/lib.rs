#![cfg_attr(feature = "docs", doc = include_str!("../README.md"))]
//! # splus
//!
//! Additional features, utilities and helpers for axum services.
//!
//! * [`Application`], [`View`] and [`Route`] compose routes with prefixes, stable
//!   names and per-route rate limits.
//! * [`middleware`] holds the GCRA rate limiter, server-side sessions and the
//!   access log.
//! * [`Server`] serves an application over HTTP or HTTPS with graceful shutdown.
//!
//! ## Example
//! ```no_run
//! use splus::middleware::Ratelimiter;
//! use splus::types::Limit;
//! use splus::{Application, Route, Server};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let _logger = splus::setup_logging(splus::LevelFilter::INFO)?;
//!
//!     let app = Application::builder()
//!         .prefix("/v1")
//!         .ratelimiter(Ratelimiter::builder())
//!         .route(
//!             Route::get("/", || async { "Hello, World!" })
//!                 .name("home")
//!                 .limit(Limit::new(1, Duration::from_secs(60))),
//!         )
//!         .build()?;
//!
//!     Server::builder().port(8000).application(app).build()?.run().await
//! }
//! ```

mod access_log;
mod app;
mod error;
mod path;
mod response;
mod route;
mod server;
mod view;

pub use crate::app::{Application, ApplicationBuilder};
pub use crate::error::{AppError, AppErrorExt};
pub use crate::response::{MaybeResponse, NoContent};
pub use crate::route::Route;
pub use crate::server::{Server, ServerBuilder};
pub use crate::view::View;

pub use splus_domain::config;
pub use splus_domain::constants::PACKAGE_NAME;
pub use splus_kernel::config::{load_config, load_config_or_default};
pub use splus_logger::{LevelFilter, Logger, LoggerError};
pub use splus_redis::{Redis, RedisBuilder, RedisError};
pub use splus_sessions::Session;

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Middleware layers.
pub mod middleware {
    pub use crate::access_log::{AccessLogLayer, AccessResponse, AccessSpan, access_log};
    pub use splus_ratelimit::{RatelimitLayer, RatelimitService, Ratelimiter, RatelimiterBuilder};
    pub use splus_sessions::{SessionLayer, SessionLayerBuilder, SessionService};
}

/// Types used to declare rate limits.
pub mod types {
    pub use splus_ratelimit::{
        Bucket, Exempt, Limit, RateLimit, ResponseCallback, RouteEntry, RouteTable, Store,
        default_response, retry_after_secs,
    };
}

/// Console logging at `level` with colour detection.
///
/// Keep the returned [`Logger`] alive for the lifetime of the program.
///
/// # Errors
/// Returns [`LoggerError::Subscriber`] if a global subscriber is already installed.
pub fn setup_logging(level: LevelFilter) -> Result<Logger, LoggerError> {
    Logger::builder().name(PACKAGE_NAME).level(level).init()
}

/// Installs logging as described by the `logging` config section.
///
/// # Errors
/// Returns [`LoggerError::InvalidConfiguration`] for an unknown level or filter and
/// [`LoggerError::Subscriber`] if a global subscriber is already installed.
pub fn setup_logging_from_config(
    name: &str,
    cfg: &config::LoggingConfig,
) -> Result<Logger, LoggerError> {
    let level: LevelFilter = cfg.level.parse().map_err(|_| LoggerError::InvalidConfiguration {
        message: format!("Unknown log level: {}", cfg.level).into(),
        context: None,
    })?;

    let mut builder = Logger::builder().name(name).level(level);
    if let Some(filter) = &cfg.filter {
        builder = builder.env_filter(filter);
    }

    match &cfg.path {
        Some(path) if cfg.json => builder.path(path).json().init(),
        Some(path) => builder.path(path).init(),
        None => builder.init(),
    }
}
