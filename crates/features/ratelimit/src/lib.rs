//! # Ratelimit
//!
//! GCRA (generic cell rate algorithm) rate limiting for axum applications.
//!
//! Limits are either global (every request) or attached to a route through a
//! [`RouteTable`]. Each limit groups requests into buckets: by client address by
//! default, or by any async key function. State lives in memory or, with a
//! [`Redis`](splus_redis::Redis) handle, in Redis with an in-memory fallback.
//!
//! ```rust
//! use axum::{Router, routing::get};
//! use splus_ratelimit::{Limit, Ratelimiter};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), splus_ratelimit::RatelimitError> {
//! let limiter = Ratelimiter::builder()
//!     .global_limit(Limit::new(100, Duration::from_secs(60)))
//!     .build()?;
//!
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "hello" }))
//!     .layer(limiter.layer());
//! # Ok(())
//! # }
//! ```
//!
//! Route limits are resolved through axum's `MatchedPath`, so the layer has to be
//! added with `Router::layer` (or `route_layer`) rather than around the whole router.

mod error;
mod layer;
mod limit;
mod routes;
mod store;

pub use crate::error::{RatelimitError, RatelimitErrorExt};
pub use crate::layer::{RatelimitLayer, RatelimitService, Ratelimiter, RatelimiterBuilder};
pub use crate::limit::{
    BoxFuture, Bucket, Exempt, Limit, RateLimit, ResponseCallback, default_response,
    retry_after_secs,
};
pub use crate::routes::{RouteEntry, RouteTable};
pub use crate::store::Store;
