//! # Sessions
//!
//! Server-side sessions for axum.
//!
//! The browser only receives a signed cookie holding a random storage key and an
//! expiry. The session contents stay on the server, in memory or in Redis when a
//! healthy [`Redis`](splus_redis::Redis) handle is configured.
//!
//! ```rust
//! use axum::{Router, routing::get};
//! use splus_sessions::{Session, SessionLayer};
//!
//! async fn counter(session: Session) -> String {
//!     let count = session.get::<u64>("count").unwrap_or(0) + 1;
//!     let _ = session.insert("count", count);
//!     count.to_string()
//! }
//!
//! # fn main() -> Result<(), splus_sessions::SessionError> {
//! let sessions = SessionLayer::builder().secret("change me").secure(false).build()?;
//! let app: Router = Router::new().route("/", get(counter)).layer(sessions);
//! # Ok(())
//! # }
//! ```

mod cookie;
mod error;
mod layer;
mod session;
mod signer;
mod storage;

pub use crate::cookie::{CookieAttributes, CookiePayload, cookie_value};
pub use crate::error::{SessionError, SessionErrorExt};
pub use crate::layer::{SessionLayer, SessionLayerBuilder, SessionService};
pub use crate::session::Session;
pub use crate::signer::Signer;
pub use crate::storage::{SessionData, SessionStorage};
