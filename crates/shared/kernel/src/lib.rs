//! Kernel utilities shared across slices.
//! Keep this crate lightweight; it hosts config loading, client address resolution and token minting.
//!
//! ## Tokens
//! ```rust
//! # use splus_kernel::token::token_urlsafe;
//! let token = token_urlsafe(64);
//! assert_eq!(token.len(), 86);
//! ```
//!
//! ## Config loading
//! ```rust,ignore
//! use splus_kernel::config::load_config;
//! let cfg: splus_kernel::domain::config::AppConfig = load_config(Some("splus")).unwrap();
//! ```
pub mod config;
pub mod net;
pub mod token;

pub use splus_domain as domain;
