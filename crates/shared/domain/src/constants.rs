//! Names and defaults shared across the workspace.

/// Published name of the facade crate.
pub const PACKAGE_NAME: &str = "splus";

/// Tracing target used by the access log middleware.
pub const ACCESS_LOG_TARGET: &str = "splus::access";

/// Default Redis endpoint used when no url is configured.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";

/// Default session cookie name.
pub const DEFAULT_SESSION_COOKIE: &str = "__session_cookie";

/// Seven days.
pub const DEFAULT_SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7;

/// Addresses the rate limiter treats as local when `ignore_localhost` is enabled.
pub const LOCALHOST_ADDRESSES: [&str; 4] = ["127.0.0.1", "::1", "localhost", "0.0.0.0"];

/// Body of the default `429 Too Many Requests` response.
pub const RATELIMIT_MESSAGE: &str = "You are requesting too fast.";
