use crate::constants::{DEFAULT_SESSION_COOKIE, DEFAULT_SESSION_MAX_AGE_SECS};
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level application configuration.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfigInner {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub ratelimit: RatelimitConfig,
    pub redis: RedisConfig,
    pub logging: LoggingConfig,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(flatten, default)]
    inner: Arc<AppConfigInner>,
}

impl Deref for AppConfig {
    type Target = AppConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for AppConfig {
    fn deref_mut(&mut self) -> &mut AppConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// Prepended to every route path, e.g. `/v1`.
    pub prefix: String,
    pub access_log: bool,
    pub ssl: Option<SslConfig>,
}

/// TLS certificate/key paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SslConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Cookie `SameSite` attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

impl SameSite {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "lax",
            Self::Strict => "strict",
            Self::None => "none",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side session settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub enabled: bool,
    pub name: String,
    /// Signing secret. A random one is generated at startup when absent,
    /// which invalidates every session on restart.
    pub secret: Option<String>,
    pub max_age_secs: u64,
    pub same_site: SameSite,
    pub secure: bool,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("enabled", &self.enabled)
            .field("name", &self.name)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("max_age_secs", &self.max_age_secs)
            .field("same_site", &self.same_site)
            .field("secure", &self.secure)
            .finish()
    }
}

/// A limit declared in configuration. Always keyed by client address.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LimitConfig {
    pub rate: u32,
    pub per_secs: f64,
    #[serde(default)]
    pub priority: i32,
}

/// Rate limiter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatelimitConfig {
    pub enabled: bool,
    pub ignore_localhost: bool,
    pub global: Vec<LimitConfig>,
}

/// Optional Redis backing for the rate limiter and sessions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis is only used when a url is set.
    pub url: Option<String>,
    pub health_interval_secs: u64,
    pub ping_timeout_secs: u64,
}

/// Logging sink settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub filter: Option<String>,
    pub path: Option<PathBuf>,
    pub json: bool,
}

// --- Default ---

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
            prefix: String::new(),
            access_log: true,
            ssl: None,
        }
    }
}

impl Default for SslConfig {
    fn default() -> Self {
        Self { cert: PathBuf::from("cert.pem"), key: PathBuf::from("key.pem") }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: DEFAULT_SESSION_COOKIE.to_owned(),
            secret: None,
            max_age_secs: DEFAULT_SESSION_MAX_AGE_SECS,
            same_site: SameSite::Lax,
            secure: true,
        }
    }
}

impl Default for RatelimitConfig {
    fn default() -> Self {
        Self { enabled: false, ignore_localhost: true, global: Vec::new() }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { url: None, health_interval_secs: 5, ping_timeout_secs: 3 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), filter: None, path: None, json: false }
    }
}
