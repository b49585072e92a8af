use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix for environment overrides, e.g. `SPLUS__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "SPLUS";

const DEFAULT_CONFIG_FILE: &str = "splus";

/// Custom error type for config loading.
#[splus_derive::splus_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads configuration from a file layered with environment overrides.
///
/// 1. **Base File**: Settings from `path` (any format the `config` crate understands,
///    the extension may be omitted). Defaults to `splus` in the working directory.
/// 2. **Environment Overrides**: Variables prefixed with `SPLUS__`. Nested keys are
///    separated by double underscores (`SPLUS__SESSION__MAX_AGE_SECS` maps to
///    `session.max_age_secs`).
///
/// # Errors
/// Returns [`ConfigError::Config`] if the file is missing, an override is malformed,
/// or the merged values do not deserialize into `T`.
///
/// # Example
/// ```rust
/// use splus_kernel::config::load_config;
///
/// #[derive(Default, serde::Deserialize)]
/// struct AppConfig {
///     port: u16,
/// }
///
/// let cfg: AppConfig = load_config(Some("config/local")).unwrap_or_default();
/// ```
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    load(effective_path(path), true)
}

/// Like [`load_config`], but a missing file is not an error: only the
/// environment overrides (and `T`'s serde defaults) apply.
///
/// # Errors
/// Returns [`ConfigError::Config`] if the file exists but is malformed, or the
/// merged values do not deserialize into `T`.
pub fn load_config_or_default<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    load(effective_path(path), false)
}

fn effective_path(path: Option<impl AsRef<Path>>) -> PathBuf {
    path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), |p| p.as_ref().to_path_buf())
}

fn load<T>(path: PathBuf, required: bool) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let builder = Config::builder()
        .add_source(File::from(path.as_path()).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .convert_case(config::Case::Snake),
        );

    info!(path = %path.display(), required, "Loading config");

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}
