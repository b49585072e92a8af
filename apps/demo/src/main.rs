use anyhow::Context;
use splus::config::AppConfig;
use splus::{RedisBuilder, Server, load_config, load_config_or_default};
use tracing::{info, warn};

const CONFIG_FILE: &str = "splus";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (cfg, missing) = match load_config::<AppConfig>(Some(CONFIG_FILE)) {
        Ok(cfg) => (cfg, None),
        Err(e) => {
            let cfg = load_config_or_default::<AppConfig>(Some(CONFIG_FILE))
                .context("Critical: Configuration is malformed")?;
            (cfg, Some(e))
        },
    };

    let _log = splus::setup_logging_from_config(env!("CARGO_PKG_NAME"), &cfg.logging)?;
    if let Some(e) = missing {
        warn!("Configuration file not loaded, using defaults: {e}");
    }

    let redis =
        cfg.redis.url.as_ref().map(|_| RedisBuilder::from_config(&cfg.redis).connect()).transpose()?;
    if let Some(redis) = &redis {
        info!(?redis, "Redis storage enabled");
    }

    let app = splus_demo::application(cfg.clone(), redis.as_ref())?;

    Server::builder().config(cfg.server.clone()).application(app).build()?.run().await
}
