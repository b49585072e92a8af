use crate::app::Application;
use anyhow::{Context, Result};
use axum::Router;
use axum_server::Handle;
use splus_domain::config::ServerConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// A fluent builder for configuring the [`Server`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ServerBuilder {
    cfg: ServerConfig,
    router: Option<Router>,
}

impl ServerBuilder {
    /// Set up the server's configuration.
    pub fn config(mut self, cfg: ServerConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub const fn port(mut self, port: u16) -> Self {
        self.cfg.port = port;
        self
    }

    /// Serves `app` with all of its middleware.
    pub fn application(self, app: Application) -> Self {
        self.router(app.into_router())
    }

    /// Serves a plain axum router.
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    fn validate_ssl_config(&self) -> Result<()> {
        if let Some(ssl) = &self.cfg.ssl {
            if !ssl.cert.exists() {
                anyhow::bail!("SSL certificate not found at: {}", ssl.cert.display());
            }
            if !ssl.key.exists() {
                anyhow::bail!("SSL key not found at: {}", ssl.key.display());
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let metadata = ssl.key.metadata()?;
                if metadata.permissions().mode() & 0o077 != 0 {
                    tracing::warn!(
                        "SECURITY: SSL Private Key {} has insecure permissions (should be 600)",
                        ssl.key.display()
                    );
                }
            }

            if !cfg!(feature = "tls") {
                anyhow::bail!("SSL is configured but splus was built without the `tls` feature");
            }
        }
        Ok(())
    }

    /// Consumes the builder and prepares the server.
    ///
    /// # Errors
    /// Returns an error if no application was given or if the SSL certificate or
    /// key file is missing.
    pub fn build(self) -> Result<Server> {
        self.validate_ssl_config()?;
        let router = self.router.context("No application configured")?;

        let address = SocketAddr::new(self.cfg.address, self.cfg.port);
        info!(address = %address, "Initializing server");

        Ok(Server { cfg: self.cfg, router, handle: Handle::new() })
    }
}

/// A configured server ready to run.
#[must_use = "call .run().await to start the server"]
#[derive(Debug)]
pub struct Server {
    cfg: ServerConfig,
    router: Router,
    handle: Handle<SocketAddr>,
}

impl Server {
    /// Returns a new [`ServerBuilder`] to configure the server.
    ///
    /// # Examples
    /// ```no_run
    /// # use splus::{Application, Route, Server};
    /// # async fn example() -> anyhow::Result<()> {
    /// let app = Application::builder().route(Route::get("/", || async { "hi" })).build()?;
    ///
    /// Server::builder().port(8000).application(app).build()?.run().await
    /// # }
    /// ```
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Handle for observing the bound address or stopping the server.
    #[must_use]
    pub fn handle(&self) -> Handle<SocketAddr> {
        self.handle.clone()
    }

    /// Starts the server and runs until the shutdown signal is received.
    ///
    /// Peer addresses are recorded as `ConnectInfo<SocketAddr>`, which the rate
    /// limiter and the access log rely on.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the configured address
    /// or if SSL/TLS setup fails.
    pub async fn run(self) -> Result<()> {
        let address = SocketAddr::new(self.cfg.address, self.cfg.port);

        info!(address = %address, ssl = self.cfg.ssl.is_some(), "Starting server");

        let shutdown_handle = self.handle.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                error!("Error while waiting for shutdown signal: {e}");
                return;
            }
            info!("Shutdown signal received, starting graceful shutdown...");
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        let service = self.router.into_make_service_with_connect_info::<SocketAddr>();

        #[cfg(feature = "tls")]
        if let Some(ssl) = &self.cfg.ssl {
            info!("Starting HTTPS server on https://{address}");

            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&ssl.cert, &ssl.key)
                .await
                .context("Failed to load SSL/TLS certificates")?;

            axum_server::bind_rustls(address, tls_config)
                .handle(self.handle)
                .serve(service)
                .await
                .context("HTTPS server failed")?;

            info!("Server shutdown complete");
            return Ok(());
        }

        info!("Starting HTTP server on http://{address}");

        axum_server::bind(address)
            .handle(self.handle)
            .serve(service)
            .await
            .context("HTTP server failed")?;

        info!("Server shutdown complete");
        Ok(())
    }
}

/// Listens for shutdown signals (Ctrl+C, SIGTERM).
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => {
            res.context("Ctrl+C signal received")?;
        },
        res = terminate => {
            res.context("SIGTERM signal received")?;
        },
    }

    Ok(())
}
