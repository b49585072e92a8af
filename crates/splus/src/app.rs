use crate::access_log::access_log;
use crate::error::AppError;
use crate::path;
use crate::route::Route;
use crate::view::{MountedView, View};
use axum::Router;
use splus_domain::config::AppConfig;
use splus_ratelimit::{Ratelimiter, RatelimiterBuilder, RouteEntry};
use splus_redis::Redis;
use splus_sessions::{SessionLayer, SessionLayerBuilder};
use tracing::{debug, info, warn};

const DEFAULT_NAME: &str = "Application";

/// Collects routes, views and middleware into an [`Application`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug)]
pub struct ApplicationBuilder {
    name: String,
    prefix: String,
    access_log: bool,
    routes: Vec<Route>,
    views: Vec<MountedView>,
    ratelimiter: Option<RatelimiterBuilder>,
    sessions: Option<SessionLayer>,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            prefix: String::new(),
            access_log: true,
            routes: Vec::new(),
            views: Vec::new(),
            ratelimiter: None,
            sessions: None,
        }
    }
}

impl ApplicationBuilder {
    /// Applies the `server`, `ratelimit` and `session` config sections.
    ///
    /// The rate limiter and sessions are only installed when enabled. Both use
    /// `redis` for storage when given.
    ///
    /// # Errors
    /// Returns [`AppError::Ratelimit`] for invalid global limits and
    /// [`AppError::Session`] for an invalid session setup.
    pub fn from_config(cfg: &AppConfig, redis: Option<&Redis>) -> Result<Self, AppError> {
        let mut builder = Self::default().prefix(&cfg.server.prefix).access_log(cfg.server.access_log);

        if cfg.ratelimit.enabled {
            let mut limiter = RatelimiterBuilder::from_config(&cfg.ratelimit)?;
            if let Some(redis) = redis {
                limiter = limiter.redis(redis.clone());
            }
            builder = builder.ratelimiter(limiter);
        }

        if cfg.session.enabled {
            let mut sessions = SessionLayerBuilder::from_config(&cfg.session);
            if let Some(redis) = redis {
                sessions = sessions.redis(redis.clone());
            }
            builder = builder.sessions(sessions.build()?);
        }

        Ok(builder)
    }

    /// Name used for application-level routes, e.g. `Application.home`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Prefix for every route, e.g. `/v1`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Logs each request on the `splus::access` target. Enabled by default.
    pub const fn access_log(mut self, enabled: bool) -> Self {
        self.access_log = enabled;
        self
    }

    /// Adds an application-level route. View prefixes do not apply to it.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn view<V: View>(mut self, view: V) -> Self {
        self.views.push(MountedView::new(view));
        self
    }

    /// Installs a rate limiter. Route limits are added to it when building.
    pub fn ratelimiter(mut self, limiter: RatelimiterBuilder) -> Self {
        self.ratelimiter = Some(limiter);
        self
    }

    pub fn sessions(mut self, sessions: SessionLayer) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Mounts every route and finalizes the middleware.
    ///
    /// # Errors
    /// * [`AppError::DuplicateView`] if two views share a name.
    /// * [`AppError::DuplicateRoute`] if a path and method are registered twice.
    /// * [`AppError::InvalidRoute`] for a route without a handler, a malformed
    ///   path or an unsupported method.
    /// * [`AppError::Ratelimit`] for an invalid limit.
    pub fn build(self) -> Result<Application, AppError> {
        let mut view_names: Vec<String> = Vec::with_capacity(self.views.len());
        for view in &self.views {
            if view_names.contains(&view.name) {
                return Err(AppError::DuplicateView {
                    message: format!(
                        "A view with the name '{}' has already been added to this application",
                        view.name
                    )
                    .into(),
                    context: None,
                });
            }
            view_names.push(view.name.clone());
        }

        let app_routes = self.routes.into_iter().map(|route| (self.name.as_str(), None, route));
        let view_routes = self.views.into_iter().flat_map(|view| {
            let MountedView { type_name, prefix, routes, .. } = view;
            routes.into_iter().map(move |route| (type_name, Some(prefix.clone()), route))
        });

        let mut router = Router::new();
        let mut entries: Vec<RouteEntry> = Vec::new();

        for (owner, view_prefix, route) in app_routes.chain(view_routes) {
            path::validate(&route.path)?;
            let path = route.resolve_path(view_prefix.as_deref(), &self.prefix);
            path::validate(&path)?;

            let entry = RouteEntry {
                name: format!("{owner}.{}", route.name.as_deref().unwrap_or(&route.path)),
                path,
                methods: route.methods.clone(),
                limits: route.limits.clone(),
                websocket: route.websocket,
            };

            if let Some(existing) = entries.iter().find(|e| overlaps(e, &entry)) {
                return Err(AppError::DuplicateRoute {
                    message: format!("{} conflicts with {}", entry.name, existing.name).into(),
                    context: Some(entry.path.into()),
                });
            }

            debug!(name = %entry.name, path = %entry.path, "Mounting route");
            router = router.route(&entry.path, route.into_method_router()?);
            entries.push(entry);
        }

        let ratelimiter = match self.ratelimiter {
            Some(mut limiter) => {
                for entry in &entries {
                    limiter = limiter.route(entry.clone())?;
                }
                Some(limiter.build()?)
            },
            None => {
                if entries.iter().any(|e| !e.limits.is_empty()) {
                    warn!("Routes declare rate limits but no rate limiter is installed");
                }
                None
            },
        };

        info!(
            routes = entries.len(),
            views = view_names.len(),
            ratelimit = ratelimiter.is_some(),
            sessions = self.sessions.is_some(),
            "Application ready"
        );

        Ok(Application {
            prefix: self.prefix,
            access_log: self.access_log,
            views: view_names,
            routes: entries,
            router,
            ratelimiter,
            sessions: self.sessions,
        })
    }
}

/// Whether two routes would both answer the same path and method.
///
/// Paths that differ only in capture names always collide, since the router
/// cannot tell them apart.
fn overlaps(a: &RouteEntry, b: &RouteEntry) -> bool {
    if a.path != b.path {
        return path::shape(&a.path) == path::shape(&b.path);
    }
    let methods = |e: &RouteEntry| if e.websocket { vec![axum::http::Method::GET] } else { e.methods.clone() };
    let (left, right) = (methods(a), methods(b));
    left.is_empty() || right.is_empty() || left.iter().any(|m| right.contains(m))
}

/// A composed axum application.
///
/// ```rust
/// use splus::{Application, Route};
/// use splus::types::Limit;
/// use splus::middleware::Ratelimiter;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), splus::AppError> {
/// let app = Application::builder()
///     .prefix("/v1")
///     .ratelimiter(Ratelimiter::builder())
///     .route(Route::get("/", || async { "Hello, World!" }).limit(Limit::new(1, Duration::from_secs(60))))
///     .build()?;
///
/// assert_eq!(app.routes()[0].path, "/v1/");
/// let _router = app.into_router();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Application {
    prefix: String,
    access_log: bool,
    views: Vec<String>,
    routes: Vec<RouteEntry>,
    router: Router,
    ratelimiter: Option<Ratelimiter>,
    sessions: Option<SessionLayer>,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Names of the mounted views, in registration order.
    #[must_use]
    pub fn views(&self) -> &[String] {
        &self.views
    }

    #[must_use]
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    #[must_use]
    pub const fn ratelimiter(&self) -> Option<&Ratelimiter> {
        self.ratelimiter.as_ref()
    }

    #[must_use]
    pub const fn sessions(&self) -> Option<&SessionLayer> {
        self.sessions.as_ref()
    }

    /// The router with its middleware applied.
    ///
    /// Sessions run innermost, then the rate limiter, then the access log. All of
    /// them are route layers, so the matched route is visible to the rate limiter.
    #[must_use]
    pub fn into_router(self) -> Router {
        let mut router = self.router;

        if let Some(sessions) = self.sessions {
            router = router.layer(sessions);
        }
        if let Some(limiter) = self.ratelimiter {
            router = router.layer(limiter.layer());
        }
        if self.access_log {
            router = router.layer(access_log());
        }

        router
    }
}
