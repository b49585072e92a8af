use crate::error::{RatelimitError, RatelimitErrorExt};
use crate::limit::{BoxFuture, Bucket, Limit, ResponseCallback};
use crate::routes::{RouteEntry, RouteTable};
use crate::store::Store;
use axum::extract::{MatchedPath, Request};
use axum::http::header;
use axum::response::Response;
use splus_domain::config::RatelimitConfig;
use splus_kernel::net::{client_ip, is_localhost};
use splus_redis::Redis;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Configures a [`Ratelimiter`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug)]
pub struct RatelimiterBuilder {
    ignore_localhost: bool,
    global: Vec<Limit>,
    response: ResponseCallback,
    store: Option<Store>,
    routes: RouteTable,
}

impl Default for RatelimiterBuilder {
    fn default() -> Self {
        Self {
            ignore_localhost: true,
            global: Vec::new(),
            response: ResponseCallback::default(),
            store: None,
            routes: RouteTable::default(),
        }
    }
}

impl RatelimiterBuilder {
    /// Starts from the `ratelimit` config section.
    ///
    /// # Errors
    /// Returns [`RatelimitError::InvalidLimit`] for a global limit with a zero rate or
    /// a negative, zero or non-finite period.
    pub fn from_config(cfg: &RatelimitConfig) -> Result<Self, RatelimitError> {
        let global = cfg
            .global
            .iter()
            .map(Limit::try_from)
            .collect::<Result<Vec<_>, _>>()
            .context("ratelimit.global")?;

        Ok(Self { ignore_localhost: cfg.ignore_localhost, global, ..Self::default() })
    }

    /// Lets requests from loopback addresses through. Enabled by default.
    pub const fn ignore_localhost(mut self, ignore: bool) -> Self {
        self.ignore_localhost = ignore;
        self
    }

    /// Adds a limit applied to every request before route limits.
    pub fn global_limit(mut self, limit: Limit) -> Self {
        self.global.push(limit);
        self
    }

    pub fn response(mut self, response: ResponseCallback) -> Self {
        self.response = response;
        self
    }

    pub fn store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    /// Shorthand for `.store(Store::with_redis(redis))`.
    pub fn redis(self, redis: Redis) -> Self {
        self.store(Store::with_redis(redis))
    }

    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// Adds a single route entry.
    ///
    /// # Errors
    /// Returns [`RatelimitError::InvalidLimit`] if a route limit is invalid.
    pub fn route(mut self, entry: RouteEntry) -> Result<Self, RatelimitError> {
        self.routes.insert(entry)?;
        Ok(self)
    }

    /// # Errors
    /// Returns [`RatelimitError::InvalidLimit`] if a global limit is invalid.
    pub fn build(self) -> Result<Ratelimiter, RatelimitError> {
        for limit in &self.global {
            limit.validate().context("global limit")?;
        }

        debug!(
            global = self.global.len(),
            routes = self.routes.len(),
            ignore_localhost = self.ignore_localhost,
            "Ratelimiter ready"
        );

        Ok(Ratelimiter {
            inner: Arc::new(RatelimiterInner {
                ignore_localhost: self.ignore_localhost,
                global: self.global,
                response: self.response,
                store: self.store.unwrap_or_default(),
                routes: self.routes,
            }),
        })
    }
}

#[derive(Debug)]
struct RatelimiterInner {
    ignore_localhost: bool,
    global: Vec<Limit>,
    response: ResponseCallback,
    store: Store,
    routes: RouteTable,
}

/// GCRA rate limiter over global and per-route limits.
#[derive(Debug, Clone)]
pub struct Ratelimiter {
    inner: Arc<RatelimiterInner>,
}

impl Ratelimiter {
    pub fn builder() -> RatelimiterBuilder {
        RatelimiterBuilder::default()
    }

    #[must_use]
    pub fn layer(&self) -> RatelimitLayer {
        RatelimitLayer { limiter: self.clone() }
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    /// Runs every applicable limit against `req`.
    ///
    /// Hands the request back when it may proceed, or the limited response otherwise.
    ///
    /// # Errors
    /// The `Err` side carries the response built by the [`ResponseCallback`].
    pub async fn check(&self, req: Request) -> Result<Request, Response> {
        let inner = &self.inner;

        let route = req
            .extensions()
            .get::<MatchedPath>()
            .and_then(|path| inner.routes.lookup(path.as_str(), req.method()));

        if route.is_some_and(|r| r.websocket) || is_websocket_upgrade(&req) {
            return Ok(req);
        }

        let ip = client_ip(&req);
        let scoped = inner.global.iter().map(|limit| (limit, None));
        let routed = route.into_iter().flat_map(|r| r.limits.iter().map(move |limit| (limit, Some(r))));
        let limits: Vec<(&Limit, Option<&RouteEntry>)> = scoped.chain(routed).collect();

        for (limit, route) in limits {
            if let Some(exempt) = limit.exempt_ref() {
                let pending = exempt.call(&req);
                if pending.await {
                    continue;
                }
            }

            let key = match limit.bucket_ref() {
                Bucket::Ip => {
                    let Some(ip) = ip.as_deref() else {
                        warn!(path = %req.uri().path(), "Could not determine the client address while ratelimiting, ignoring");
                        return Ok(req);
                    };
                    if inner.ignore_localhost && is_localhost(ip) {
                        return Ok(req);
                    }

                    match route {
                        Some(route) => format!("{}::{}.ip::{ip}", route.key_prefix(), limit.rate_limit()),
                        None => ip.to_owned(),
                    }
                },
                Bucket::Custom(bucket) => {
                    let pending: BoxFuture<'static, Option<String>> = bucket(&req);
                    let Some(key) = pending.await else {
                        return Ok(req);
                    };

                    match route {
                        Some(route) => format!("{}::{key}", route.key_prefix()),
                        None => key,
                    }
                },
            };

            if let Some(retry) = inner.store.update(&key, limit.rate_limit()).await {
                debug!(key, retry = ?retry, "Request ratelimited");
                let pending = inner.response.call(&req, retry);
                return Err(pending.await);
            }
        }

        Ok(req)
    }
}

fn is_websocket_upgrade(req: &Request) -> bool {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Tower layer applying a [`Ratelimiter`].
#[derive(Debug, Clone)]
pub struct RatelimitLayer {
    limiter: Ratelimiter,
}

impl RatelimitLayer {
    #[must_use]
    pub const fn new(limiter: Ratelimiter) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RatelimitLayer {
    type Service = RatelimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RatelimitService { inner, limiter: self.limiter.clone() }
    }
}

#[derive(Debug, Clone)]
pub struct RatelimitService<S> {
    inner: S,
    limiter: Ratelimiter,
}

impl<S> Service<Request> for RatelimitService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let limiter = self.limiter.clone();
        // The ready service goes into the future; a fresh clone stays behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match limiter.check(req).await {
                Ok(req) => inner.call(req).await,
                Err(response) => Ok(response),
            }
        })
    }
}
