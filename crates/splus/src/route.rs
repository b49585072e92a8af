use crate::error::AppError;
use axum::handler::Handler;
use axum::http::Method;
use axum::routing::{self, MethodFilter, MethodRouter};
use splus_ratelimit::Limit;
use std::fmt;

type Mount = Box<dyn FnOnce(Option<MethodFilter>) -> MethodRouter + Send>;

/// A single endpoint of an [`Application`](crate::Application) or [`View`](crate::View).
///
/// ```rust
/// use axum::http::Method;
/// use splus::Route;
/// use splus::types::Limit;
/// use std::time::Duration;
///
/// let route = Route::new("/items")
///     .name("create_item")
///     .methods([Method::POST])
///     .limit(Limit::new(10, Duration::from_secs(60)))
///     .handler(|| async { "created" });
/// # let _ = route;
/// ```
#[must_use]
pub struct Route {
    pub(crate) path: String,
    pub(crate) name: Option<String>,
    pub(crate) methods: Vec<Method>,
    pub(crate) prefix: bool,
    pub(crate) websocket: bool,
    pub(crate) limits: Vec<Limit>,
    handler: Option<Mount>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("methods", &self.methods)
            .field("prefix", &self.prefix)
            .field("websocket", &self.websocket)
            .field("limits", &self.limits)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

impl Route {
    /// A `GET` route without a handler yet.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
            methods: vec![Method::GET],
            prefix: true,
            websocket: false,
            limits: Vec::new(),
            handler: None,
        }
    }

    pub fn get<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        Self::new(path).handler(handler)
    }

    pub fn post<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        Self::new(path).methods([Method::POST]).handler(handler)
    }

    pub fn put<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        Self::new(path).methods([Method::PUT]).handler(handler)
    }

    pub fn patch<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        Self::new(path).methods([Method::PATCH]).handler(handler)
    }

    pub fn delete<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        Self::new(path).methods([Method::DELETE]).handler(handler)
    }

    /// Route name, used in rate limit keys. Defaults to the path.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Accepted methods. An empty list accepts every method.
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Whether the owning view's prefix is applied. Enabled by default.
    pub const fn prefix(mut self, prefix: bool) -> Self {
        self.prefix = prefix;
        self
    }

    /// Marks a websocket endpoint. It is mounted for `GET` and never rate limited.
    pub const fn websocket(mut self, websocket: bool) -> Self {
        self.websocket = websocket;
        self
    }

    pub fn limit(mut self, limit: Limit) -> Self {
        self.limits.push(limit);
        self
    }

    /// Any axum handler. It is mounted for every method in [`Route::methods`].
    pub fn handler<H, T>(mut self, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.handler = Some(Box::new(move |filter| match filter {
            Some(filter) => routing::on(filter, handler),
            None => routing::any(handler),
        }));
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path after applying the view and application prefixes.
    pub(crate) fn resolve_path(&self, view_prefix: Option<&str>, app_prefix: &str) -> String {
        let path = match view_prefix {
            Some(prefix) if self.prefix => format!(
                "/{}/{}",
                prefix.trim_matches('/').to_lowercase(),
                self.path.trim_start_matches('/')
            ),
            _ => self.path.clone(),
        };

        match app_prefix.trim_matches('/') {
            "" => path,
            app => format!("/{app}{path}"),
        }
    }

    pub(crate) fn method_filter(&self) -> Result<Option<MethodFilter>, AppError> {
        if self.websocket {
            return Ok(Some(MethodFilter::GET));
        }

        let mut filter: Option<MethodFilter> = None;
        for method in &self.methods {
            let next = MethodFilter::try_from(method.clone()).map_err(|e| AppError::InvalidRoute {
                message: e.to_string().into(),
                context: Some(self.path.clone().into()),
            })?;
            filter = Some(filter.map_or(next, |f| f.or(next)));
        }
        Ok(filter)
    }

    pub(crate) fn into_method_router(mut self) -> Result<MethodRouter, AppError> {
        let filter = self.method_filter()?;
        let mount = self.handler.take().ok_or_else(|| AppError::InvalidRoute {
            message: "route has no handler".into(),
            context: Some(self.path.clone().into()),
        })?;
        Ok(mount(filter))
    }
}
