use crate::error::RatelimitError;
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use splus_domain::config::LimitConfig;
use splus_domain::constants::RATELIMIT_MESSAGE;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type BucketFn = dyn Fn(&Request) -> BoxFuture<'static, Option<String>> + Send + Sync;
type ExemptFn = dyn Fn(&Request) -> BoxFuture<'static, bool> + Send + Sync;
type ResponseFn = dyn Fn(&Request, Duration) -> BoxFuture<'static, Response> + Send + Sync;

/// `rate` requests per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateLimit {
    rate: u32,
    period: Duration,
}

impl RateLimit {
    /// # Errors
    /// Returns [`RatelimitError::InvalidLimit`] when `rate` or `period` is zero.
    pub fn new(rate: u32, period: Duration) -> Result<Self, RatelimitError> {
        let limit = Self { rate, period };
        limit.validate()?;
        Ok(limit)
    }

    fn validate(&self) -> Result<(), RatelimitError> {
        if self.rate == 0 {
            return Err(RatelimitError::InvalidLimit {
                message: "rate must be greater than zero".into(),
                context: None,
            });
        }
        if self.period.is_zero() {
            return Err(RatelimitError::InvalidLimit {
                message: "period must be greater than zero".into(),
                context: None,
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn rate(&self) -> u32 {
        self.rate
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Emission interval: the time one request "costs".
    #[must_use]
    pub fn inverse(&self) -> Duration {
        self.period.checked_div(self.rate).unwrap_or(self.period)
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.rate, self.period.as_secs_f64())
    }
}

/// How requests are grouped into rate limit keys.
#[derive(Clone, Default)]
pub enum Bucket {
    /// One bucket per client address.
    #[default]
    Ip,
    /// Keyed by a callback. Returning `None` lets the request through unlimited.
    Custom(Arc<BucketFn>),
}

impl Bucket {
    /// Wraps an async key function.
    ///
    /// The request is only borrowed while the future is created, so copy out what the
    /// key needs before the `async` block:
    ///
    /// ```rust
    /// use splus_ratelimit::Bucket;
    ///
    /// let by_api_key = Bucket::custom(|req| {
    ///     let key = req
    ///         .headers()
    ///         .get("x-api-key")
    ///         .and_then(|v| v.to_str().ok())
    ///         .map(str::to_owned);
    ///     async move { key }
    /// });
    /// ```
    pub fn custom<F, Fut>(f: F) -> Self
    where
        F: Fn(&Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        Self::Custom(Arc::new(move |req| Box::pin(f(req))))
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip => f.write_str("Ip"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Skips a limit for requests the callback approves.
#[derive(Clone)]
pub struct Exempt(Arc<ExemptFn>);

impl Exempt {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(&Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self(Arc::new(move |req| Box::pin(f(req))))
    }

    pub(crate) fn call(&self, req: &Request) -> BoxFuture<'static, bool> {
        (self.0)(req)
    }
}

impl fmt::Debug for Exempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Exempt(..)")
    }
}

/// A rate limit attached globally or to a route.
#[derive(Debug, Clone)]
pub struct Limit {
    limit: RateLimit,
    bucket: Bucket,
    priority: i32,
    exempt: Option<Exempt>,
}

impl Limit {
    /// Declares `rate` requests per `per`, keyed by client address.
    ///
    /// Values are validated when the limit is handed to a
    /// [`RatelimiterBuilder`](crate::RatelimiterBuilder); use [`Limit::try_new`] to fail early.
    #[must_use]
    pub const fn new(rate: u32, per: Duration) -> Self {
        Self { limit: RateLimit { rate, period: per }, bucket: Bucket::Ip, priority: 0, exempt: None }
    }

    /// # Errors
    /// Returns [`RatelimitError::InvalidLimit`] when `rate` or `per` is zero.
    pub fn try_new(rate: u32, per: Duration) -> Result<Self, RatelimitError> {
        let limit = Self::new(rate, per);
        limit.validate()?;
        Ok(limit)
    }

    #[must_use]
    pub fn bucket(mut self, bucket: Bucket) -> Self {
        self.bucket = bucket;
        self
    }

    /// Lower priorities run first among a route's limits.
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn exempt(mut self, exempt: Exempt) -> Self {
        self.exempt = Some(exempt);
        self
    }

    /// # Errors
    /// Returns [`RatelimitError::InvalidLimit`] when the rate or period is zero.
    pub fn validate(&self) -> Result<(), RatelimitError> {
        self.limit.validate()
    }

    #[must_use]
    pub const fn rate_limit(&self) -> &RateLimit {
        &self.limit
    }

    #[must_use]
    pub const fn priority_value(&self) -> i32 {
        self.priority
    }

    pub(crate) const fn bucket_ref(&self) -> &Bucket {
        &self.bucket
    }

    pub(crate) const fn exempt_ref(&self) -> Option<&Exempt> {
        self.exempt.as_ref()
    }
}

impl TryFrom<&LimitConfig> for Limit {
    type Error = RatelimitError;

    fn try_from(cfg: &LimitConfig) -> Result<Self, Self::Error> {
        let per = Duration::try_from_secs_f64(cfg.per_secs).map_err(|e| {
            RatelimitError::InvalidLimit {
                message: e.to_string().into(),
                context: Some(format!("per_secs = {}", cfg.per_secs).into()),
            }
        })?;

        Ok(Self::try_new(cfg.rate, per)?.priority(cfg.priority))
    }
}

/// Builds the response sent to a limited client.
#[derive(Clone)]
pub struct ResponseCallback(Arc<ResponseFn>);

impl ResponseCallback {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(&Request, Duration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self(Arc::new(move |req, retry| Box::pin(f(req, retry))))
    }

    pub(crate) fn call(&self, req: &Request, retry: Duration) -> BoxFuture<'static, Response> {
        (self.0)(req, retry)
    }
}

impl Default for ResponseCallback {
    fn default() -> Self {
        Self::new(|_, retry| async move { default_response(retry) })
    }
}

impl fmt::Debug for ResponseCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseCallback(..)")
    }
}

/// `429 Too Many Requests` with a JSON error body and `Retry-After`.
#[must_use]
pub fn default_response(retry: Duration) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({ "error": RATELIMIT_MESSAGE })),
    )
        .into_response();

    response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(retry)));
    response
}

/// Whole seconds to wait, rounded up and never zero.
#[must_use]
pub fn retry_after_secs(retry: Duration) -> u64 {
    let secs = retry.as_secs() + u64::from(retry.subsec_nanos() > 0);
    secs.max(1)
}
