use crate::cookie::{CookieAttributes, CookiePayload, cookie_value};
use crate::error::SessionError;
use crate::session::Session;
use crate::signer::Signer;
use crate::storage::{SessionData, SessionStorage};
use axum::http::{HeaderValue, Request, Response, header};
use chrono::Utc;
use splus_domain::config::{SameSite, SessionConfig};
use splus_domain::constants::{DEFAULT_SESSION_COOKIE, DEFAULT_SESSION_MAX_AGE_SECS};
use splus_kernel::token::token_urlsafe;
use splus_redis::Redis;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};
use tracing::{debug, error, warn};

const GENERATED_SECRET_BYTES: usize = 128;
const SESSION_KEY_BYTES: usize = 64;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Configures a [`SessionLayer`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug)]
pub struct SessionLayerBuilder {
    name: String,
    secret: Option<String>,
    max_age: Duration,
    same_site: SameSite,
    secure: bool,
    redis: Option<Redis>,
}

impl Default for SessionLayerBuilder {
    fn default() -> Self {
        Self {
            name: DEFAULT_SESSION_COOKIE.to_owned(),
            secret: None,
            max_age: Duration::from_secs(DEFAULT_SESSION_MAX_AGE_SECS),
            same_site: SameSite::Lax,
            secure: true,
            redis: None,
        }
    }
}

impl SessionLayerBuilder {
    /// Starts from the `session` config section.
    pub fn from_config(cfg: &SessionConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            secret: cfg.secret.clone(),
            max_age: Duration::from_secs(cfg.max_age_secs),
            same_site: cfg.same_site,
            secure: cfg.secure,
            redis: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Signing secret. Without one a random secret is generated, so sessions do not
    /// survive a restart.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub const fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub const fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub const fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn redis(mut self, redis: Redis) -> Self {
        self.redis = Some(redis);
        self
    }

    /// # Errors
    /// Returns [`SessionError::Internal`] for an empty cookie name or when the signer
    /// cannot be keyed.
    pub fn build(self) -> Result<SessionLayer, SessionError> {
        if self.name.trim().is_empty() || self.name.contains(['=', ';', ' ']) {
            return Err(SessionError::Internal {
                message: format!("Invalid session cookie name: {:?}", self.name).into(),
                context: None,
            });
        }

        let secret = self.secret.unwrap_or_else(|| {
            warn!("No session secret configured; sessions will be invalidated on restart");
            token_urlsafe(GENERATED_SECRET_BYTES)
        });

        let storage = self.redis.map_or_else(SessionStorage::memory, SessionStorage::with_redis);

        Ok(SessionLayer {
            inner: Arc::new(SessionInner {
                signer: Signer::new(secret)?,
                storage,
                cookie: CookieAttributes {
                    name: self.name,
                    max_age: self.max_age,
                    same_site: self.same_site,
                    secure: self.secure,
                },
            }),
        })
    }
}

#[derive(Debug)]
struct SessionInner {
    signer: Signer,
    storage: SessionStorage,
    cookie: CookieAttributes,
}

impl SessionInner {
    /// Resolves the incoming cookie into the stored session.
    ///
    /// Returns the session id (when data was found) and the data. Any failure on the
    /// way yields an empty session.
    async fn load(&self, cookie: Option<String>) -> (Option<String>, SessionData) {
        let Some(cookie) = cookie else {
            return (None, SessionData::new());
        };

        let payload = match CookiePayload::decode(&cookie, &self.signer) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "Ignoring invalid session cookie");
                return (None, SessionData::new());
            },
        };

        match self.storage.get(&payload).await {
            Ok(data) if data.is_empty() => (None, data),
            Ok(data) => (Some(payload.key), data),
            Err(e) => {
                warn!(error = %e, "Failed to load session");
                (None, SessionData::new())
            },
        }
    }

    /// Persists changes and returns the `Set-Cookie` value to send, if any.
    async fn commit(
        &self,
        session: &Session,
        original_id: Option<String>,
        original: &SessionData,
        had_cookie: bool,
    ) -> Option<String> {
        let (id, current) = session.snapshot();

        if current.is_empty() && !original.is_empty() {
            if let Some(key) = original_id
                && let Err(e) = self.storage.delete(&key).await
            {
                warn!(error = %e, "Failed to delete session");
            }
            return Some(self.cookie.clear());
        }

        if current != *original {
            let key = id.unwrap_or_else(|| token_urlsafe(SESSION_KEY_BYTES));
            let expiry = chrono::Duration::from_std(self.cookie.max_age)
                .ok()
                .and_then(|age| Utc::now().checked_add_signed(age))
                .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);

            let payload = CookiePayload { key, expiry };
            let value = match payload.encode(&self.signer) {
                Ok(value) => value,
                Err(e) => {
                    error!(error = %e, "Failed to encode session cookie");
                    return None;
                },
            };

            if let Err(e) = self.storage.set(&payload.key, &current, self.cookie.max_age).await {
                warn!(error = %e, "Failed to store session");
            }
            return Some(self.cookie.set(&value));
        }

        if current.is_empty() && had_cookie {
            return Some(self.cookie.clear());
        }

        None
    }
}

/// Server-side session middleware.
///
/// The cookie only carries a signed pointer to the session; the data itself stays in
/// memory or Redis. Handlers access it through the [`Session`] extractor.
#[derive(Debug, Clone)]
pub struct SessionLayer {
    inner: Arc<SessionInner>,
}

impl SessionLayer {
    pub fn builder() -> SessionLayerBuilder {
        SessionLayerBuilder::default()
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.inner.cookie.name
    }

    #[must_use]
    pub fn storage(&self) -> &SessionStorage {
        &self.inner.storage
    }

    #[must_use]
    pub fn signer(&self) -> &Signer {
        &self.inner.signer
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService { inner, state: Arc::clone(&self.inner) }
    }
}

#[derive(Debug, Clone)]
pub struct SessionService<S> {
    inner: S,
    state: Arc<SessionInner>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SessionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let cookie = cookie_value(req.headers(), &state.cookie.name).map(str::to_owned);
            let had_cookie = cookie.is_some();

            let (id, original) = state.load(cookie).await;
            let session = Session::new(id.clone(), original.clone());
            req.extensions_mut().insert(session.clone());

            let mut response = inner.call(req).await?;

            if let Some(set_cookie) = state.commit(&session, id, &original, had_cookie).await {
                match HeaderValue::from_str(&set_cookie) {
                    Ok(value) => {
                        response.headers_mut().append(header::SET_COOKIE, value);
                    },
                    Err(e) => error!(error = %e, "Session cookie is not a valid header value"),
                }
            }

            Ok(response)
        })
    }
}
