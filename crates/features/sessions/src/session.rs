use crate::error::{SessionError, SessionErrorExt};
use crate::storage::SessionData;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Default)]
struct SessionState {
    id: Option<String>,
    data: SessionData,
}

/// The current request's session.
///
/// Cloning is cheap and every clone sees the same data. Changes are persisted by
/// the session layer once the handler has produced its response.
///
/// ```rust
/// use splus_sessions::Session;
///
/// async fn visits(session: Session) -> String {
///     let count = session.get::<u64>("visits").unwrap_or(0) + 1;
///     let _ = session.insert("visits", count);
///     format!("visit #{count}")
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    pub(crate) fn new(id: Option<String>, data: SessionData) -> Self {
        Self { state: Arc::new(Mutex::new(SessionState { id, data })) }
    }

    /// Storage key of a persisted session.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.state.lock().id.clone()
    }

    /// Deserializes the value under `key`, if present and of type `T`.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.state.lock().data.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.state.lock().data.get(key).cloned()
    }

    /// Stores `value` under `key`, returning the previous value.
    ///
    /// # Errors
    /// Returns [`SessionError::Serialization`] if `value` cannot be represented as JSON.
    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<Option<Value>, SessionError> {
        let key = key.into();
        let value = serde_json::to_value(value).context(format!("Session value for {key}"))?;
        Ok(self.state.lock().data.insert(key, value))
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.state.lock().data.remove(key)
    }

    /// Empties the session. The stored entry is deleted once the response is sent.
    pub fn clear(&self) {
        self.state.lock().data.clear();
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.state.lock().data.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().data.is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().data.keys().cloned().collect()
    }

    pub(crate) fn snapshot(&self) -> (Option<String>, SessionData) {
        let state = self.state.lock();
        (state.id.clone(), state.data.clone())
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Session extractor used without the session layer",
        ))
    }
}
