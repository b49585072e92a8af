use crate::cookie::CookiePayload;
use crate::error::{SessionError, SessionErrorExt};
use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use redis::AsyncCommands;
use serde_json::{Map, Value};
use splus_redis::Redis;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Session contents, keyed by field name.
pub type SessionData = Map<String, Value>;

#[derive(Debug)]
struct Stored {
    json: String,
    deadline: DateTime<Utc>,
}

/// Server-side session store.
///
/// Redis is used while its handle reports healthy, memory otherwise.
#[derive(Debug, Clone, Default)]
pub struct SessionStorage {
    memory: Arc<Mutex<FxHashMap<String, Stored>>>,
    redis: Option<Redis>,
}

impl SessionStorage {
    #[must_use]
    pub fn memory() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_redis(redis: Redis) -> Self {
        Self { redis: Some(redis), ..Self::default() }
    }

    /// Loads the data a cookie points to.
    ///
    /// An expired payload deletes its entry and yields an empty session.
    ///
    /// # Errors
    /// Returns [`SessionError::Redis`] or [`SessionError::Serialization`] when the
    /// stored entry cannot be read.
    pub async fn get(&self, payload: &CookiePayload) -> Result<SessionData, SessionError> {
        if payload.is_expired() {
            trace!("Session cookie expired");
            self.delete(&payload.key).await?;
            return Ok(SessionData::new());
        }

        let json = match self.redis.as_ref().and_then(Redis::connection) {
            Some(mut conn) => {
                let json: Option<String> = conn.get(&payload.key).await.context("Loading session")?;
                json
            },
            None => {
                let now = Utc::now();
                let memory = self.memory.lock();
                memory.get(&payload.key).filter(|s| s.deadline > now).map(|s| s.json.clone())
            },
        };

        match json {
            Some(json) => serde_json::from_str(&json).context("Parsing stored session"),
            None => Ok(SessionData::new()),
        }
    }

    /// # Errors
    /// Returns [`SessionError::Serialization`] or [`SessionError::Redis`] on failure.
    pub async fn set(&self, key: &str, data: &SessionData, max_age: Duration) -> Result<(), SessionError> {
        let json = serde_json::to_string(data).context("Storing session")?;

        if let Some(mut conn) = self.redis.as_ref().and_then(Redis::connection) {
            let _: () = conn.set_ex(key, json, max_age.as_secs()).await.context("Storing session")?;
            return Ok(());
        }

        let now = Utc::now();
        let deadline = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| now.checked_add_signed(age))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut memory = self.memory.lock();
        memory.retain(|_, stored| stored.deadline > now);
        memory.insert(key.to_owned(), Stored { json, deadline });
        Ok(())
    }

    /// # Errors
    /// Returns [`SessionError::Redis`] if Redis rejects the command.
    pub async fn delete(&self, key: &str) -> Result<(), SessionError> {
        if let Some(mut conn) = self.redis.as_ref().and_then(Redis::connection) {
            let _: () = conn.del(key).await.context("Deleting session")?;
            return Ok(());
        }

        self.memory.lock().remove(key);
        Ok(())
    }

    /// Number of sessions held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memory.lock().len()
    }
}
