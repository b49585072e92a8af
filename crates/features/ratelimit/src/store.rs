//! GCRA state storage.
//!
//! Each key holds a theoretical arrival time (TAT). A request at `now` is allowed
//! while `tat - now <= period - inverse`, after which the TAT advances by one
//! emission interval.

use crate::error::{RatelimitError, RatelimitErrorExt};
use crate::limit::RateLimit;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use redis::Script;
use splus_redis::Redis;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{trace, warn};

/// Stored keys outlive their period by this much.
const KEY_GRACE: Duration = Duration::from_secs(60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const REDIS_KEY_PREFIX: &str = "splus:ratelimit:";

// Times travel as integer microseconds since the epoch. `-1` means allowed,
// anything else is the retry delay.
static GCRA_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local now = tonumber(ARGV[1])
local period = tonumber(ARGV[2])
local inverse = tonumber(ARGV[3])

local tat = now
local stored = redis.call('GET', KEYS[1])
if stored then
    tat = math.max(tonumber(stored), now)
end

local separation = tat - now
local max_interval = period - inverse
if separation > max_interval then
    return separation - max_interval
end

redis.call('SET', KEYS[1], string.format('%.0f', tat + inverse), 'PX', ARGV[4])
return -1
",
    )
});

/// Outcome of one GCRA step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Allow { tat: Duration },
    Deny { retry: Duration },
}

fn gcra(stored: Option<Duration>, now: Duration, limit: &RateLimit) -> Decision {
    let tat = stored.map_or(now, |tat| tat.max(now));
    let separation = tat.saturating_sub(now);
    let max_interval = limit.period().saturating_sub(limit.inverse());

    if separation > max_interval {
        Decision::Deny { retry: separation - max_interval }
    } else {
        Decision::Allow { tat: tat + limit.inverse() }
    }
}

#[derive(Debug)]
struct Entry {
    tat: Duration,
    limit: RateLimit,
}

#[derive(Debug, Default)]
struct MemoryState {
    keys: FxHashMap<String, Entry>,
    last_sweep: Duration,
}

#[derive(Debug)]
struct MemoryStore {
    state: Mutex<MemoryState>,
    sweep_interval: Duration,
}

impl MemoryStore {
    fn new(sweep_interval: Duration) -> Self {
        Self { state: Mutex::new(MemoryState::default()), sweep_interval }
    }

    fn update(&self, key: &str, limit: &RateLimit, now: Duration) -> Option<Duration> {
        let mut state = self.state.lock();

        if now.saturating_sub(state.last_sweep) >= self.sweep_interval {
            state.keys.retain(|_, entry| now.saturating_sub(entry.tat) <= entry.limit.period() + KEY_GRACE);
            state.last_sweep = now;
        }

        match gcra(state.keys.get(key).map(|entry| entry.tat), now, limit) {
            Decision::Allow { tat } => {
                state.keys.insert(key.to_owned(), Entry { tat, limit: *limit });
                None
            },
            Decision::Deny { retry } => Some(retry),
        }
    }

    fn len(&self) -> usize {
        self.state.lock().keys.len()
    }
}

/// Where rate limit state lives.
///
/// With Redis attached, every update runs atomically on the server. While the
/// Redis handle is unhealthy (or a call fails) the in-memory state takes over.
#[derive(Debug, Clone)]
pub struct Store {
    memory: Arc<MemoryStore>,
    redis: Option<Redis>,
}

impl Default for Store {
    fn default() -> Self {
        Self::memory()
    }
}

impl Store {
    #[must_use]
    pub fn memory() -> Self {
        Self { memory: Arc::new(MemoryStore::new(SWEEP_INTERVAL)), redis: None }
    }

    #[must_use]
    pub fn with_redis(redis: Redis) -> Self {
        Self { redis: Some(redis), ..Self::memory() }
    }

    /// Overrides how often stale in-memory keys are swept.
    #[must_use]
    pub fn sweep_interval(self, interval: Duration) -> Self {
        Self { memory: Arc::new(MemoryStore::new(interval)), redis: self.redis }
    }

    /// Records a request for `key`.
    ///
    /// Returns `None` when the request is allowed, or how long to wait otherwise.
    pub async fn update(&self, key: &str, limit: &RateLimit) -> Option<Duration> {
        self.update_at(key, limit, SystemTime::now()).await
    }

    /// [`Store::update`] against an explicit clock.
    pub async fn update_at(&self, key: &str, limit: &RateLimit, now: SystemTime) -> Option<Duration> {
        let now = now.duration_since(UNIX_EPOCH).unwrap_or_default();

        if let Some(redis) = &self.redis
            && let Some(conn) = redis.connection()
        {
            match redis_update(conn, key, limit, now).await {
                Ok(outcome) => return outcome,
                Err(e) => warn!(key, error = %e, "Falling back to in-memory ratelimit state"),
            }
        }

        let outcome = self.memory.update(key, limit, now);
        trace!(key, limited = outcome.is_some(), "Ratelimit state updated");
        outcome
    }

    /// Number of keys held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    #[must_use]
    pub const fn is_redis(&self) -> bool {
        self.redis.is_some()
    }
}

async fn redis_update(
    mut conn: splus_redis::ConnectionManager,
    key: &str,
    limit: &RateLimit,
    now: Duration,
) -> Result<Option<Duration>, RatelimitError> {
    let ttl = limit.period() + KEY_GRACE;

    let retry: i64 = GCRA_SCRIPT
        .key(format!("{REDIS_KEY_PREFIX}{key}"))
        .arg(micros(now))
        .arg(micros(limit.period()))
        .arg(micros(limit.inverse()))
        .arg(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
        .invoke_async(&mut conn)
        .await
        .context(format!("GCRA update for {key}"))?;

    Ok(u64::try_from(retry).ok().map(Duration::from_micros))
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn per_second(rate: u32) -> RateLimit {
        RateLimit::new(rate, Duration::from_secs(1)).expect("valid limit")
    }

    fn at(secs: f64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000) + Duration::from_secs_f64(secs)
    }

    #[test]
    fn test_gcra_fresh_key_is_allowed() {
        let limit = per_second(2);
        let now = Duration::from_secs(10);

        assert_eq!(gcra(None, now, &limit), Decision::Allow { tat: now + limit.inverse() });
    }

    #[test]
    fn test_gcra_stale_tat_is_clamped_to_now() {
        let limit = per_second(2);
        let now = Duration::from_secs(10);

        assert_eq!(
            gcra(Some(Duration::from_secs(1)), now, &limit),
            Decision::Allow { tat: now + Duration::from_millis(500) }
        );
    }

    #[test]
    fn test_gcra_denies_past_burst() {
        let limit = per_second(2);
        let now = Duration::from_secs(10);
        let tat = now + Duration::from_secs(1);

        assert_eq!(
            gcra(Some(tat), now, &limit),
            Decision::Deny { retry: Duration::from_millis(500) }
        );
    }

    #[tokio::test]
    async fn test_memory_store_allows_burst_then_limits() {
        let store = Store::memory();
        let limit = per_second(3);

        for _ in 0..3 {
            assert!(store.update_at("client", &limit, at(0.0)).await.is_none());
        }

        let retry = store.update_at("client", &limit, at(0.0)).await;
        assert!(retry.is_some_and(|r| r > Duration::ZERO && r <= Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = Store::memory();
        let limit = per_second(1);

        assert!(store.update_at("a", &limit, at(0.0)).await.is_none());
        assert!(store.update_at("a", &limit, at(0.0)).await.is_some());
        assert!(store.update_at("b", &limit, at(0.0)).await.is_none());
    }

    #[tokio::test]
    async fn test_request_after_retry_is_allowed() {
        let store = Store::memory();
        let limit = RateLimit::new(1, Duration::from_secs(60)).expect("valid");

        assert!(store.update_at("home", &limit, at(0.0)).await.is_none());
        let retry = store.update_at("home", &limit, at(10.0)).await.expect("limited");
        assert_eq!(retry, Duration::from_secs(50));

        assert!(store.update_at("home", &limit, at(60.0)).await.is_none());
    }

    #[tokio::test]
    async fn test_denied_requests_do_not_advance_state() {
        let store = Store::memory();
        let limit = per_second(1);

        assert!(store.update_at("k", &limit, at(0.0)).await.is_none());
        for _ in 0..10 {
            assert!(store.update_at("k", &limit, at(0.5)).await.is_some());
        }
        assert!(store.update_at("k", &limit, at(1.0)).await.is_none());
    }

    #[tokio::test]
    async fn test_stale_keys_are_swept() {
        let store = Store::memory().sweep_interval(Duration::from_secs(1));
        let limit = per_second(5);

        assert!(store.update_at("old", &limit, at(0.0)).await.is_none());
        assert_eq!(store.len(), 1);

        // TAT is 0.2s; the key expires once now passes 0.2 + 1 + 60.
        assert!(store.update_at("new", &limit, at(30.0)).await.is_none());
        assert_eq!(store.len(), 2);

        assert!(store.update_at("new", &limit, at(62.0)).await.is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_runs_at_most_once_per_interval() {
        let store = Store::memory();
        let limit = per_second(5);

        assert!(store.update_at("a", &limit, at(0.0)).await.is_none());
        assert!(store.update_at("b", &limit, at(50.0)).await.is_none());
        // Due again: "a" is stale and goes.
        assert!(store.update_at("c", &limit, at(100.0)).await.is_none());
        assert_eq!(store.len(), 2);

        // "b" is stale by now, but the next sweep is not due yet.
        assert!(store.update_at("d", &limit, at(150.0)).await.is_none());
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_unhealthy_redis_falls_back_to_memory() {
        let redis = Redis::builder()
            .url("redis://127.0.0.1:1/0")
            .health_interval(Duration::from_secs(3600))
            .ping_timeout(Duration::from_millis(200))
            .connect()
            .expect("valid url");
        let store = Store::with_redis(redis);
        let limit = per_second(1);

        assert!(store.is_redis());
        assert!(store.update_at("k", &limit, at(0.0)).await.is_none());
        assert!(store.update_at("k", &limit, at(0.0)).await.is_some());
        assert_eq!(store.len(), 1);
    }
}
