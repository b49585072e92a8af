use proptest::prelude::*;
use splus_ratelimit::{RateLimit, Store};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().build().expect("runtime")
}

fn origin() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

// Periods are whole multiples of the emission interval so the arithmetic is exact.
fn limit(rate: u32, inverse_ms: u64) -> RateLimit {
    RateLimit::new(rate, Duration::from_millis(inverse_ms * u64::from(rate))).expect("valid limit")
}

proptest! {
    #[test]
    fn fresh_key_allows_exactly_rate_at_once(rate in 1u32..50, inverse_ms in 1u64..5_000, extra in 0u32..20) {
        let limit = limit(rate, inverse_ms);
        let store = Store::memory();

        let allowed = runtime().block_on(async {
            let mut allowed = 0;
            for _ in 0..rate + extra {
                if store.update_at("k", &limit, origin()).await.is_none() {
                    allowed += 1;
                }
            }
            allowed
        });

        prop_assert_eq!(allowed, rate);
    }

    #[test]
    fn any_period_window_allows_less_than_twice_rate(
        rate in 1u32..10,
        inverse_ms in 1u64..1_000,
        gaps in proptest::collection::vec(0u64..2_000, 1..200),
    ) {
        let limit = limit(rate, inverse_ms);
        let store = Store::memory();

        let allowed: Vec<Duration> = runtime().block_on(async {
            let mut now = Duration::ZERO;
            let mut allowed = Vec::new();
            for gap in gaps {
                now += Duration::from_millis(gap);
                if store.update_at("k", &limit, origin() + now).await.is_none() {
                    allowed.push(now);
                }
            }
            allowed
        });

        for (i, start) in allowed.iter().enumerate() {
            let in_window = allowed[i..].iter().take_while(|t| **t < *start + limit.period()).count();
            prop_assert!(in_window < 2 * rate as usize, "{in_window} requests within one period");
        }
    }

    #[test]
    fn retry_points_at_the_next_allowed_instant(rate in 1u32..20, inverse_ms in 1u64..5_000) {
        let limit = limit(rate, inverse_ms);
        let store = Store::memory();

        runtime().block_on(async {
            for _ in 0..rate {
                assert!(store.update_at("k", &limit, origin()).await.is_none());
            }

            let retry = store.update_at("k", &limit, origin()).await.expect("burst exhausted");
            assert_eq!(retry, Duration::from_millis(inverse_ms));

            let just_before = origin() + retry - Duration::from_nanos(1);
            assert!(store.update_at("k", &limit, just_before).await.is_some());
            assert!(store.update_at("k", &limit, origin() + retry).await.is_none());
        });
    }
}
