//! Sliding-window attempt counting.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use tenantguard_auth::{AuthConfig, Clock, RateLimitDecision, RateLimitKey, RateLimiter};

/// At most `max_attempts` within any `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_attempts: u32,
    pub window: Duration,
}

#[derive(Default)]
struct Windows {
    attempts: HashMap<RateLimitKey, VecDeque<DateTime<Utc>>>,
    last_sweep: Option<DateTime<Utc>>,
}

/// In-process sliding-window limiter with separate budgets for password and
/// second-factor attempts.
///
/// Keys whose window has gone quiet are swept at most once per longest
/// window, so memory is bounded by the keys active in that period.
pub struct SlidingWindowRateLimiter {
    login: Budget,
    two_factor: Budget,
    clock: Arc<dyn Clock>,
    windows: Mutex<Windows>,
}

impl SlidingWindowRateLimiter {
    pub fn new(login: Budget, two_factor: Budget, clock: Arc<dyn Clock>) -> Self {
        Self {
            login,
            two_factor,
            clock,
            windows: Mutex::new(Windows::default()),
        }
    }

    pub fn from_config(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Budget {
                max_attempts: config.login_attempts_per_minute,
                window: Duration::minutes(1),
            },
            Budget {
                max_attempts: config.two_factor_max_attempts,
                window: config.two_factor_window(),
            },
            clock,
        )
    }

    fn budget(&self, key: &RateLimitKey) -> Budget {
        match key {
            RateLimitKey::Login { .. } => self.login,
            RateLimitKey::TwoFactor { .. } => self.two_factor,
        }
    }

    /// Number of keys currently holding attempt history.
    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .attempts
            .len()
    }

    fn sweep(&self, windows: &mut Windows, now: DateTime<Utc>) {
        let period = self.login.window.max(self.two_factor.window);
        if windows.last_sweep.is_some_and(|at| now - at < period) {
            return;
        }
        windows.attempts.retain(|key, attempts| {
            let cutoff = now - self.budget(key).window;
            attempts.back().is_some_and(|t| *t > cutoff)
        });
        windows.last_sweep = Some(now);
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowRateLimiter {
    async fn check(&self, key: &RateLimitKey) -> RateLimitDecision {
        let budget = self.budget(key);
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        self.sweep(&mut windows, now);
        let window = windows.attempts.entry(key.clone()).or_default();

        while window.front().is_some_and(|t| *t <= now - budget.window) {
            window.pop_front();
        }

        if window.len() >= budget.max_attempts as usize {
            return RateLimitDecision::Limited;
        }
        window.push_back(now);
        RateLimitDecision::Allowed
    }

    async fn reset(&self, key: &RateLimitKey) {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .attempts
            .remove(key);
    }
}

/// Never limits.
#[derive(Clone, Debug, Default)]
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn check(&self, _key: &RateLimitKey) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }

    async fn reset(&self, _key: &RateLimitKey) {}
}

#[cfg(test)]
mod tests {
    use tenantguard_auth::ManualClock;
    use tenantguard_core::{TenantId, UserId};

    use super::*;

    fn limiter(clock: Arc<ManualClock>) -> SlidingWindowRateLimiter {
        SlidingWindowRateLimiter::new(
            Budget {
                max_attempts: 3,
                window: Duration::minutes(1),
            },
            Budget {
                max_attempts: 5,
                window: Duration::minutes(5),
            },
            clock,
        )
    }

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn limits_after_budget_is_spent() {
        let clock = Arc::new(ManualClock::new(start()));
        let limiter = limiter(Arc::clone(&clock));
        let key = RateLimitKey::login(TenantId::new(), "alice");

        for _ in 0..3 {
            assert_eq!(limiter.check(&key).await, RateLimitDecision::Allowed);
        }
        assert_eq!(limiter.check(&key).await, RateLimitDecision::Limited);
    }

    #[tokio::test]
    async fn window_slides() {
        let clock = Arc::new(ManualClock::new(start()));
        let limiter = limiter(Arc::clone(&clock));
        let key = RateLimitKey::login(TenantId::new(), "alice");

        for _ in 0..3 {
            limiter.check(&key).await;
        }
        clock.advance(Duration::seconds(60));
        assert_eq!(limiter.check(&key).await, RateLimitDecision::Allowed);
    }

    #[tokio::test]
    async fn two_factor_budget_is_five_per_window() {
        let clock = Arc::new(ManualClock::new(start()));
        let limiter = limiter(Arc::clone(&clock));
        let key = RateLimitKey::two_factor(TenantId::new(), UserId::new());

        for _ in 0..5 {
            assert_eq!(limiter.check(&key).await, RateLimitDecision::Allowed);
        }
        assert_eq!(limiter.check(&key).await, RateLimitDecision::Limited);
        clock.advance(Duration::minutes(4));
        assert_eq!(limiter.check(&key).await, RateLimitDecision::Limited);
        clock.advance(Duration::minutes(1));
        assert_eq!(limiter.check(&key).await, RateLimitDecision::Allowed);
    }

    #[tokio::test]
    async fn reset_restores_the_budget() {
        let clock = Arc::new(ManualClock::new(start()));
        let limiter = limiter(clock);
        let key = RateLimitKey::login(TenantId::new(), "alice");

        for _ in 0..3 {
            limiter.check(&key).await;
        }
        limiter.reset(&key).await;
        assert_eq!(limiter.check(&key).await, RateLimitDecision::Allowed);
    }

    #[tokio::test]
    async fn keys_do_not_share_budgets() {
        let clock = Arc::new(ManualClock::new(start()));
        let limiter = limiter(clock);
        let tenant = TenantId::new();

        for _ in 0..3 {
            limiter.check(&RateLimitKey::login(tenant, "alice")).await;
        }
        assert_eq!(
            limiter.check(&RateLimitKey::login(tenant, "bob")).await,
            RateLimitDecision::Allowed
        );
    }

    #[tokio::test]
    async fn quiet_keys_are_forgotten() {
        let clock = Arc::new(ManualClock::new(start()));
        let limiter = limiter(Arc::clone(&clock));
        let tenant = TenantId::new();

        for i in 0..1_000 {
            limiter.check(&RateLimitKey::login(tenant, &format!("user{i}"))).await;
        }
        assert_eq!(limiter.tracked_keys(), 1_000);

        clock.advance(Duration::days(1));
        limiter.check(&RateLimitKey::login(tenant, "alice")).await;
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test]
    async fn sweep_keeps_keys_still_inside_their_window() {
        let clock = Arc::new(ManualClock::new(start()));
        let limiter = limiter(Arc::clone(&clock));
        let tenant = TenantId::new();
        let user = RateLimitKey::two_factor(tenant, UserId::new());

        limiter.check(&RateLimitKey::login(tenant, "bob")).await;
        clock.advance(Duration::minutes(4));
        for _ in 0..5 {
            limiter.check(&user).await;
        }

        clock.advance(Duration::minutes(2));
        limiter.check(&RateLimitKey::login(tenant, "carol")).await;
        // bob is gone, the 2FA attempts are still inside their window.
        assert_eq!(limiter.tracked_keys(), 2);
        assert_eq!(limiter.check(&user).await, RateLimitDecision::Limited);
    }

    proptest::proptest! {
        #[test]
        fn never_allows_more_than_the_budget_per_window(gaps in proptest::collection::vec(0i64..40, 1..60)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let clock = Arc::new(ManualClock::new(start()));
            let limiter = limiter(Arc::clone(&clock));
            let key = RateLimitKey::login(TenantId::new(), "alice");
            let mut allowed: Vec<DateTime<Utc>> = Vec::new();

            for gap in gaps {
                clock.advance(Duration::seconds(gap));
                if rt.block_on(limiter.check(&key)) == RateLimitDecision::Allowed {
                    allowed.push(clock.now());
                }
                let now = clock.now();
                let recent = allowed.iter().filter(|t| **t > now - Duration::minutes(1)).count();
                proptest::prop_assert!(recent <= 3);
            }
        }
    }

    #[tokio::test]
    async fn noop_rate_limiter_allows() {
        let key = RateLimitKey::login(TenantId::new(), "alice");
        for _ in 0..100 {
            assert_eq!(NoopRateLimiter.check(&key).await, RateLimitDecision::Allowed);
        }
    }
}
