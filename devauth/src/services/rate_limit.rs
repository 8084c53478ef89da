//! Sliding-window rate limiting and failed-login lockout, both backed by the
//! shared counter store.

use std::sync::Arc;
use std::time::Duration;

use crate::services::counters::{CounterError, CounterStore};

/// Outcome of a rate-limit check, exposed for response headers.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
}

/// Sliding-window request throttle keyed by caller identity.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, limit: u32, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Check and record one request for `identifier`.
    ///
    /// The attempt is recorded even when rejected, so a hostile client
    /// cannot reset its window by retrying.
    pub async fn check(&self, identifier: &str) -> Result<RateDecision, CounterError> {
        let key = format!("rate_limit:{}", identifier);
        let count = self.store.record_request(&key, self.window).await?;

        if count >= u64::from(self.limit) {
            return Ok(RateDecision {
                allowed: false,
                limit: self.limit,
                remaining: 0,
            });
        }

        Ok(RateDecision {
            allowed: true,
            limit: self.limit,
            remaining: self.limit - count as u32 - 1,
        })
    }

    /// Remaining requests for `identifier` without recording one.
    pub async fn remaining_requests(&self, identifier: &str) -> Result<u32, CounterError> {
        let key = format!("rate_limit:{}", identifier);
        let count = self.store.window_count(&key).await?;
        Ok(self.limit.saturating_sub(count as u32))
    }
}

/// Failed-login counter and timed lockout per (email, ip) pair.
///
/// The pair scoping means an attacker spread across many IPs cannot lock a
/// user out of their usual address, and one IP attacking many accounts is
/// throttled per account.
#[derive(Clone)]
pub struct BruteForceGuard {
    store: Arc<dyn CounterStore>,
    max_attempts: u32,
    lockout: Duration,
}

impl BruteForceGuard {
    pub fn new(store: Arc<dyn CounterStore>, max_attempts: u32, lockout: Duration) -> Self {
        Self {
            store,
            max_attempts,
            lockout,
        }
    }

    fn attempts_key(email: &str, ip_address: &str) -> String {
        format!("login_attempts:{}:{}", email, ip_address)
    }

    fn lockout_key(email: &str, ip_address: &str) -> String {
        format!("login_blocked:{}:{}", email, ip_address)
    }

    /// Record one failed attempt; returns `(now_locked, attempts_remaining)`.
    pub async fn record_failed_attempt(
        &self,
        email: &str,
        ip_address: &str,
    ) -> Result<(bool, u32), CounterError> {
        let attempts = self
            .store
            .increment(&Self::attempts_key(email, ip_address), self.lockout)
            .await?;

        if attempts >= i64::from(self.max_attempts) {
            self.store
                .set_flag(&Self::lockout_key(email, ip_address), self.lockout)
                .await?;
            return Ok((true, 0));
        }

        Ok((false, self.max_attempts - attempts as u32))
    }

    /// Whether the pair is currently locked out. Callers check this before
    /// touching the credential hasher so locked accounts short-circuit.
    pub async fn check_lockout(&self, email: &str, ip_address: &str) -> Result<bool, CounterError> {
        self.store
            .flag_exists(&Self::lockout_key(email, ip_address))
            .await
    }

    /// Drop the counter and the lockout flag. Only called after a fully
    /// successful login.
    pub async fn clear_attempts(&self, email: &str, ip_address: &str) -> Result<(), CounterError> {
        self.store
            .remove(&[
                &Self::attempts_key(email, ip_address),
                &Self::lockout_key(email, ip_address),
            ])
            .await
    }

    pub async fn remaining_attempts(
        &self,
        email: &str,
        ip_address: &str,
    ) -> Result<u32, CounterError> {
        let attempts = self
            .store
            .get_counter(&Self::attempts_key(email, ip_address))
            .await?
            .unwrap_or(0);
        Ok(self.max_attempts.saturating_sub(attempts.max(0) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::counters::InMemoryCounterStore;

    fn limiter(limit: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(Arc::new(InMemoryCounterStore::new()), limit, window)
    }

    fn guard(max_attempts: u32, lockout: Duration) -> BruteForceGuard {
        BruteForceGuard::new(Arc::new(InMemoryCounterStore::new()), max_attempts, lockout)
    }

    #[tokio::test]
    async fn first_n_requests_accepted_then_rejected() {
        let limiter = limiter(3, Duration::from_secs(60));

        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(limiter.check("client-1").await.unwrap().allowed);
        }

        assert_eq!(outcomes, vec![true, true, true, false, false]);
    }

    #[tokio::test]
    async fn remaining_counts_down_and_rejection_reports_zero() {
        let limiter = limiter(3, Duration::from_secs(60));

        assert_eq!(limiter.check("c").await.unwrap().remaining, 2);
        assert_eq!(limiter.check("c").await.unwrap().remaining, 1);
        assert_eq!(limiter.check("c").await.unwrap().remaining, 0);
        let rejected = limiter.check("c").await.unwrap();
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
    }

    #[tokio::test]
    async fn window_elapse_admits_new_requests() {
        let limiter = limiter(2, Duration::from_millis(200));

        assert!(limiter.check("c").await.unwrap().allowed);
        assert!(limiter.check("c").await.unwrap().allowed);
        assert!(!limiter.check("c").await.unwrap().allowed);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(limiter.check("c").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn identifiers_are_independent() {
        let limiter = limiter(1, Duration::from_secs(60));

        assert!(limiter.check("a").await.unwrap().allowed);
        assert!(!limiter.check("a").await.unwrap().allowed);
        assert!(limiter.check("b").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn lockout_engages_at_threshold() {
        let guard = guard(5, Duration::from_secs(900));

        for attempt in 1..=4 {
            let (locked, remaining) = guard
                .record_failed_attempt("user@example.com", "10.0.0.1")
                .await
                .unwrap();
            assert!(!locked);
            assert_eq!(remaining, 5 - attempt);
            assert!(!guard
                .check_lockout("user@example.com", "10.0.0.1")
                .await
                .unwrap());
        }

        let (locked, remaining) = guard
            .record_failed_attempt("user@example.com", "10.0.0.1")
            .await
            .unwrap();
        assert!(locked);
        assert_eq!(remaining, 0);
        assert!(guard
            .check_lockout("user@example.com", "10.0.0.1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn lockout_is_pair_scoped() {
        let guard = guard(2, Duration::from_secs(900));

        guard
            .record_failed_attempt("a@example.com", "10.0.0.1")
            .await
            .unwrap();
        guard
            .record_failed_attempt("a@example.com", "10.0.0.1")
            .await
            .unwrap();

        assert!(guard.check_lockout("a@example.com", "10.0.0.1").await.unwrap());
        // Same email from another origin, same origin with another email:
        // both unaffected.
        assert!(!guard.check_lockout("a@example.com", "10.0.0.2").await.unwrap());
        assert!(!guard.check_lockout("b@example.com", "10.0.0.1").await.unwrap());
    }

    #[tokio::test]
    async fn clear_attempts_removes_lock_immediately() {
        let guard = guard(2, Duration::from_secs(900));

        guard
            .record_failed_attempt("a@example.com", "10.0.0.1")
            .await
            .unwrap();
        guard
            .record_failed_attempt("a@example.com", "10.0.0.1")
            .await
            .unwrap();
        assert!(guard.check_lockout("a@example.com", "10.0.0.1").await.unwrap());

        guard
            .clear_attempts("a@example.com", "10.0.0.1")
            .await
            .unwrap();
        assert!(!guard.check_lockout("a@example.com", "10.0.0.1").await.unwrap());
        assert_eq!(
            guard
                .remaining_attempts("a@example.com", "10.0.0.1")
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn lockout_expires_with_ttl() {
        let guard = guard(1, Duration::from_millis(150));

        guard
            .record_failed_attempt("a@example.com", "10.0.0.1")
            .await
            .unwrap();
        assert!(guard.check_lockout("a@example.com", "10.0.0.1").await.unwrap());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!guard.check_lockout("a@example.com", "10.0.0.1").await.unwrap());
    }
}
