use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;

/// Sliding-window counters for outbound writes, keyed by caller and route.
///
/// Buckets grow only while a key keeps writing; [`RateLimitStore::sweep`]
/// drops buckets whose hits have all aged out of the window and is driven by
/// a periodic task rather than by request traffic.
#[derive(Debug, Clone)]
pub struct RateLimitStore {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl RateLimitStore {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Record an attempt. Returns whether it is allowed plus the budget left
    /// inside the current window.
    pub fn allow(&self, key: &str, route: &str) -> (bool, u32) {
        let bucket_key = format!("{key}:{route}");
        let now = Instant::now();
        let window = self.window;

        let mut entry = self.buckets.entry(bucket_key).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let remaining = self.max_requests.saturating_sub(entry.len() as u32);
        if remaining == 0 {
            return (false, 0);
        }

        entry.push(now);
        // after push, one fewer slot remains
        (true, remaining.saturating_sub(1))
    }

    /// Drop buckets with no hit inside the window, returning how many were
    /// evicted.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let window = self.window;
        let before = self.buckets.len();
        self.buckets.retain(|_, hits| {
            hits.retain(|instant| now.duration_since(*instant) < window);
            !hits.is_empty()
        });
        before.saturating_sub(self.buckets.len())
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn enforces_the_window_budget_per_key() {
        let limiter = RateLimitStore::new(Duration::from_secs(60), 2);
        assert_eq!(limiter.allow("acct", "blogs:write"), (true, 1));
        assert_eq!(limiter.allow("acct", "blogs:write"), (true, 0));
        assert_eq!(limiter.allow("acct", "blogs:write"), (false, 0));
        // A different key is budgeted independently.
        assert_eq!(limiter.allow("other", "blogs:write"), (true, 1));
    }

    #[test]
    fn budget_refills_once_the_window_passes() {
        let limiter = RateLimitStore::new(Duration::from_millis(40), 1);
        assert!(limiter.allow("acct", "blogs:write").0);
        assert!(!limiter.allow("acct", "blogs:write").0);

        thread::sleep(Duration::from_millis(60));
        assert!(limiter.allow("acct", "blogs:write").0);
    }

    #[test]
    fn sweep_evicts_only_idle_buckets() {
        let limiter = RateLimitStore::new(Duration::from_millis(40), 3);
        limiter.allow("stale", "blogs:write");
        thread::sleep(Duration::from_millis(60));
        limiter.allow("fresh", "blogs:write");

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.bucket_count(), 1);
        assert_eq!(limiter.allow("fresh", "blogs:write"), (true, 1));
    }
}
