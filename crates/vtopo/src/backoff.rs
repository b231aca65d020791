//! Jittered retry delay for waiters hitting transient store errors.

use std::time::Duration;

/// Fixed floor plus uniform random jitter.
///
/// Many waiters can observe the same store disruption at once; the wide
/// jitter spreads their retries out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub floor: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            floor: Duration::from_secs(5),
            jitter: Duration::from_secs(55),
        }
    }
}

impl RetryPolicy {
    pub fn new(floor: Duration, jitter: Duration) -> Self {
        Self { floor, jitter }
    }

    /// A delay in `[floor, floor + jitter)`.
    pub fn next_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::random::<u64>() % jitter_ms
        };
        self.floor + Duration::from_millis(extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_five_seconds_plus_up_to_fifty_five() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.next_delay();
            assert!(delay >= Duration::from_secs(5));
            assert!(delay < Duration::from_secs(60));
        }
    }

    #[test]
    fn zero_jitter_is_exactly_the_floor() {
        let policy = RetryPolicy::new(Duration::from_millis(20), Duration::ZERO);
        assert_eq!(policy.next_delay(), Duration::from_millis(20));
    }
}
