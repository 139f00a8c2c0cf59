//! # Delay before relaunching a crashed process.
//!
//! Every relaunch waits the same fixed delay, 3 seconds by default, with no retry
//! limit.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use proxyvisor::BackoffPolicy;
//!
//! assert_eq!(BackoffPolicy::default().delay(), Duration::from_secs(3));
//! assert_eq!(BackoffPolicy::fixed(Duration::from_millis(250)).delay(), Duration::from_millis(250));
//! ```

use std::time::Duration;

/// Delay between a failed exit and its relaunch.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(3);

/// Fixed-interval relaunch backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    delay: Duration,
}

impl Default for BackoffPolicy {
    /// Fixed [`DEFAULT_RESTART_DELAY`].
    fn default() -> Self {
        Self::fixed(DEFAULT_RESTART_DELAY)
    }
}

impl BackoffPolicy {
    /// Constant delay for every relaunch.
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// Delay before the next relaunch.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_three_seconds() {
        assert_eq!(BackoffPolicy::default().delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_fixed_delay_is_kept() {
        let policy = BackoffPolicy::fixed(Duration::ZERO);
        assert_eq!(policy.delay(), Duration::ZERO);
    }
}
