//! Log throttling
//!
//! Keeps a camera that keeps failing (gateway down, wrong credentials) from
//! flooding the log with the same warning.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Limits how often a message with the same key is logged
pub struct LogThrottler {
    last_logged: Mutex<HashMap<String, Instant>>,
    interval: Duration,
}

impl LogThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_logged: Mutex::new(HashMap::new()),
            interval,
        }
    }

    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Returns `true` (and restarts the interval) if `key` may be logged now
    pub fn should_log(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut map = self.last_logged.lock();

        match map.get(key) {
            Some(last) if now.duration_since(*last) < self.interval => false,
            _ => {
                map.insert(key.to_string(), now);
                true
            }
        }
    }

    /// Forget `key`; call when the condition recovered so the next failure is logged
    pub fn clear(&self, key: &str) {
        self.last_logged.lock().remove(key);
    }

    pub fn clear_all(&self) {
        self.last_logged.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.last_logged.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_logged.lock().is_empty()
    }
}

impl Default for LogThrottler {
    /// 5 second interval
    fn default() -> Self {
        Self::with_secs(5)
    }
}

/// Throttled `tracing::warn!`
///
/// ```rust
/// use camview::utils::LogThrottler;
/// use camview::warn_throttled;
///
/// let throttler = LogThrottler::default();
/// warn_throttled!(throttler, "cam1", "Stream {} failed: {}", "cam1", "HTTP 401");
/// ```
#[macro_export]
macro_rules! warn_throttled {
    ($throttler:expr, $key:expr, $($arg:tt)*) => {
        if $throttler.should_log($key) {
            tracing::warn!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_throttling() {
        let throttler = LogThrottler::new(Duration::from_millis(100));

        assert!(throttler.should_log("cam1"));
        assert!(!throttler.should_log("cam1"));

        thread::sleep(Duration::from_millis(150));
        assert!(throttler.should_log("cam1"));
    }

    #[test]
    fn test_keys_are_independent() {
        let throttler = LogThrottler::with_secs(10);

        assert!(throttler.should_log("cam1"));
        assert!(throttler.should_log("cam2"));
        assert!(!throttler.should_log("cam1"));
        assert_eq!(throttler.len(), 2);
    }

    #[test]
    fn test_clear() {
        let throttler = LogThrottler::with_secs(10);

        assert!(throttler.should_log("cam1"));
        throttler.clear("cam1");
        assert!(throttler.should_log("cam1"));

        throttler.clear_all();
        assert!(throttler.is_empty());
    }
}
