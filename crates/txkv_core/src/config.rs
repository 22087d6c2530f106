//! Overlay configuration and per-transaction options.

use std::time::Duration;

/// How a blocked caller waits for keys to be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockWait {
    /// Park until the lock table signals a release, then re-check.
    Notify,
    /// Re-check on a fixed interval. A zero interval yields to the
    /// scheduler between checks.
    Poll(Duration),
}

impl Default for LockWait {
    fn default() -> Self {
        Self::Notify
    }
}

/// Configuration for a [`crate::TxDb`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Timeout applied to transactions that don't set their own.
    pub default_timeout: Duration,

    /// Number of resolved-transaction events kept for polling.
    pub event_history: usize,

    /// Wait strategy for lock acquisition and gates.
    pub lock_wait: LockWait,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(10),
            event_history: 1024,
            lock_wait: LockWait::Notify,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default transaction timeout.
    #[must_use]
    pub const fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets how many events are retained for polling.
    #[must_use]
    pub const fn event_history(mut self, len: usize) -> Self {
        self.event_history = len;
        self
    }

    /// Sets the wait strategy.
    #[must_use]
    pub const fn lock_wait(mut self, wait: LockWait) -> Self {
        self.lock_wait = wait;
        self
    }
}

/// Options for a single transactional mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Overrides [`Config::default_timeout`] for this transaction only.
    pub timeout: Option<Duration>,
}

impl TxOptions {
    /// Creates options that use the overlay defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self { timeout: None }
    }

    /// Sets the transaction timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the transaction timeout in milliseconds.
    #[must_use]
    pub const fn with_timeout_ms(ms: u64) -> Self {
        Self::new().timeout(Duration::from_millis(ms))
    }

    /// Returns the timeout to arm, falling back to `config`.
    #[must_use]
    pub fn resolve_timeout(&self, config: &Config) -> Duration {
        self.timeout.unwrap_or(config.default_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.default_timeout, Duration::from_secs(10));
        assert_eq!(config.lock_wait, LockWait::Notify);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .default_timeout(Duration::from_millis(50))
            .event_history(8)
            .lock_wait(LockWait::Poll(Duration::ZERO));

        assert_eq!(config.default_timeout, Duration::from_millis(50));
        assert_eq!(config.event_history, 8);
        assert_eq!(config.lock_wait, LockWait::Poll(Duration::ZERO));
    }

    #[test]
    fn tx_options_override_default() {
        let config = Config::default();
        assert_eq!(TxOptions::new().resolve_timeout(&config), config.default_timeout);
        assert_eq!(
            TxOptions::with_timeout_ms(200).resolve_timeout(&config),
            Duration::from_millis(200)
        );
    }
}
