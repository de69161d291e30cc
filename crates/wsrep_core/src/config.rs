//! Send monitor configuration.

use crate::error::{CoreError, CoreResult};

/// Configuration for creating a [`SendMonitor`](crate::SendMonitor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Number of wait queue slots. Must be a non-zero power of two.
    pub queue_len: usize,

    /// How many holders may be inside the monitor at once.
    pub concurrency: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            queue_len: 1024,
            concurrency: 1,
        }
    }
}

impl MonitorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the wait queue length.
    #[must_use]
    pub const fn queue_len(mut self, len: usize) -> Self {
        self.queue_len = len;
        self
    }

    /// Sets the concurrency degree.
    #[must_use]
    pub const fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Checks that the configuration describes a usable monitor.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.queue_len.is_power_of_two() {
            return Err(CoreError::InvalidQueueLength {
                len: self.queue_len,
            });
        }
        if self.concurrency == 0 {
            return Err(CoreError::InvalidConcurrency {
                concurrency: self.concurrency,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.queue_len, 1024);
        assert_eq!(config.concurrency, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = MonitorConfig::new().queue_len(16).concurrency(4);
        assert_eq!(config.queue_len, 16);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn rejects_non_power_of_two() {
        for len in [0, 3, 6, 100] {
            let err = MonitorConfig::new().queue_len(len).validate().unwrap_err();
            assert_eq!(err, CoreError::InvalidQueueLength { len });
        }
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = MonitorConfig::new().concurrency(0).validate().unwrap_err();
        assert_eq!(err, CoreError::InvalidConcurrency { concurrency: 0 });
    }
}
