//! Reclamation tuning for queues and hazard domains.

use crate::{Error, Result};

/// Default number of retired nodes a participant accumulates before scanning.
pub const DEFAULT_SCAN_THRESHOLD: usize = 32;

/// Default number of reclaimed nodes each hazard record keeps for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 64;

/// Configuration of a reclamation [`Domain`](crate::reclaim::Domain).
///
/// ```rust
/// use msqueue::Config;
///
/// let config = Config::new().with_scan_threshold(8).with_pool_capacity(0);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.scan_threshold(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    scan_threshold: usize,
    pool_capacity: usize,
}

impl Config {
    /// Creates the default configuration.
    pub const fn new() -> Self {
        Self {
            scan_threshold: DEFAULT_SCAN_THRESHOLD,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }

    /// Sets how many retired nodes trigger a hazard scan.
    ///
    /// Scans cost time proportional to the number of registered threads, so
    /// thresholds below twice the number of hazard slots in use mostly waste
    /// work. Must be at least 1.
    pub const fn with_scan_threshold(mut self, scan_threshold: usize) -> Self {
        self.scan_threshold = scan_threshold;
        self
    }

    /// Sets how many reclaimed nodes each record keeps for reuse.
    ///
    /// Zero disables pooling; reclaimed nodes then go straight back to the
    /// allocator.
    pub const fn with_pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.pool_capacity = pool_capacity;
        self
    }

    /// Number of retired nodes that triggers a hazard scan.
    #[inline]
    pub const fn scan_threshold(&self) -> usize {
        self.scan_threshold
    }

    /// Maximum number of pooled nodes per hazard record.
    #[inline]
    pub const fn pool_capacity(&self) -> usize {
        self.pool_capacity
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.scan_threshold == 0 {
            return Err(Error::InvalidConfig("scan threshold must be at least 1"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
