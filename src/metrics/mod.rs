//! Performance Metrics Module
//!
//! Counters describing how a queue is being used: how often operations
//! succeed, how often dequeues find the queue empty, how much CAS contention
//! there is, and how the reclamation subsystem keeps up. Counters are
//! relaxed atomics and never take part in the queue's synchronization.

use core::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "std")]
use std::time::{Duration, Instant};

/// Snapshot of a queue's counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PerformanceMetrics {
    /// Completed enqueues
    pub enqueues: u64,
    /// Dequeues that returned a value
    pub dequeues: u64,
    /// Dequeues that observed an empty queue
    pub empty_dequeues: u64,
    /// CAS attempts lost to another thread (each one caused a retry)
    pub contended_operations: u64,
    /// Times a thread swung a lagging tail on behalf of another enqueue
    pub tail_helps: u64,
    /// Nodes handed to the reclamation subsystem
    pub nodes_retired: u64,
    /// Nodes freed or pooled by hazard scans
    pub nodes_reclaimed: u64,
    /// Enqueues that reused a pooled node instead of allocating
    pub nodes_recycled: u64,
    /// Average operation time in nanoseconds
    pub avg_operation_time_ns: u64,
    /// Maximum operation time in nanoseconds
    pub max_operation_time_ns: u64,
}

impl PerformanceMetrics {
    /// Total operations, successful or not.
    pub fn total_operations(&self) -> u64 {
        self.enqueues + self.dequeues + self.empty_dequeues
    }

    /// Contended CAS attempts per hundred operations.
    pub fn contention_rate(&self) -> f64 {
        let total = self.total_operations();
        if total == 0 {
            0.0
        } else {
            (self.contended_operations as f64 / total as f64) * 100.0
        }
    }

    /// Percentage of dequeues that found the queue empty.
    pub fn empty_rate(&self) -> f64 {
        let attempts = self.dequeues + self.empty_dequeues;
        if attempts == 0 {
            0.0
        } else {
            (self.empty_dequeues as f64 / attempts as f64) * 100.0
        }
    }

    /// Retired nodes that have not been reclaimed yet.
    pub fn pending_reclamation(&self) -> u64 {
        self.nodes_retired.saturating_sub(self.nodes_reclaimed)
    }

    /// Get average operation time as Duration
    #[cfg(feature = "std")]
    pub fn avg_operation_time(&self) -> Duration {
        Duration::from_nanos(self.avg_operation_time_ns)
    }

    /// Get maximum operation time as Duration
    #[cfg(feature = "std")]
    pub fn max_operation_time(&self) -> Duration {
        Duration::from_nanos(self.max_operation_time_ns)
    }
}

/// Measures one operation. Without `std` there is no clock and it measures
/// nothing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpTimer {
    #[cfg(feature = "std")]
    start: Instant,
}

impl OpTimer {
    #[inline]
    pub(crate) fn start() -> Self {
        Self {
            #[cfg(feature = "std")]
            start: Instant::now(),
        }
    }

    #[inline]
    fn elapsed_ns(&self) -> u64 {
        #[cfg(feature = "std")]
        {
            self.start.elapsed().as_nanos() as u64
        }
        #[cfg(not(feature = "std"))]
        {
            0
        }
    }
}

/// Internal atomic metrics collection
#[derive(Debug, Default)]
pub(crate) struct AtomicMetrics {
    enqueues: AtomicU64,
    dequeues: AtomicU64,
    empty_dequeues: AtomicU64,
    contended_operations: AtomicU64,
    tail_helps: AtomicU64,
    nodes_retired: AtomicU64,
    nodes_reclaimed: AtomicU64,
    nodes_recycled: AtomicU64,
    total_time_ns: AtomicU64,
    max_time_ns: AtomicU64,
}

impl AtomicMetrics {
    pub(crate) fn record_enqueue(&self, timer: OpTimer) {
        self.enqueues.fetch_add(1, Ordering::Relaxed);
        self.record_time(timer);
    }

    pub(crate) fn record_dequeue(&self, timer: OpTimer) {
        self.dequeues.fetch_add(1, Ordering::Relaxed);
        self.record_time(timer);
    }

    pub(crate) fn record_empty(&self, timer: OpTimer) {
        self.empty_dequeues.fetch_add(1, Ordering::Relaxed);
        self.record_time(timer);
    }

    pub(crate) fn record_contention(&self) {
        self.contended_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tail_help(&self) {
        self.tail_helps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retired(&self, reclaimed: usize) {
        self.nodes_retired.fetch_add(1, Ordering::Relaxed);
        self.record_reclaimed(reclaimed);
    }

    pub(crate) fn record_reclaimed(&self, reclaimed: usize) {
        if reclaimed > 0 {
            self.nodes_reclaimed
                .fetch_add(reclaimed as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_recycled(&self) {
        self.nodes_recycled.fetch_add(1, Ordering::Relaxed);
    }

    fn record_time(&self, timer: OpTimer) {
        let duration_ns = timer.elapsed_ns();
        self.total_time_ns.fetch_add(duration_ns, Ordering::Relaxed);

        // Update max time if this operation was slower
        let mut current_max = self.max_time_ns.load(Ordering::Relaxed);
        while duration_ns > current_max {
            match self.max_time_ns.compare_exchange_weak(
                current_max,
                duration_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_max = x,
            }
        }
    }

    /// Get current metrics snapshot
    pub(crate) fn snapshot(&self) -> PerformanceMetrics {
        let mut metrics = PerformanceMetrics {
            enqueues: self.enqueues.load(Ordering::Relaxed),
            dequeues: self.dequeues.load(Ordering::Relaxed),
            empty_dequeues: self.empty_dequeues.load(Ordering::Relaxed),
            contended_operations: self.contended_operations.load(Ordering::Relaxed),
            tail_helps: self.tail_helps.load(Ordering::Relaxed),
            nodes_retired: self.nodes_retired.load(Ordering::Relaxed),
            nodes_reclaimed: self.nodes_reclaimed.load(Ordering::Relaxed),
            nodes_recycled: self.nodes_recycled.load(Ordering::Relaxed),
            avg_operation_time_ns: 0,
            max_operation_time_ns: self.max_time_ns.load(Ordering::Relaxed),
        };
        let total = metrics.total_operations();
        if total > 0 {
            metrics.avg_operation_time_ns = self.total_time_ns.load(Ordering::Relaxed) / total;
        }
        metrics
    }

    /// Reset all counters
    pub(crate) fn reset(&self) {
        for counter in [
            &self.enqueues,
            &self.dequeues,
            &self.empty_dequeues,
            &self.contended_operations,
            &self.tail_helps,
            &self.nodes_retired,
            &self.nodes_reclaimed,
            &self.nodes_recycled,
            &self.total_time_ns,
            &self.max_time_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Trait for data structures that support performance metrics
pub trait MetricsCollector {
    /// Get current performance metrics
    fn metrics(&self) -> PerformanceMetrics;

    /// Reset all metrics
    fn reset_metrics(&self);

    /// Enable or disable metrics collection
    fn set_metrics_enabled(&self, enabled: bool);

    /// Check if metrics collection is enabled
    fn is_metrics_enabled(&self) -> bool;
}
