//! # msqueue
//!
//! An unbounded, lock-free, multi-producer/multi-consumer FIFO queue based on
//! the Michael–Scott algorithm, with explicit hazard-pointer memory
//! reclamation.
//!
//! ## Features
//!
//! - **[`LockFreeQueue`]**: a singly linked list manipulated only through
//!   compare-and-swap. `enqueue` never fails, `dequeue` returns `None`
//!   immediately when the queue is empty, and nothing ever blocks.
//! - **[`reclaim`]**: hazard pointers as a standalone subsystem. Dequeued
//!   nodes are retired into it and freed only once no thread can still be
//!   reading them, which also rules out the ABA hazard.
//! - **Node pooling**: reclaimed nodes are recycled by later enqueues, but
//!   only after a hazard scan certified them unreachable.
//! - **Metrics**: contention, emptiness and reclamation counters through
//!   [`MetricsCollector`](metrics::MetricsCollector).
//!
//! ## Quick Start
//!
//! ```rust
//! use msqueue::LockFreeQueue;
//!
//! let queue = LockFreeQueue::new();
//! queue.enqueue(42);
//! assert_eq!(queue.dequeue(), Some(42));
//! assert_eq!(queue.dequeue(), None);
//! ```
//!
//! ## Thread Safety
//!
//! `LockFreeQueue<T>` is `Send + Sync` for any `T: Send`. Share it through an
//! `Arc` (or a scoped thread borrow) and call `enqueue`/`dequeue` from any
//! number of threads.
//!
//! ## Cancellation
//!
//! Operations have no timeout. A caller that wants to wait for a value with
//! a deadline polls [`LockFreeQueue::dequeue`] and gives up on its own
//! schedule.

#![no_std]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

extern crate alloc;

pub mod config;
pub mod metrics;
pub mod queue;
pub mod reclaim;

mod loom;

pub use crate::config::Config;
pub use crate::queue::LockFreeQueue;

/// Common utilities and helper types
pub mod util {
    use core::fmt;
    use core::ops::{Deref, DerefMut};

    /// Cache line size for alignment purposes
    pub const CACHE_LINE_SIZE: usize = 64;

    /// Pads and aligns a value to a cache line so that the queue's head and
    /// tail never share one.
    #[repr(align(64))]
    #[derive(Default)]
    pub struct CachePadded<T> {
        value: T,
    }

    impl<T> CachePadded<T> {
        /// Create a new cache-padded value
        #[inline]
        pub const fn new(value: T) -> Self {
            Self { value }
        }

        /// Get a reference to the inner value
        #[inline]
        pub const fn get(&self) -> &T {
            &self.value
        }

        /// Get a mutable reference to the inner value
        #[inline]
        pub fn get_mut(&mut self) -> &mut T {
            &mut self.value
        }

        /// Get the inner value
        #[inline]
        pub fn into_inner(self) -> T {
            self.value
        }
    }

    impl<T> Deref for CachePadded<T> {
        type Target = T;

        #[inline]
        fn deref(&self) -> &T {
            &self.value
        }
    }

    impl<T> DerefMut for CachePadded<T> {
        #[inline]
        fn deref_mut(&mut self) -> &mut T {
            &mut self.value
        }
    }

    impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt::Debug::fmt(&self.value, f)
        }
    }
}

/// Error types for msqueue operations
///
/// Queue operations themselves cannot fail: an empty queue is reported as
/// `None`. Errors only arise when building a queue from a bad [`Config`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The configuration cannot be used
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Result type for msqueue operations
pub type Result<T> = core::result::Result<T, Error>;
