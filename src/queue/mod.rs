//! Queue implementations
//!
//! - [`LockFreeQueue`]: unbounded multi-producer, multi-consumer FIFO queue
//!   (Michael–Scott), with hazard-pointer reclamation of dequeued nodes.
//!
//! ## Guarantees
//!
//! - **Lock-free**: no operation ever holds a lock; a stalled thread cannot
//!   stop others from completing.
//! - **Linearizable FIFO**: values come out in the order their enqueues took
//!   effect.
//! - **Memory safe without a garbage collector**: nodes are reclaimed through
//!   [`crate::reclaim`], never while another thread may still read them.
//!
//! ## Examples
//!
//! ```rust
//! use msqueue::queue::LockFreeQueue;
//!
//! let queue = LockFreeQueue::new();
//! queue.enqueue(1);
//! queue.enqueue(2);
//! queue.enqueue(3);
//!
//! assert_eq!(queue.dequeue(), Some(1));
//! assert_eq!(queue.dequeue(), Some(2));
//! assert_eq!(queue.dequeue(), Some(3));
//! assert_eq!(queue.dequeue(), None);
//! ```
pub mod michael_scott;

pub use michael_scott::LockFreeQueue;


#[cfg(all(test, not(loom)))]
mod proptests;

#[cfg(all(test, loom))]
mod loom_tests;
