//! Michael–Scott lock-free FIFO queue
//!
//! An unbounded multi-producer, multi-consumer queue built as a singly linked
//! list that is only ever modified with compare-and-swap.
//!
//! ## Algorithm
//!
//! ```text
//!   head                                   tail
//!    |                                      |
//!    v                                      v
//! [sentinel] -> [ a ] -> [ b ] -> ... -> [ z ] -> null
//! ```
//!
//! - `head` always points at a sentinel whose payload is not part of the
//!   queue; the first value lives in the sentinel's successor.
//! - **Enqueue** links the new node after the last node with a CAS on its
//!   `next` field (the linearization point), then tries to swing `tail`.
//!   Swinging `tail` is cooperative: any thread that finds `tail` lagging one
//!   link behind advances it before doing its own work.
//! - **Dequeue** copies the payload out of the sentinel's successor and then
//!   CASes `head` forward (the linearization point). The successor becomes
//!   the new sentinel and the old sentinel is retired.
//!
//! ## Memory Reclamation
//!
//! Nodes are never freed when they are unlinked. Every dereference of a
//! shared node goes through a hazard pointer from the queue's own
//! [`Domain`], and unlinked sentinels are retired into that domain. A node is
//! freed, or pooled for reuse by a later enqueue, only after a scan proved
//! that no thread still publishes it. This rules out both use-after-free and
//! the ABA hazard on `head` and `tail`.
//!
//! ## Memory Ordering
//!
//! - Loads of `head`, `tail` and `next` use `Acquire`.
//! - The CAS linking a node uses `Release`, so a thread that reaches the node
//!   through `next` also sees its payload.
//! - Hazard publication is followed by a `SeqCst` fence, matched by a fence
//!   in the scanner.

use crate::config::Config;
use crate::loom::atomic::{AtomicPtr, Ordering};
use crate::loom::hint;
use crate::metrics::{AtomicMetrics, MetricsCollector, OpTimer, PerformanceMetrics};
use crate::reclaim::{Domain, Participant};
use crate::util::CachePadded;
use crate::Result;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::mem::MaybeUninit;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering as StdOrdering};

const HEAD_SLOT: usize = 0;
const NEXT_SLOT: usize = 1;
const TAIL_SLOT: usize = 0;

/// A link in the queue.
///
/// `value` is initialized from the moment the node is linked until a dequeue
/// moves it out; sentinels and pooled nodes hold no live payload.
pub(crate) struct Node<T> {
    value: MaybeUninit<T>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn sentinel() -> Box<Self> {
        Box::new(Self {
            value: MaybeUninit::uninit(),
            next: AtomicPtr::new(ptr::null_mut()),
        })
    }

    fn new(value: T) -> Box<Self> {
        Box::new(Self {
            value: MaybeUninit::new(value),
            next: AtomicPtr::new(ptr::null_mut()),
        })
    }
}

/// An unbounded lock-free multi-producer, multi-consumer FIFO queue.
///
/// [`enqueue`](Self::enqueue) never fails, [`dequeue`](Self::dequeue) returns
/// `None` as soon as it observes the queue empty. Neither ever blocks: a
/// thread only retries when another thread's CAS succeeded, so the queue as a
/// whole always makes progress.
///
/// # Examples
///
/// ```rust
/// use msqueue::LockFreeQueue;
/// use std::sync::Arc;
/// use std::thread;
///
/// let queue = Arc::new(LockFreeQueue::new());
///
/// let producer = thread::spawn({
///     let queue = Arc::clone(&queue);
///     move || {
///         for i in 0..1000 {
///             queue.enqueue(i);
///         }
///     }
/// });
///
/// let consumer = thread::spawn({
///     let queue = Arc::clone(&queue);
///     move || {
///         let mut sum = 0;
///         let mut received = 0;
///         while received < 1000 {
///             if let Some(value) = queue.dequeue() {
///                 sum += value;
///                 received += 1;
///             }
///         }
///         sum
///     }
/// });
///
/// producer.join().unwrap();
/// assert_eq!(consumer.join().unwrap(), 499500);
/// assert_eq!(queue.dequeue(), None);
/// ```
pub struct LockFreeQueue<T> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    tail: CachePadded<AtomicPtr<Node<T>>>,
    // Never less than the number of linked payloads: enqueue counts before
    // linking, dequeue uncounts after unlinking.
    len: CachePadded<AtomicUsize>,
    domain: Domain<Node<T>>,
    metrics: AtomicMetrics,
    metrics_enabled: AtomicBool,
}

// SAFETY: values move between threads through the queue, which requires
// `T: Send`; the queue never hands out shared references to them.
unsafe impl<T: Send> Send for LockFreeQueue<T> {}
unsafe impl<T: Send> Sync for LockFreeQueue<T> {}

impl<T> LockFreeQueue<T> {
    /// Creates an empty queue.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use msqueue::LockFreeQueue;
    ///
    /// let queue: LockFreeQueue<i32> = LockFreeQueue::new();
    /// assert!(queue.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::from_domain(Domain::new())
    }

    /// Creates an empty queue with the given reclamation configuration.
    ///
    /// # Panics
    ///
    /// Panics if `config` is invalid; see [`Config::validate`].
    pub fn with_config(config: Config) -> Self {
        match Self::try_with_config(config) {
            Ok(queue) => queue,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates an empty queue, rejecting an invalid configuration.
    ///
    /// ```rust
    /// use msqueue::{Config, Error, LockFreeQueue};
    ///
    /// let bad = Config::new().with_scan_threshold(0);
    /// assert!(matches!(
    ///     LockFreeQueue::<u8>::try_with_config(bad),
    ///     Err(Error::InvalidConfig(_))
    /// ));
    /// ```
    pub fn try_with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_domain(Domain::with_config(config)))
    }

    fn from_domain(domain: Domain<Node<T>>) -> Self {
        let sentinel = Box::into_raw(Node::sentinel());
        Self {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
            len: CachePadded::new(AtomicUsize::new(0)),
            domain,
            metrics: AtomicMetrics::default(),
            metrics_enabled: AtomicBool::new(true),
        }
    }

    /// Appends `value` to the back of the queue.
    ///
    /// Always succeeds. Allocates one node unless a reclaimed node is
    /// available for reuse.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use msqueue::LockFreeQueue;
    ///
    /// let queue = LockFreeQueue::new();
    /// queue.enqueue(42);
    /// assert_eq!(queue.len(), 1);
    /// ```
    pub fn enqueue(&self, value: T) {
        let mut participant = self.domain.register();
        self.enqueue_with(&mut participant, value);
    }

    /// Removes the value at the front of the queue.
    ///
    /// Returns `None` if the queue was observed empty. Emptiness is an
    /// ordinary outcome, not an error, and is reported immediately.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use msqueue::LockFreeQueue;
    ///
    /// let queue = LockFreeQueue::new();
    /// queue.enqueue(5);
    /// assert_eq!(queue.dequeue(), Some(5));
    /// assert_eq!(queue.dequeue(), None);
    /// ```
    pub fn dequeue(&self) -> Option<T> {
        let mut participant = self.domain.register();
        self.dequeue_with(&mut participant)
    }

    /// Enqueues every value from `values`, in order, and returns how many
    /// were enqueued.
    ///
    /// Values from one batch may interleave with concurrent enqueues.
    ///
    /// ```rust
    /// use msqueue::LockFreeQueue;
    ///
    /// let queue = LockFreeQueue::new();
    /// assert_eq!(queue.enqueue_batch(vec![1, 2, 3]), 3);
    /// assert_eq!(queue.dequeue_batch(10), vec![1, 2, 3]);
    /// ```
    pub fn enqueue_batch<I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let mut participant = self.domain.register();
        let mut count = 0;
        for value in values {
            self.enqueue_with(&mut participant, value);
            count += 1;
        }
        count
    }

    /// Dequeues up to `max_values` values, stopping early if the queue is
    /// observed empty.
    pub fn dequeue_batch(&self, max_values: usize) -> Vec<T> {
        let mut participant = self.domain.register();
        let mut values = Vec::new();
        while values.len() < max_values {
            match self.dequeue_with(&mut participant) {
                Some(value) => values.push(value),
                None => break,
            }
        }
        values
    }

    /// Returns `true` if the queue held no values at the moment it was
    /// inspected.
    pub fn is_empty(&self) -> bool {
        let participant = self.domain.register();
        let head = participant.protect(HEAD_SLOT, self.head.get());
        // SAFETY: `head` is protected, so it has not been freed.
        unsafe { (*head).next.load(Ordering::Acquire) }.is_null()
    }

    /// Approximate number of values in the queue.
    ///
    /// Under concurrent use this may briefly count values whose enqueue has
    /// not been linked yet. It is exact when the queue is quiescent.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.get().load(StdOrdering::Relaxed)
    }

    /// Runs a hazard scan over every idle participant's retired nodes now and
    /// returns how many it reclaimed.
    ///
    /// Nodes still protected, or retired by an operation that is in flight,
    /// stay pending. Scans otherwise happen automatically once a thread has
    /// retired [`Config::scan_threshold`] nodes.
    pub fn reclaim(&self) -> usize {
        let reclaimed = self.domain.collect_all();
        if self.is_metrics_enabled() {
            self.metrics.record_reclaimed(reclaimed);
        }
        reclaimed
    }

    /// Returns the reclamation configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        self.domain.config()
    }

    #[cfg(test)]
    pub(crate) fn domain_records(&self) -> usize {
        self.domain.record_count()
    }

    #[cfg(test)]
    pub(crate) fn domain(&self) -> &Domain<Node<T>> {
        &self.domain
    }

    fn enqueue_with(&self, participant: &mut Participant<'_, Node<T>>, value: T) {
        let timer = OpTimer::start();
        let record = self.is_metrics_enabled();
        let node = Box::into_raw(self.allocate(participant, value));
        self.len.get().fetch_add(1, StdOrdering::Relaxed);

        loop {
            let tail = participant.protect(TAIL_SLOT, self.tail.get());
            // SAFETY: `tail` is protected and was reachable when protected.
            let next = unsafe { (*tail).next.load(Ordering::Acquire) };

            if tail != self.tail.get().load(Ordering::Acquire) {
                continue;
            }

            if !next.is_null() {
                // Another enqueue linked a node but has not swung `tail` yet.
                if self
                    .tail
                    .get()
                    .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed)
                    .is_ok()
                    && record
                {
                    self.metrics.record_tail_help();
                }
                continue;
            }

            // SAFETY: `tail` is protected.
            let linked = unsafe {
                (*tail).next.compare_exchange(
                    ptr::null_mut(),
                    node,
                    Ordering::Release,
                    Ordering::Relaxed,
                )
            };
            match linked {
                Ok(_) => {
                    // Best effort; whoever observes the lag finishes it.
                    self.tail
                        .get()
                        .compare_exchange(tail, node, Ordering::Release, Ordering::Relaxed)
                        .ok();
                    break;
                }
                Err(_) => {
                    if record {
                        self.metrics.record_contention();
                    }
                    hint::spin_loop();
                }
            }
        }

        participant.clear(TAIL_SLOT);
        if record {
            self.metrics.record_enqueue(timer);
        }
    }

    fn dequeue_with(&self, participant: &mut Participant<'_, Node<T>>) -> Option<T> {
        let timer = OpTimer::start();
        let record = self.is_metrics_enabled();

        loop {
            let head = participant.protect(HEAD_SLOT, self.head.get());
            let tail = self.tail.get().load(Ordering::Acquire);
            // SAFETY: `head` is protected.
            let next = unsafe { (*head).next.load(Ordering::Acquire) };
            participant.publish(NEXT_SLOT, next);

            // `next` is only safe to read if it was still linked after its
            // hazard became visible, i.e. `head` has not moved.
            if head != self.head.get().load(Ordering::Acquire) {
                continue;
            }

            if head == tail {
                if next.is_null() {
                    participant.clear_all();
                    if record {
                        self.metrics.record_empty(timer);
                    }
                    return None;
                }
                if self
                    .tail
                    .get()
                    .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed)
                    .is_ok()
                    && record
                {
                    self.metrics.record_tail_help();
                }
                continue;
            }

            debug_assert!(!next.is_null(), "head lags behind tail but has no successor");
            if next.is_null() {
                continue;
            }

            // Copy the payload before the CAS: once `head` moves, the winner
            // owns it. Losers discard the copy without dropping it.
            // SAFETY: `next` is protected and its payload was initialized
            // before it was linked.
            let value = unsafe { ptr::read(&(*next).value) };

            if self
                .head
                .get()
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                participant.clear_all();
                self.len.get().fetch_sub(1, StdOrdering::Relaxed);
                // SAFETY: `head` came from `Box::into_raw`, is now unlinked,
                // and only the thread that won the CAS retires it.
                let reclaimed = unsafe { participant.retire(head) };
                if record {
                    self.metrics.record_retired(reclaimed);
                    self.metrics.record_dequeue(timer);
                }
                // SAFETY: the node was linked by an enqueue, which
                // initialized the payload, and this thread won it.
                return Some(unsafe { value.assume_init() });
            }

            if record {
                self.metrics.record_contention();
            }
            hint::spin_loop();
        }
    }

    /// Takes a pooled node if one is available, otherwise allocates.
    fn allocate(&self, participant: &mut Participant<'_, Node<T>>, value: T) -> Box<Node<T>> {
        match participant.take_recycled() {
            Some(mut node) => {
                node.value = MaybeUninit::new(value);
                node.next.store(ptr::null_mut(), Ordering::Relaxed);
                if self.is_metrics_enabled() {
                    self.metrics.record_recycled();
                }
                node
            }
            None => Node::new(value),
        }
    }
}

impl<T> Default for LockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Extend<T> for LockFreeQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.enqueue_batch(iter);
    }
}

impl<T> FromIterator<T> for LockFreeQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let queue = Self::new();
        queue.enqueue_batch(iter);
        queue
    }
}

impl<T> fmt::Debug for LockFreeQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("len", &self.len())
            .field("domain", &self.domain)
            .field("metrics_enabled", &self.is_metrics_enabled())
            .finish()
    }
}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        // The chain from `head` holds the sentinel and every undequeued
        // payload. Retired and pooled nodes belong to `domain`, which frees
        // them when it is dropped after this.
        let sentinel = self.head.get().load(Ordering::Relaxed);
        // SAFETY: `&mut self` excludes every other thread, and every node
        // in the chain came from `Box::into_raw`.
        let mut current = unsafe { Box::from_raw(sentinel) }
            .next
            .load(Ordering::Relaxed);
        while !current.is_null() {
            // SAFETY: as above; non-sentinel nodes carry a live payload.
            let mut node = unsafe { Box::from_raw(current) };
            unsafe { node.value.assume_init_drop() };
            current = node.next.load(Ordering::Relaxed);
        }
    }
}

impl<T> MetricsCollector for LockFreeQueue<T> {
    fn metrics(&self) -> PerformanceMetrics {
        self.metrics.snapshot()
    }

    fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn set_metrics_enabled(&self, enabled: bool) {
        self.metrics_enabled.store(enabled, StdOrdering::Relaxed);
    }

    fn is_metrics_enabled(&self) -> bool {
        self.metrics_enabled.load(StdOrdering::Relaxed)
    }
}
