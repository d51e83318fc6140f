//! Hazard records, the domain that owns them, and per-thread participants.

use crate::config::Config;
use crate::loom::atomic::{fence, AtomicBool, AtomicPtr, AtomicUsize, Ordering};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::ptr;

/// Number of hazard slots owned by each registered participant.
///
/// The queue's dequeue path holds two pointers at once (the current head and
/// its successor); every other path needs one.
pub const HAZARDS_PER_RECORD: usize = 2;

/// Per-thread reclamation state, linked into its domain's record list.
///
/// `hazards` are read by every scanning thread. `retired` and `pool` belong
/// exclusively to whichever participant currently holds `active`.
struct HazardRecord<T> {
    hazards: [AtomicPtr<T>; HAZARDS_PER_RECORD],
    active: AtomicBool,
    next: AtomicPtr<HazardRecord<T>>,
    retired: UnsafeCell<Vec<*mut T>>,
    pool: UnsafeCell<Vec<Box<T>>>,
}

// SAFETY: the unsynchronized fields are only touched by the holder of
// `active`, and ownership moves between threads through the acquire/release
// pair on that flag.
unsafe impl<T: Send> Send for HazardRecord<T> {}
unsafe impl<T: Send> Sync for HazardRecord<T> {}

impl<T> HazardRecord<T> {
    /// Creates a record that is already claimed by its creator.
    fn new_active() -> Self {
        Self {
            hazards: core::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())),
            active: AtomicBool::new(true),
            next: AtomicPtr::new(ptr::null_mut()),
            retired: UnsafeCell::new(Vec::new()),
            pool: UnsafeCell::new(Vec::new()),
        }
    }

    /// Claims an inactive record.
    #[inline]
    fn try_acquire(&self) -> bool {
        !self.active.load(Ordering::Relaxed)
            && self
                .active
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    fn release(&self) {
        for hazard in &self.hazards {
            hazard.store(ptr::null_mut(), Ordering::Release);
        }
        self.active.store(false, Ordering::Release);
    }

    /// Frees or pools every retired object not named in `protected`.
    ///
    /// # Safety
    ///
    /// The caller must hold this record's `active` flag, and `protected` must
    /// be a sorted hazard snapshot taken after a `SeqCst` fence.
    unsafe fn collect(&self, protected: &[*mut T], pool_capacity: usize) -> usize {
        // SAFETY: `retired` and `pool` are distinct cells owned by the caller.
        let retired = unsafe { &mut *self.retired.get() };
        let pool = unsafe { &mut *self.pool.get() };

        let before = retired.len();
        retired.retain(|&ptr| {
            if protected.binary_search(&ptr).is_ok() {
                return true;
            }
            // SAFETY: retired objects came from `Box::into_raw`, are
            // unreachable, and no hazard names them.
            let object = unsafe { Box::from_raw(ptr) };
            if pool.len() < pool_capacity {
                pool.push(object);
            } else {
                drop(object);
            }
            false
        });
        let reclaimed = before - retired.len();

        tracing::trace!(
            reclaimed,
            kept = retired.len(),
            pooled = pool.len(),
            hazards = protected.len(),
            "hazard scan"
        );
        reclaimed
    }
}

impl<T> Drop for HazardRecord<T> {
    fn drop(&mut self) {
        for ptr in self.retired.get_mut().drain(..) {
            // SAFETY: retired objects came from `Box::into_raw` and the
            // domain is being torn down, so nothing can still observe them.
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

/// A reclamation domain: the hazard records of every thread that ever
/// registered, plus the objects they retired.
///
/// Objects retired into a domain are freed by a later
/// [`collect`](Participant::collect) or, at the latest, when the domain is
/// dropped. Records are never unlinked while the domain is alive, so walking
/// the record list needs no protection of its own.
pub struct Domain<T> {
    head: AtomicPtr<HazardRecord<T>>,
    records: AtomicUsize,
    config: Config,
    _marker: PhantomData<*mut T>,
}

// SAFETY: retired `T`s are dropped on whichever thread collects them, which
// requires `T: Send`. Shared access only goes through atomics and records
// claimed via `active`.
unsafe impl<T: Send> Send for Domain<T> {}
unsafe impl<T: Send> Sync for Domain<T> {}

impl<T> Domain<T> {
    /// Creates an empty domain with the default [`Config`].
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty domain.
    ///
    /// The configuration is not validated here; see [`Config::validate`].
    pub fn with_config(config: Config) -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            records: AtomicUsize::new(0),
            config,
            _marker: PhantomData,
        }
    }

    /// Returns the domain's configuration.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers the calling thread.
    ///
    /// Reuses an inactive record when one exists, otherwise allocates a new
    /// one and pushes it onto the record list. Never blocks.
    pub fn register(&self) -> Participant<'_, T> {
        let mut cursor = self.head.load(Ordering::Acquire);
        // SAFETY: records are only freed when the domain is dropped.
        while let Some(record) = unsafe { cursor.as_ref() } {
            if record.try_acquire() {
                return Participant::new(self, record);
            }
            cursor = record.next.load(Ordering::Acquire);
        }

        let record = Box::into_raw(Box::new(HazardRecord::new_active()));
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // SAFETY: `record` is not yet published, so we own it.
            unsafe { (*record).next.store(head, Ordering::Relaxed) };
            match self
                .head
                .compare_exchange_weak(head, record, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }

        let records = self.records.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(records, "allocated hazard record");

        // SAFETY: published records live as long as the domain.
        Participant::new(self, unsafe { &*record })
    }

    /// Number of hazard records allocated so far.
    ///
    /// This is the high-water mark of concurrently registered participants.
    #[inline]
    pub fn record_count(&self) -> usize {
        self.records.load(Ordering::Relaxed)
    }

    /// Total number of hazard slots a scan has to inspect.
    #[inline]
    pub fn hazard_count(&self) -> usize {
        self.record_count() * HAZARDS_PER_RECORD
    }

    /// Scans the retired lists of every record no thread currently holds,
    /// plus `own` if given, against a single hazard snapshot.
    ///
    /// Records held by other participants are skipped; their owners collect
    /// them. Returns the number of objects reclaimed.
    fn sweep(&self, own: Option<&HazardRecord<T>>) -> usize {
        let mut claimed = Vec::new();
        let mut cursor = self.head.load(Ordering::Acquire);
        // SAFETY: records are only freed when the domain is dropped.
        while let Some(record) = unsafe { cursor.as_ref() } {
            if record.try_acquire() {
                claimed.push(record);
            }
            cursor = record.next.load(Ordering::Acquire);
        }

        // Everything on a claimed list was retired before its record was
        // released, so the snapshot must come after claiming.
        fence(Ordering::SeqCst);
        let protected = self.protected();
        let pool_capacity = self.config.pool_capacity();

        let mut reclaimed = 0;
        for record in own.into_iter().chain(claimed.iter().copied()) {
            // SAFETY: the caller holds `own`, and `try_acquire` handed us
            // every claimed record.
            reclaimed += unsafe { record.collect(&protected, pool_capacity) };
        }
        for record in &claimed {
            record.release();
        }

        tracing::debug!(
            reclaimed,
            records = claimed.len() + usize::from(own.is_some()),
            "swept hazard domain"
        );
        reclaimed
    }

    /// Reclaims whatever it can from every record that is not in use.
    ///
    /// Unlike [`Participant::collect`], which only scans the caller's own
    /// retired list, this also drains objects left behind by participants
    /// that have since unregistered. Returns the number of objects
    /// reclaimed.
    pub fn collect_all(&self) -> usize {
        self.sweep(None)
    }

    /// Snapshot of every published hazard, sorted for binary search.
    fn protected(&self) -> Vec<*mut T> {
        let mut protected = Vec::with_capacity(self.hazard_count());
        let mut cursor = self.head.load(Ordering::Acquire);
        // SAFETY: records are only freed when the domain is dropped.
        while let Some(record) = unsafe { cursor.as_ref() } {
            for hazard in &record.hazards {
                let ptr = hazard.load(Ordering::Acquire);
                if !ptr.is_null() {
                    protected.push(ptr);
                }
            }
            cursor = record.next.load(Ordering::Acquire);
        }
        protected.sort_unstable();
        protected.dedup();
        protected
    }
}

impl<T> Default for Domain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Domain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("records", &self.record_count())
            .field("config", &self.config)
            .finish()
    }
}

impl<T> Drop for Domain<T> {
    fn drop(&mut self) {
        let mut cursor = self.head.load(Ordering::Relaxed);
        let mut freed = 0usize;
        while !cursor.is_null() {
            // SAFETY: `&mut self` proves no participant borrows the domain,
            // and every record was allocated with `Box::into_raw`.
            let record = unsafe { Box::from_raw(cursor) };
            if record.active.load(Ordering::Relaxed) {
                tracing::warn!("hazard record still held while its domain is dropped");
            }
            cursor = record.next.load(Ordering::Relaxed);
            drop(record);
            freed += 1;
        }
        tracing::debug!(records = freed, "hazard domain dropped");
    }
}

/// A thread's registration with a [`Domain`].
///
/// Dropping the participant clears its hazards and returns its record to the
/// domain. Objects it retired but could not free yet stay with the record and
/// are collected by the record's next owner or by the domain's destructor.
pub struct Participant<'d, T> {
    domain: &'d Domain<T>,
    record: &'d HazardRecord<T>,
}

impl<'d, T> Participant<'d, T> {
    fn new(domain: &'d Domain<T>, record: &'d HazardRecord<T>) -> Self {
        Self { domain, record }
    }

    /// Loads `source` and protects the loaded pointer in hazard `slot`.
    ///
    /// On return the pointer was still stored in `source` after the hazard
    /// became visible, so any thread that unlinks and retires it afterwards
    /// will see the hazard when it scans.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= HAZARDS_PER_RECORD`.
    #[inline]
    pub fn protect(&self, slot: usize, source: &AtomicPtr<T>) -> *mut T {
        let mut ptr = source.load(Ordering::Acquire);
        loop {
            self.publish(slot, ptr);
            let current = source.load(Ordering::Acquire);
            if current == ptr {
                return ptr;
            }
            ptr = current;
        }
    }

    /// Publishes `ptr` in hazard `slot` without validating it.
    ///
    /// The caller must re-check that `ptr` is still reachable before
    /// dereferencing it.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= HAZARDS_PER_RECORD`.
    #[inline]
    pub fn publish(&self, slot: usize, ptr: *mut T) {
        self.record.hazards[slot].store(ptr, Ordering::Release);
        // Orders the hazard store before the caller's validating load.
        fence(Ordering::SeqCst);
    }

    /// Clears hazard `slot`.
    #[inline]
    pub fn clear(&self, slot: usize) {
        self.record.hazards[slot].store(ptr::null_mut(), Ordering::Release);
    }

    /// Clears every hazard slot.
    #[inline]
    pub fn clear_all(&self) {
        for hazard in &self.record.hazards {
            hazard.store(ptr::null_mut(), Ordering::Release);
        }
    }

    /// Hands a detached object over to the domain.
    ///
    /// Runs [`collect`](Self::collect) once the retired list reaches the
    /// configured scan threshold and returns how many objects that scan
    /// reclaimed (zero when no scan ran).
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`Box::into_raw`], must no longer be reachable
    /// from the shared structure, and must not be retired twice.
    pub unsafe fn retire(&mut self, ptr: *mut T) -> usize {
        debug_assert!(!ptr.is_null(), "retired a null pointer");
        let pending = {
            let retired = self.retired_mut();
            retired.push(ptr);
            retired.len()
        };
        if pending >= self.domain.config.scan_threshold() {
            self.collect()
        } else {
            0
        }
    }

    /// Frees or pools every retired object that no hazard protects.
    ///
    /// Returns the number of objects reclaimed.
    pub fn collect(&mut self) -> usize {
        // Pairs with the fence in `publish`: either we see the hazard, or
        // the protecting thread sees the pointer already unlinked.
        fence(Ordering::SeqCst);
        let protected = self.domain.protected();
        // SAFETY: we hold the record.
        unsafe {
            self.record
                .collect(&protected, self.domain.config.pool_capacity())
        }
    }

    /// Like [`Domain::collect_all`], but also scans this participant's own
    /// retired list, which the domain-level sweep cannot claim.
    pub fn collect_all(&mut self) -> usize {
        self.domain.sweep(Some(self.record))
    }

    /// Takes an object from this record's pool.
    ///
    /// Pooled objects were certified unreachable by a scan; their contents
    /// are whatever they were when retired.
    #[inline]
    pub fn take_recycled(&mut self) -> Option<Box<T>> {
        // SAFETY: the pool is owned by the holder of the record.
        unsafe { &mut *self.record.pool.get() }.pop()
    }

    /// Number of objects retired but not yet reclaimed by this record.
    #[inline]
    pub fn retired_len(&self) -> usize {
        // SAFETY: the retired list is owned by the holder of the record.
        unsafe { &*self.record.retired.get() }.len()
    }

    /// Number of objects waiting in this record's pool.
    #[inline]
    pub fn pooled_len(&self) -> usize {
        // SAFETY: the pool is owned by the holder of the record.
        unsafe { &*self.record.pool.get() }.len()
    }

    /// Returns the domain this participant is registered with.
    #[inline]
    pub fn domain(&self) -> &'d Domain<T> {
        self.domain
    }

    #[inline]
    fn retired_mut(&mut self) -> &mut Vec<*mut T> {
        // SAFETY: the retired list is owned by the holder of the record.
        unsafe { &mut *self.record.retired.get() }
    }
}

impl<T> fmt::Debug for Participant<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("retired", &self.retired_len())
            .field("pooled", &self.pooled_len())
            .finish()
    }
}

impl<T> Drop for Participant<'_, T> {
    fn drop(&mut self) {
        self.record.release();
    }
}
