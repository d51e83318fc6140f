//! Hazard-pointer memory reclamation
//!
//! Lock-free structures cannot free a detached node the moment it is
//! unlinked: another thread may have loaded a pointer to it an instant
//! earlier and still be about to dereference it. This module implements
//! Michael's hazard pointers as a standalone subsystem with its own
//! lifecycle:
//!
//! 1. A [`Domain`] owns the set of hazard records and every object retired
//!    into it.
//! 2. A thread [registers](Domain::register) with the domain and receives a
//!    [`Participant`]. Dropping the participant unregisters the thread; its
//!    record is reused by the next thread that registers.
//! 3. Before dereferencing a shared pointer, the participant
//!    [protects](Participant::protect) it by publishing it in one of its
//!    hazard slots, and [clears](Participant::clear) the slot when done.
//! 4. An unlinked object is [retired](Participant::retire). Once enough
//!    objects have been retired, the participant [collects](Participant::collect):
//!    it snapshots every published hazard and frees every retired object
//!    that no hazard names. [`Domain::collect_all`] runs the same scan over
//!    the retired lists of every record nobody holds, which picks up objects
//!    left behind by threads that have unregistered.
//!
//! ## Node pooling
//!
//! Each record keeps a small private pool. A collected object goes to the
//! pool instead of the allocator while the pool has room, and
//! [`Participant::take_recycled`] hands it back out. Because objects only
//! enter the pool after a scan certified them unreachable, pooling cannot
//! reintroduce the ABA hazard.
//!
//! ## Example
//!
//! ```rust
//! use msqueue::reclaim::Domain;
//! use core::sync::atomic::{AtomicPtr, Ordering};
//!
//! let domain: Domain<u64> = Domain::new();
//! let shared = AtomicPtr::new(Box::into_raw(Box::new(7)));
//!
//! let mut participant = domain.register();
//! let ptr = participant.protect(0, &shared);
//! // SAFETY: `ptr` is protected, so it cannot be freed while we read it.
//! assert_eq!(unsafe { *ptr }, 7);
//! participant.clear(0);
//!
//! let old = shared.swap(core::ptr::null_mut(), Ordering::AcqRel);
//! // SAFETY: `old` came from `Box::into_raw` and is no longer reachable.
//! unsafe { participant.retire(old) };
//! assert_eq!(participant.collect(), 1);
//! ```

mod hazard;

pub use hazard::{Domain, Participant, HAZARDS_PER_RECORD};
