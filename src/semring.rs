// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The cross-process ordering barrier: a ring of POSIX semaphores
//! living in an anonymous shared mapping, so that forked workers can
//! pass the turn between separate address spaces.
//!
//! Slot `i` of the ring belongs to whoever owns the rows congruent to
//! `i`.  Slot 0 starts with one permit and the others with none; after
//! emitting row `r` a worker posts slot `(r + 1) mod N`, which wakes the
//! owner of row `r + 1`.

use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::barrier::{OrderingBarrier, POLL_INTERVAL};
use crate::errors::RenderError;
use crate::planes::owner;

/// A read-write mapping shared with every process forked after it was
/// created.  The length is rounded up to whole pages.
pub struct SharedSegment {
    ptr: *mut u8,
    len: usize,
}

impl SharedSegment {
    /// Maps at least `bytes` bytes of zeroed shared memory.
    pub fn new(bytes: usize) -> Result<Self, RenderError> {
        if bytes == 0 {
            return Err(RenderError::Config(
                "a shared segment must hold at least one byte".to_string(),
            ));
        }

        let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if page <= 0 {
            return Err(RenderError::resource(
                "determine the page size",
                io::Error::last_os_error(),
            ));
        }
        let page = page as usize;
        let len = ((bytes - 1) / page + 1) * page;

        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(RenderError::resource(
                "map a shared memory segment",
                io::Error::last_os_error(),
            ));
        }

        Ok(SharedSegment {
            ptr: ptr as *mut u8,
            len,
        })
    }

    /// The mapped length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// The start of the mapping, which is page aligned.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }
}

impl Drop for SharedSegment {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
    }
}

// SAFETY: the mapping lives until drop and all access to its contents
// goes through process-shared semaphores and atomics.
unsafe impl Send for SharedSegment {}
unsafe impl Sync for SharedSegment {}

/// The semaphore ring.  Works between threads as well as processes.
///
/// The segment starts with a cancellation flag that every process sees;
/// the semaphores follow it.  Waits wake up every `POLL_INTERVAL` to look
/// at that flag and at the caller's interrupt flag, so a worker parked
/// on a slot nobody will post still gets out.
pub struct SemaphoreRing {
    segment: SharedSegment,
    slots: usize,
}

// Byte offset of the first semaphore: past the flag, and aligned.
fn semaphores_offset() -> usize {
    mem::align_of::<libc::sem_t>().max(mem::size_of::<AtomicBool>())
}

// An absolute CLOCK_REALTIME deadline one poll interval from now, as
// sem_timedwait wants it.
fn poll_deadline() -> libc::timespec {
    let mut now = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_REALTIME, &mut now);
    }
    let nanos = now.tv_nsec as i64 + POLL_INTERVAL.as_nanos() as i64;
    libc::timespec {
        tv_sec: now.tv_sec + (nanos / 1_000_000_000) as libc::time_t,
        tv_nsec: (nanos % 1_000_000_000) as libc::c_long,
    }
}

impl SemaphoreRing {
    /// Creates a ring of `slots` semaphores; slot 0 holds the first turn.
    pub fn new(slots: usize) -> Result<Self, RenderError> {
        if slots == 0 {
            return Err(RenderError::Config(
                "a semaphore ring needs at least one slot".to_string(),
            ));
        }
        let segment =
            SharedSegment::new(semaphores_offset() + slots * mem::size_of::<libc::sem_t>())?;
        let ring = SemaphoreRing { segment, slots: 0 };
        ring.initialize(slots)
    }

    // Initializes the semaphores one by one, so that a failure part way
    // only destroys the ones that exist.  The flag is already false: the
    // mapping comes zeroed.
    fn initialize(mut self, slots: usize) -> Result<Self, RenderError> {
        for index in 0..slots {
            let permits = if index == 0 { 1 } else { 0 };
            if unsafe { libc::sem_init(self.semaphore(index), 1, permits) } < 0 {
                return Err(RenderError::resource(
                    format!("initialize semaphore {}", index),
                    io::Error::last_os_error(),
                ));
            }
            self.slots = index + 1;
        }
        debug!(
            "semaphore ring of {} slots in a {}-byte shared segment",
            self.slots,
            self.segment.len()
        );
        Ok(self)
    }

    fn semaphore(&self, index: usize) -> *mut libc::sem_t {
        unsafe {
            (self.segment.as_ptr().add(semaphores_offset()) as *mut libc::sem_t).add(index)
        }
    }

    fn slot(&self, index: usize) -> *mut libc::sem_t {
        debug_assert!(index < self.slots);
        self.semaphore(index)
    }

    fn cancelled(&self) -> &AtomicBool {
        unsafe { &*(self.segment.as_ptr() as *const AtomicBool) }
    }

    /// True once any process sharing the ring has aborted it.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled().load(Ordering::SeqCst)
    }

    /// Takes the permit of `index`, sleeping until one is posted.  The
    /// wait is abandoned as soon as the interrupt flag is raised or the
    /// ring is aborted, whether that happens before or during the wait.
    pub fn wait(&self, index: usize, interrupt: &AtomicBool) -> Result<(), RenderError> {
        loop {
            if interrupt.load(Ordering::SeqCst) || self.is_cancelled() {
                return Err(RenderError::Interrupted);
            }
            let deadline = poll_deadline();
            if unsafe { libc::sem_timedwait(self.slot(index), &deadline) } == 0 {
                break;
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ETIMEDOUT) | Some(libc::EINTR) => continue,
                _ => {
                    return Err(RenderError::resource(
                        format!("wait on semaphore {}", index),
                        err,
                    ))
                }
            }
        }

        if self.is_cancelled() {
            // Hand the wakeup on to anybody else parked here.
            self.post(index)?;
            return Err(RenderError::Interrupted);
        }
        Ok(())
    }

    /// Adds a permit to `index`.
    pub fn post(&self, index: usize) -> Result<(), RenderError> {
        if unsafe { libc::sem_post(self.slot(index)) } < 0 {
            return Err(RenderError::resource(
                format!("post semaphore {}", index),
                io::Error::last_os_error(),
            ));
        }
        Ok(())
    }
}

impl OrderingBarrier for SemaphoreRing {
    fn with_turn<T, F>(
        &self,
        worker: usize,
        row: usize,
        interrupt: &AtomicBool,
        emit: F,
    ) -> Result<T, RenderError>
    where
        F: FnOnce() -> Result<T, RenderError>,
    {
        // The slot is keyed by row; it names the worker only because
        // rows are dealt out round-robin.
        let slot = owner(row, self.slots);
        if slot != worker {
            return Err(RenderError::WorkerFailed {
                worker,
                reason: format!("row {} belongs to slot {}", row, slot),
            });
        }

        self.wait(slot, interrupt)?;
        if interrupt.load(Ordering::SeqCst) {
            return Err(RenderError::Interrupted);
        }
        let result = emit()?;
        let next = owner(row + 1, self.slots);
        self.post(next)?;
        debug!("row {} emitted by worker {}, posted slot {}", row, worker, next);
        Ok(result)
    }

    /// Marks the ring cancelled for every process that shares it and
    /// posts each slot, so waiters wake at once instead of at their next
    /// poll.
    fn abort(&self) {
        self.cancelled().store(true, Ordering::SeqCst);
        for index in 0..self.slots {
            // Nothing more can be done if a post fails while aborting.
            let _ = self.post(index);
        }
    }
}

impl Drop for SemaphoreRing {
    fn drop(&mut self) {
        for index in 0..self.slots {
            unsafe {
                libc::sem_destroy(self.slot(index));
            }
        }
    }
}
