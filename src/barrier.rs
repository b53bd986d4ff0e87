// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Ordering barriers.  Workers compute their rows in parallel but must
//! hand them to the sink in ascending order; a barrier grants each
//! worker its turn.  Because worker `id` owns rows `id, id + N, ...`,
//! turns simply go round the workers, and the worker holding the turn
//! always has the next row.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use log::debug;

use crate::errors::RenderError;

/// How long a waiting worker sleeps before it looks at the interrupt
/// flag again, if nobody wakes it sooner.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Grants workers permission to emit, one row at a time, in row order.
pub trait OrderingBarrier {
    /// Blocks until `worker` may emit `row`, runs `emit`, and passes the
    /// turn to the owner of the next row.  Returns `Interrupted` if the
    /// interrupt flag is raised or the barrier is aborted while waiting.
    fn with_turn<T, F>(
        &self,
        worker: usize,
        row: usize,
        interrupt: &AtomicBool,
        emit: F,
    ) -> Result<T, RenderError>
    where
        F: FnOnce() -> Result<T, RenderError>;

    /// Releases every waiting worker with an error.  Used when one
    /// worker fails and the render cannot continue.
    fn abort(&self);
}

struct Turn {
    next: usize,
    aborted: bool,
}

/// The barrier for workers that share an address space: the turn token
/// lives under a mutex, and every change of turn is broadcast on a
/// condition variable so each waiter can check whether it is next.
pub struct TurnBarrier {
    workers: usize,
    turn: Mutex<Turn>,
    changed: Condvar,
    blocked: AtomicUsize,
}

impl TurnBarrier {
    /// A barrier for `workers` workers.  Worker 0 has the first turn.
    pub fn new(workers: usize) -> Result<Self, RenderError> {
        if workers == 0 {
            return Err(RenderError::Config(
                "an ordering barrier needs at least one worker".to_string(),
            ));
        }
        Ok(TurnBarrier {
            workers,
            turn: Mutex::new(Turn {
                next: 0,
                aborted: false,
            }),
            changed: Condvar::new(),
            blocked: AtomicUsize::new(0),
        })
    }

    /// How many times a worker found it was not its turn and had to wait.
    pub fn blocked_waits(&self) -> usize {
        self.blocked.load(Ordering::SeqCst)
    }

    fn lock(&self, worker: usize) -> Result<MutexGuard<Turn>, RenderError> {
        self.turn.lock().map_err(|_| poisoned(worker))
    }
}

fn poisoned(worker: usize) -> RenderError {
    RenderError::WorkerFailed {
        worker,
        reason: "another worker panicked while holding the turn".to_string(),
    }
}

impl OrderingBarrier for TurnBarrier {
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
        let mut turn = self.lock(worker)?;
        if turn.next != worker {
            self.blocked.fetch_add(1, Ordering::SeqCst);
        }
        while turn.next != worker {
            if turn.aborted || interrupt.load(Ordering::SeqCst) {
                return Err(RenderError::Interrupted);
            }
            let (guard, _) = self
                .changed
                .wait_timeout(turn, POLL_INTERVAL)
                .map_err(|_| poisoned(worker))?;
            turn = guard;
        }
        if turn.aborted || interrupt.load(Ordering::SeqCst) {
            return Err(RenderError::Interrupted);
        }

        let result = emit();
        match result {
            Ok(_) => {
                turn.next = (worker + 1) % self.workers;
                debug!("row {} emitted by worker {}, turn passes to {}", row, worker, turn.next);
            }
            Err(_) => turn.aborted = true,
        }
        self.changed.notify_all();
        result
    }

    fn abort(&self) {
        // A poisoned lock still holds a usable turn.
        let mut turn = match self.turn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        turn.aborted = true;
        self.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    // Runs `workers` threads over `rows` rows, with later rows computed
    // faster than earlier ones, and returns the order rows were emitted.
    fn run(workers: usize, rows: usize) -> (Vec<usize>, usize) {
        let barrier = Arc::new(TurnBarrier::new(workers).unwrap());
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let interrupt = Arc::new(AtomicBool::new(false));
        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let barrier = barrier.clone();
                let emitted = emitted.clone();
                let interrupt = interrupt.clone();
                thread::spawn(move || {
                    for row in (id..rows).step_by(workers) {
                        thread::sleep(Duration::from_millis(((rows - row) % 4) as u64));
                        barrier
                            .with_turn(id, row, &interrupt, || {
                                emitted.lock().unwrap().push(row);
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let order = emitted.lock().unwrap().clone();
        (order, barrier.blocked_waits())
    }

    #[test]
    fn rows_come_out_in_order() {
        for &workers in &[1, 2, 3, 5, 8] {
            let (order, _) = run(workers, 23);
            assert_eq!(order, (0..23).collect::<Vec<_>>());
        }
    }

    #[test]
    fn a_single_worker_never_waits() {
        let (order, waits) = run(1, 10);
        assert_eq!(order.len(), 10);
        assert_eq!(waits, 0);
    }

    #[test]
    fn idle_workers_do_not_hold_up_the_ring() {
        let (order, _) = run(8, 3);
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(TurnBarrier::new(0).is_err());
    }

    #[test]
    fn waiters_give_up_when_interrupted() {
        let barrier = TurnBarrier::new(2).unwrap();
        let interrupt = AtomicBool::new(true);
        let result = barrier.with_turn(1, 1, &interrupt, || Ok(()));
        match result {
            Err(RenderError::Interrupted) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn abort_releases_waiters() {
        let barrier = Arc::new(TurnBarrier::new(2).unwrap());
        let waiter = {
            let barrier = barrier.clone();
            thread::spawn(move || {
                let interrupt = AtomicBool::new(false);
                barrier.with_turn(1, 1, &interrupt, || Ok(()))
            })
        };
        thread::sleep(Duration::from_millis(50));
        barrier.abort();
        assert!(waiter.join().unwrap().is_err());
    }

    #[test]
    fn a_failed_emit_aborts_the_barrier() {
        let barrier = TurnBarrier::new(2).unwrap();
        let interrupt = AtomicBool::new(false);
        let failed: Result<(), _> = barrier.with_turn(0, 0, &interrupt, || {
            Err(RenderError::Config("boom".to_string()))
        });
        assert!(failed.is_err());
        assert!(barrier.with_turn(1, 1, &interrupt, || Ok(())).is_err());
    }
}
