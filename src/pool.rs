// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The worker pool.  Worker `id` of `N` computes rows `id, id + N,
//! id + 2N, ...` and hands each one to an ordering barrier, which lets
//! it through to the sink when every earlier row has been written.
//! Workers are either scoped threads sharing a `TurnBarrier`, or forked
//! processes sharing a `SemaphoreRing`; the per-worker loop is the same.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use log::{error, info, warn};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use crate::barrier::{OrderingBarrier, TurnBarrier, POLL_INTERVAL};
use crate::config::{Backend, RenderConfig};
use crate::errors::RenderError;
use crate::output::RowSink;
use crate::planes::Grid;
use crate::semring::SemaphoreRing;
use crate::signals;

/// Exit status of a worker process that stopped because it was
/// interrupted.
const INTERRUPTED_STATUS: i32 = 130;

/// Renders the image described by `config` into `sink`, one row at a
/// time in ascending order, and then resets the sink's colors.  The
/// reset happens whether or not the render succeeded.
///
/// Raising `interrupt` stops the render at the next row boundary.  With
/// `Backend::Processes` the calling process must be single threaded,
/// since it forks.
pub fn render<S>(
    config: &RenderConfig,
    sink: &mut S,
    interrupt: &AtomicBool,
) -> Result<(), RenderError>
where
    S: RowSink + Send,
{
    config.validate()?;
    let grid = Grid::new(&config.grid)?;

    let cpus = num_cpus::get();
    if config.workers > cpus {
        warn!(
            "{} workers requested on {} CPUs; rows will be computed with oversubscription",
            config.workers, cpus
        );
    }
    info!(
        "rendering {}x{} cells with {} {}",
        grid.columns, grid.rows, config.workers, config.backend
    );

    let started = Instant::now();
    let outcome = match config.backend {
        Backend::Threads => render_threads(&grid, config.workers, sink, interrupt),
        Backend::Processes => render_processes(&grid, config.workers, sink, interrupt),
    };
    let reset = sink.reset();

    match outcome {
        Ok(()) => info!("render finished in {:?}", started.elapsed()),
        Err(ref e) => warn!("render stopped after {:?}: {}", started.elapsed(), e),
    }
    outcome.and(reset)
}

/// The life of one worker: compute each owned row, then wait for its
/// turn and emit it.  Returns at the first failure, or with
/// `Interrupted` if the flag is seen between rows.
pub fn run_stripe<B, E>(
    grid: &Grid,
    worker: usize,
    workers: usize,
    barrier: &B,
    interrupt: &AtomicBool,
    mut emit: E,
) -> Result<(), RenderError>
where
    B: OrderingBarrier,
    E: FnMut(usize, &[u8]) -> Result<(), RenderError>,
{
    for row in grid.stripe(worker, workers) {
        if interrupt.load(Ordering::SeqCst) {
            return Err(RenderError::Interrupted);
        }
        let colors = grid.compute_row(row);
        barrier.with_turn(worker, row, interrupt, || emit(row, &colors))?;
    }
    Ok(())
}

// Aborts the barrier if a worker thread unwinds, so that nobody waits
// for a turn the dead worker will never take.
struct AbortOnPanic<'a, B: OrderingBarrier>(&'a B);

impl<'a, B: OrderingBarrier> Drop for AbortOnPanic<'a, B> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

fn render_threads<S>(
    grid: &Grid,
    workers: usize,
    sink: &mut S,
    interrupt: &AtomicBool,
) -> Result<(), RenderError>
where
    S: RowSink + Send,
{
    let barrier = TurnBarrier::new(workers)?;
    // Only the worker holding the turn ever takes this lock.
    let sink = Mutex::new(sink);

    let results = crossbeam::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let barrier = &barrier;
                let sink = &sink;
                scope.spawn(move |_| {
                    let _guard = AbortOnPanic(barrier);
                    let emit = |row: usize, colors: &[u8]| {
                        let mut sink = sink.lock().map_err(|_| RenderError::WorkerFailed {
                            worker,
                            reason: "the output sink was poisoned".to_string(),
                        })?;
                        sink.write_row(row, colors)
                    };
                    let result = run_stripe(grid, worker, workers, barrier, interrupt, emit);
                    match result {
                        Ok(()) => (),
                        Err(RenderError::Interrupted) => barrier.abort(),
                        Err(ref e) => {
                            error!("worker {} failed: {}", worker, e);
                            barrier.abort();
                        }
                    }
                    result
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(worker, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(RenderError::WorkerFailed {
                        worker,
                        reason: "panicked".to_string(),
                    })
                })
            })
            .collect::<Vec<_>>()
    })
    .map_err(|_| RenderError::WorkerFailed {
        worker: 0,
        reason: "the worker scope panicked".to_string(),
    })?;

    first_failure(results)
}

// Reports the first real failure; interruptions only count when nothing
// else went wrong.
fn first_failure<I>(results: I) -> Result<(), RenderError>
where
    I: IntoIterator<Item = Result<(), RenderError>>,
{
    let mut interrupted = false;
    for result in results {
        match result {
            Ok(()) => (),
            Err(RenderError::Interrupted) => interrupted = true,
            Err(e) => return Err(e),
        }
    }
    if interrupted {
        Err(RenderError::Interrupted)
    } else {
        Ok(())
    }
}

fn render_processes<S: RowSink>(
    grid: &Grid,
    workers: usize,
    sink: &mut S,
    interrupt: &AtomicBool,
) -> Result<(), RenderError> {
    let ring = SemaphoreRing::new(workers)?;
    // Anything still buffered would be written once by every child.
    sink.flush()?;

    let mut children = Vec::with_capacity(workers);
    for worker in 0..workers {
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => children.push((worker, child)),
            Ok(ForkResult::Child) => {
                let status = run_child(grid, worker, workers, &ring, sink);
                unsafe { libc::_exit(status) }
            }
            Err(errno) => {
                error!("could not fork worker {}: {}", worker, errno);
                ring.abort();
                signals::forward(children.iter().map(|&(_, pid)| pid));
                // The children are cancelled; what they report no longer matters.
                let _ = supervise(children, &ring, interrupt);
                return Err(RenderError::resource(
                    format!("fork worker {}", worker),
                    errno.into(),
                ));
            }
        }
    }

    supervise(children, &ring, interrupt)
}

// Runs in a freshly forked worker and returns its exit status.
fn run_child<S: RowSink>(
    grid: &Grid,
    worker: usize,
    workers: usize,
    ring: &SemaphoreRing,
    sink: &mut S,
) -> i32 {
    let outcome = signals::install().and_then(|interrupt| {
        run_stripe(grid, worker, workers, ring, interrupt, |row, colors| {
            sink.write_row(row, colors)
        })
    });
    // A worker that stops early never posts its successor, so the other
    // processes are released through the ring.
    match outcome {
        Ok(()) => 0,
        Err(RenderError::Interrupted) => {
            ring.abort();
            INTERRUPTED_STATUS
        }
        Err(e) => {
            error!("worker {} failed: {}", worker, e);
            ring.abort();
            1
        }
    }
}

// Waits for every worker process.  When the interrupt flag goes up or a
// worker fails, the ring is cancelled and the others are interrupted, so
// that none is left waiting on a semaphore that will never be posted.
fn supervise(
    mut children: Vec<(usize, Pid)>,
    ring: &SemaphoreRing,
    interrupt: &AtomicBool,
) -> Result<(), RenderError> {
    let mut failure: Option<RenderError> = None;
    let mut interrupted = false;
    let mut forwarded = false;

    while !children.is_empty() {
        if !forwarded && (failure.is_some() || interrupt.load(Ordering::SeqCst)) {
            ring.abort();
            signals::forward(children.iter().map(|&(_, pid)| pid));
            forwarded = true;
        }

        let mut reaped = None;
        for (index, &(worker, pid)) in children.iter().enumerate() {
            let status = match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(status) => status,
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    return Err(RenderError::resource(
                        format!("wait for worker {}", worker),
                        errno.into(),
                    ))
                }
            };
            match status {
                WaitStatus::Exited(_, 0) => (),
                WaitStatus::Exited(_, INTERRUPTED_STATUS) => interrupted = true,
                WaitStatus::Signaled(_, Signal::SIGINT, _) => interrupted = true,
                WaitStatus::Exited(_, code) => {
                    if failure.is_none() {
                        failure = Some(RenderError::WorkerFailed {
                            worker,
                            reason: format!("exited with status {}", code),
                        });
                    }
                }
                WaitStatus::Signaled(_, signal, _) => {
                    if failure.is_none() {
                        failure = Some(RenderError::WorkerFailed {
                            worker,
                            reason: format!("killed by {:?}", signal),
                        });
                    }
                }
                _ => continue,
            }
            reaped = Some(index);
            break;
        }

        match reaped {
            Some(index) => {
                children.swap_remove(index);
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    }

    match failure {
        Some(e) => Err(e),
        None if interrupted => Err(RenderError::Interrupted),
        None => Ok(()),
    }
}
