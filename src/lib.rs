#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mandelbrot renderer for 256-color terminals
//!
//! Each character cell of the terminal samples one point of the complex
//! plane.  The point is iterated under `z = z * z + c` until it escapes
//! or an iteration limit is reached, and the iteration count picks a
//! color from a palette, approximated by the nearest color an xterm can
//! show.
//!
//! Rows are independent, so a pool of workers computes them in
//! parallel: worker `id` of `N` takes rows `id, id + N, id + 2N, ...`.
//! The terminal, however, must receive the rows top to bottom.  Each
//! worker therefore waits at an ordering barrier after computing a row
//! and writes it only when every row above it has been written.  The
//! workers can be threads, ordered by a mutex and condition variable,
//! or forked processes, ordered by a ring of semaphores in shared
//! memory.

extern crate crossbeam;
extern crate failure;
extern crate libc;
extern crate nix;
extern crate num;
extern crate num_cpus;
extern crate once_cell;

pub mod barrier;
pub mod config;
pub mod errors;
pub mod escape;
pub mod output;
pub mod palette;
pub mod planes;
pub mod pool;
pub mod semring;
pub mod signals;

pub use barrier::{OrderingBarrier, TurnBarrier};
pub use config::{Backend, GridSpec, RenderConfig};
pub use errors::RenderError;
pub use output::{AnsiWriter, RowSink};
pub use planes::Grid;
pub use pool::render;
pub use semring::SemaphoreRing;
