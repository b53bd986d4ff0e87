// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Render parameters.  The defaults reproduce a 90x50 view of the
//! whole set, which fits an ordinary terminal.

use std::fmt;
use std::str::FromStr;

use crate::errors::RenderError;

/// The geometry of the image and the part of the complex plane it shows.
#[derive(Clone, Debug, PartialEq)]
pub struct GridSpec {
    /// Characters per row.
    pub columns: usize,
    /// Number of rows.
    pub rows: usize,
    /// Left edge of the complex plane.
    pub xmin: f64,
    /// Right edge of the complex plane.
    pub xmax: f64,
    /// Bottom edge of the complex plane.
    pub ymin: f64,
    /// Top edge of the complex plane.
    pub ymax: f64,
    /// Iteration cap for each point.
    pub max_iterations: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        GridSpec {
            columns: 90,
            rows: 50,
            xmin: -1.8,
            xmax: 1.0,
            ymin: -1.0,
            ymax: 1.0,
            max_iterations: 100_000,
        }
    }
}

/// How the workers of a pool are run, and therefore which ordering
/// barrier keeps their rows in sequence.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Threads of this process, ordered by a mutex and condition variable.
    Threads,
    /// Forked processes, ordered by a ring of semaphores in shared memory.
    Processes,
}

impl FromStr for Backend {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "threads" => Ok(Backend::Threads),
            "processes" => Ok(Backend::Processes),
            other => Err(RenderError::Config(format!(
                "unknown worker mode `{}`, expected `threads` or `processes`",
                other
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Backend::Threads => write!(f, "threads"),
            Backend::Processes => write!(f, "processes"),
        }
    }
}

/// Everything a render needs to know.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// Image geometry.
    pub grid: GridSpec,
    /// Size of the worker pool, at least 1.
    pub workers: usize,
    /// Threads or processes.
    pub backend: Backend,
    /// The character drawn in every cell.
    pub glyph: u8,
}

impl RenderConfig {
    /// A default image rendered by `workers` workers of the given kind.
    pub fn new(workers: usize, backend: Backend) -> Self {
        RenderConfig {
            grid: GridSpec::default(),
            workers,
            backend,
            glyph: b'@',
        }
    }

    /// Rejects configurations no pool can run.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.workers == 0 {
            return Err(RenderError::Config(
                "the worker count must be a positive integer".to_string(),
            ));
        }
        if !self.glyph.is_ascii_graphic() {
            return Err(RenderError::Config(format!(
                "the glyph must be a printable ASCII character, not {:#04x}",
                self.glyph
            )));
        }
        Ok(())
    }
}
