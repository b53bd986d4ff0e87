// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The error taxonomy of a render.  Every variant is fatal to the
//! render that produced it; nothing is retried.

use failure::Fail;
use std::io;

/// Everything that can stop a render before the last row is emitted.
#[derive(Debug, Fail)]
pub enum RenderError {
    /// The worker count, grid geometry or another parameter is unusable.
    #[fail(display = "invalid configuration: {}", _0)]
    Config(String),

    /// A synchronization primitive, shared segment or worker could not
    /// be created.
    #[fail(display = "could not {}: {}", what, cause)]
    Resource {
        /// What we were trying to acquire.
        what: String,
        /// The underlying OS error.
        #[fail(cause)]
        cause: io::Error,
    },

    /// Writing to the output sink failed.  A torn color stream cannot be
    /// repaired mid-row.
    #[fail(display = "output sink failed: {}", _0)]
    Io(#[fail(cause)] io::Error),

    /// A worker died or reported a failure of its own.
    #[fail(display = "worker {} failed: {}", worker, reason)]
    WorkerFailed {
        /// Identity of the failed worker.
        worker: usize,
        /// What the pool learned about the failure.
        reason: String,
    },

    /// The render was cancelled by an external interrupt.
    #[fail(display = "interrupted")]
    Interrupted,
}

impl RenderError {
    /// Wraps an OS error raised while acquiring `what`.
    pub fn resource<S: Into<String>>(what: S, cause: io::Error) -> Self {
        RenderError::Resource {
            what: what.into(),
            cause,
        }
    }

    /// The process exit code the command line front end reports for this
    /// error.
    pub fn exit_code(&self) -> i32 {
        match self {
            RenderError::Interrupted => 130,
            _ => 1,
        }
    }
}

impl From<io::Error> for RenderError {
    fn from(err: io::Error) -> Self {
        RenderError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_has_its_own_exit_code() {
        assert_eq!(RenderError::Interrupted.exit_code(), 130);
        assert_eq!(RenderError::Config("no".to_string()).exit_code(), 1);
    }

    #[test]
    fn resource_errors_name_what_failed() {
        let err = RenderError::resource(
            "map the semaphore segment",
            io::Error::from_raw_os_error(libc::ENOMEM),
        );
        assert!(format!("{}", err).starts_with("could not map the semaphore segment"));
    }
}
