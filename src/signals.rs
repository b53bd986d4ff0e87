// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The interrupt hook.  SIGINT only raises a flag; workers look at the
//! flag between rows, and the terminal is reset on the ordinary return
//! path once every worker has stopped.

use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;
use nix::errno::Errno;
use nix::sys::signal::{kill, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;

use crate::errors::RenderError;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Routes SIGINT to the process-wide interrupt flag and returns the
/// flag.  The handler is installed without `SA_RESTART`, so a worker
/// sleeping on a semaphore wakes up when the signal arrives.
pub fn install() -> Result<&'static AtomicBool, RenderError> {
    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe { sigaction(Signal::SIGINT, &action) }
        .map_err(|errno| RenderError::resource("install the SIGINT handler", errno.into()))?;
    Ok(&INTERRUPTED)
}

/// The process-wide interrupt flag.
pub fn interrupt_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

/// Passes an interrupt on to worker processes.  Processes that are
/// already gone are skipped.
pub fn forward<I: IntoIterator<Item = Pid>>(children: I) {
    for child in children {
        match kill(child, Signal::SIGINT) {
            Ok(()) | Err(Errno::ESRCH) => (),
            Err(errno) => warn!("could not interrupt worker process {}: {}", child, errno),
        }
    }
}
