//! Restart-on-fatal supervision.
//!
//! Both scheduling contexts hand their [`FatalError`] to the supervisor,
//! which runs on the boot task.  There is no partial recovery: the first
//! fatal report restarts the whole device and every piece of state is
//! rebuilt from `main()`.

use std::sync::mpsc::Receiver;

use log::error;

use crate::app::ports::RestartPort;
use crate::error::FatalError;

/// Block until a context reports a fatal condition, then restart.
///
/// A closed channel (every sender gone without a report) is treated as
/// [`FatalError::ContextExited`].
pub fn supervise(fatal: &Receiver<FatalError>, restart: &mut impl RestartPort) -> FatalError {
    let reason = fatal.recv().unwrap_or(FatalError::ContextExited);
    error!("FATAL | {reason}, restarting");
    restart.restart(&reason);
    reason
}

/// Restarts the chip.
#[derive(Debug, Default)]
pub struct ChipRestart;

impl RestartPort for ChipRestart {
    #[cfg(target_os = "espidf")]
    fn restart(&mut self, _reason: &FatalError) {
        log::logger().flush();
        // SAFETY: esp_restart never returns; no invariants to uphold.
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    /// Host build: the process stands in for the device.
    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self, reason: &FatalError) {
        error!("restart(sim): exiting process ({reason})");
        std::process::exit(1);
    }
}
