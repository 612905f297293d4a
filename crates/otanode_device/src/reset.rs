//! Device reset collaborator.

use tracing::info;

/// Restarts the device after a `reboot` request has been answered.
pub trait Reset {
    /// Performs the reset. Implementations for real hardware do not return.
    fn reset(&mut self);
}

/// Resets by terminating the process; the supervisor starts it again with a
/// fresh listening socket.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessReset;

impl Reset for ProcessReset {
    fn reset(&mut self) {
        info!("resetting");
        std::process::exit(0);
    }
}

/// Resets nothing; the serving loop just stops.
#[derive(Debug, Default, Clone, Copy)]
pub struct StopOnly;

impl Reset for StopOnly {
    fn reset(&mut self) {
        info!("reboot requested, stopping");
    }
}

impl<F: FnMut()> Reset for F {
    fn reset(&mut self) {
        self()
    }
}
