//! Device-level errors shared by every collaborator boundary.

use std::fmt;
use tokio::sync::mpsc;
use tracing::warn;

/// Which external collaborator a [`DeviceError`] originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Controller,
    Vehicle,
    Camera,
    Display,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Controller => write!(f, "controller"),
            DeviceKind::Vehicle => write!(f, "vehicle"),
            DeviceKind::Camera => write!(f, "camera"),
            DeviceKind::Display => write!(f, "display"),
        }
    }
}

/// Errors raised by controller, vehicle, camera or display devices
///
/// Every variant is fatal to a running orchestrator: there is no automatic
/// reconnection, the run ends and all handles are released.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    /// The device could not be opened at startup
    #[error("{device} unavailable: {reason}")]
    Unavailable { device: DeviceKind, reason: String },

    /// The device went away while running
    #[error("{device} disconnected")]
    Disconnected { device: DeviceKind },

    /// A read or write on an open device failed
    #[error("{device} I/O error: {reason}")]
    Io { device: DeviceKind, reason: String },
}

impl DeviceError {
    pub fn device(&self) -> DeviceKind {
        match self {
            DeviceError::Unavailable { device, .. }
            | DeviceError::Disconnected { device }
            | DeviceError::Io { device, .. } => *device,
        }
    }
}

/// Forwards a fault to the orchestrator without blocking the caller
///
/// Only the first fault ends the run, so a full or closed channel just means
/// this one is logged and dropped.
pub fn report_fault(faults: &mpsc::Sender<DeviceError>, fault: DeviceError) {
    let device = fault.device();
    if let Err(e) = faults.try_send(fault) {
        warn!("{} fault not delivered: {}", device, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_device() {
        let err = DeviceError::Disconnected {
            device: DeviceKind::Controller,
        };
        assert_eq!(err.to_string(), "controller disconnected");
        assert_eq!(err.device(), DeviceKind::Controller);

        let err = DeviceError::Unavailable {
            device: DeviceKind::Camera,
            reason: "no device at index 3".to_string(),
        };
        assert_eq!(err.to_string(), "camera unavailable: no device at index 3");
    }
}
