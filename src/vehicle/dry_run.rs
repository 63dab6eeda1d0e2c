use super::{MotionCommand, VehicleSink};
use crate::error::{DeviceError, DeviceKind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, trace, warn};

/// Vehicle sink that only logs what it would transmit
///
/// Used when no radio link is attached. Keeps the connect/disconnect lifecycle
/// of a real link so the orchestrator behaves the same either way.
#[derive(Debug)]
pub struct DryRunVehicle {
    id: String,
    connected: AtomicBool,
    sent: AtomicU64,
}

impl DryRunVehicle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            connected: AtomicBool::new(false),
            sent: AtomicU64::new(0),
        }
    }

    pub fn commands_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl VehicleSink for DryRunVehicle {
    fn connect(&self) -> Result<(), DeviceError> {
        if self.id.trim().is_empty() {
            return Err(DeviceError::Unavailable {
                device: DeviceKind::Vehicle,
                reason: "empty vehicle identifier".to_string(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        info!("Dry-run link to vehicle {} established", self.id);
        Ok(())
    }

    fn send(&self, command: MotionCommand) -> Result<(), DeviceError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DeviceError::Disconnected {
                device: DeviceKind::Vehicle,
            });
        }

        if command.is_discrete() {
            info!("[{}] {:?}", self.id, command);
        } else {
            trace!("[{}] {:?}", self.id, command);
        }
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!(
                "Dry-run link to vehicle {} released after {} commands",
                self.id,
                self.commands_sent()
            );
        } else {
            debug!("Vehicle {} already disconnected", self.id);
        }
    }
}

impl Drop for DryRunVehicle {
    fn drop(&mut self) {
        if self.connected.load(Ordering::SeqCst) {
            warn!("Vehicle {} dropped while still connected", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_commands_outside_connection() {
        let vehicle = DryRunVehicle::new("Mambo_1234");
        assert!(vehicle.send(MotionCommand::TakeOff).is_err());

        vehicle.connect().unwrap();
        vehicle.send(MotionCommand::TakeOff).unwrap();
        vehicle.send(MotionCommand::Forward(40)).unwrap();
        assert_eq!(vehicle.commands_sent(), 2);

        vehicle.disconnect();
        assert_eq!(
            vehicle.send(MotionCommand::Land),
            Err(DeviceError::Disconnected {
                device: DeviceKind::Vehicle
            })
        );
    }

    #[test]
    fn empty_identifier_is_unavailable() {
        let vehicle = DryRunVehicle::new("  ");
        assert!(matches!(
            vehicle.connect(),
            Err(DeviceError::Unavailable { .. })
        ));
    }
}
