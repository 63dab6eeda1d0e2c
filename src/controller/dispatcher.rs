//! Input dispatcher - the single handler for controller events
//!
//! Runs as one tokio task fed by the input delivery thread, so events are
//! handled one at a time in arrival order. Axis events only update
//! [`AxisState`]; button events fire their one-shot action straight at the
//! vehicle and never touch the axes.

use crate::controller::axis_state::AxisState;
use crate::controller::event_collector::ControllerEvent;
use crate::error::DeviceError;
use crate::mapping::{ButtonBindings, OneShot};
use crate::vehicle::VehicleSink;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct InputDispatcher {
    axes: Arc<AxisState>,
    bindings: ButtonBindings,
    vehicle: Arc<dyn VehicleSink>,
    one_shots: u64,
}

impl InputDispatcher {
    pub fn new(
        axes: Arc<AxisState>,
        bindings: ButtonBindings,
        vehicle: Arc<dyn VehicleSink>,
    ) -> Self {
        Self {
            axes,
            bindings,
            vehicle,
            one_shots: 0,
        }
    }

    /// Handles one event, returning the one-shot action it fired, if any
    pub fn handle(&mut self, event: ControllerEvent) -> Result<Option<OneShot>, DeviceError> {
        match event {
            ControllerEvent::AxisChanged(axis, value) => {
                self.axes.set(axis, value);
                Ok(None)
            }
            ControllerEvent::ButtonPressed(button) => {
                let Some(action) = self.bindings.action_for(button) else {
                    debug!("No action bound to {:?}", button);
                    return Ok(None);
                };

                info!("{:?} pressed, firing {:?}", button, action);
                for command in action.commands() {
                    self.vehicle.send(*command)?;
                }
                self.one_shots += 1;
                Ok(Some(action))
            }
        }
    }

    /// Handles events until the channel closes, the token is cancelled or a
    /// one-shot cannot be sent
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ControllerEvent>,
        token: CancellationToken,
    ) -> DispatchOutcome {
        info!("Input dispatcher started");
        let error = loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    debug!("Input dispatcher cancelled");
                    break None;
                }

                event = events.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle(event) {
                            break Some(e);
                        }
                    }
                    None => {
                        debug!("Input event channel closed");
                        break None;
                    }
                }
            }
        };
        info!("Input dispatcher stopped after {} one-shot actions", self.one_shots);
        DispatchOutcome {
            one_shots: self.one_shots,
            error,
        }
    }
}

/// How a dispatcher run ended
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// One-shot actions fully sent, including those before a failure
    pub one_shots: u64,
    pub error: Option<DeviceError>,
}
