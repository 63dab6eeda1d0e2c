//! Periodic command emitters
//!
//! One emitter per stick, each in its own tokio task. A tick reads the stick
//! from [`AxisState`], translates it and sends the resulting command pair,
//! whether or not the stick moved since the previous tick.
//!
//! # Architecture
//!
//! ```text
//! AxisState ──► [StickTranslator] ──► CommandPair ──► VehicleSink
//!     ▲                                                   │
//!  dispatcher                                   fault ──► orchestrator
//! ```
//!
//! Ticks of one emitter never overlap: the tick body is awaited before the
//! interval is polled again, and late ticks are delayed rather than bunched.

use crate::controller::axis_state::AxisState;
use crate::error::{report_fault, DeviceError};
use crate::mapping::translate::{CommandPair, StickTranslator};
use crate::vehicle::VehicleSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Level-triggered emitter for one stick
pub struct CommandEmitter {
    name: String,
    translator: StickTranslator,
    axes: Arc<AxisState>,
    vehicle: Arc<dyn VehicleSink>,
    interval: Duration,
}

impl CommandEmitter {
    pub fn new(
        translator: StickTranslator,
        axes: Arc<AxisState>,
        vehicle: Arc<dyn VehicleSink>,
        interval: Duration,
    ) -> Self {
        let name = format!("{:?}-stick emitter", translator.stick).to_lowercase();
        Self {
            name,
            translator,
            axes,
            vehicle,
            interval,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads, translates and sends one command pair
    pub fn tick(&self) -> Result<CommandPair, DeviceError> {
        let position = self.axes.stick(self.translator.stick);
        let pair = self.translator.translate(position);
        self.vehicle.send(pair.primary)?;
        self.vehicle.send(pair.secondary)?;
        Ok(pair)
    }

    /// Ticks until cancelled, returning the number of completed ticks
    ///
    /// Stops at the first failed send; the caller decides whether that ends
    /// the run.
    pub async fn run_until_cancelled(self, token: CancellationToken) -> Result<u64, DeviceError> {
        info!(
            "Starting {} with {}ms interval",
            self.name,
            self.interval.as_millis()
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;
        let mut last_pair: Option<CommandPair> = None;

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    info!("{} cancelled after {} ticks", self.name, ticks);
                    break;
                }

                _ = ticker.tick() => {
                    let pair = self.tick()?;
                    if last_pair != Some(pair) {
                        debug!("{} now sending {:?} / {:?}", self.name, pair.primary, pair.secondary);
                        last_pair = Some(pair);
                    }
                    ticks += 1;
                }
            }
        }

        Ok(ticks)
    }
}

/// Handle for an emitter running in a tokio task
#[derive(Debug)]
pub struct EmitterHandle {
    pub name: String,
    task_handle: Option<JoinHandle<u64>>,
}

impl EmitterHandle {
    /// Spawns the emitter; a send failure is forwarded to `faults`
    pub fn spawn(
        emitter: CommandEmitter,
        token: CancellationToken,
        faults: mpsc::Sender<DeviceError>,
    ) -> Self {
        let name = emitter.name().to_string();
        let task_name = name.clone();

        let task_handle = tokio::spawn(async move {
            match emitter.run_until_cancelled(token).await {
                Ok(ticks) => ticks,
                Err(e) => {
                    error!("{} stopped: {}", task_name, e);
                    report_fault(&faults, e);
                    0
                }
            }
        });

        Self {
            name,
            task_handle: Some(task_handle),
        }
    }

    /// Waits for the task to finish and returns its tick count
    pub async fn join(&mut self) -> u64 {
        match self.task_handle.take() {
            Some(handle) => match handle.await {
                Ok(ticks) => {
                    debug!("{} finished", self.name);
                    ticks
                }
                Err(e) => {
                    error!("{} task panicked: {}", self.name, e);
                    0
                }
            },
            None => {
                debug!("{} already joined", self.name);
                0
            }
        }
    }
}
