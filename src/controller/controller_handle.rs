//! Controller Handle - lifecycle of the input branch
//!
//! Wires the two halves of input delivery together and owns them:
//!
//! ```text
//! InputDevice ──► input-source thread ─[ControllerEvent]→ InputDispatcher task
//!                 (blocking reads)      (mpsc::channel(1000))
//! ```
//!
//! The device is opened on the input-source thread itself, so sources that
//! are not `Send` (gilrs on some platforms) work unchanged. `spawn` waits until
//! the device reports whether it opened, which gives the orchestrator an
//! all-or-nothing start.

use crate::controller::dispatcher::InputDispatcher;
use crate::controller::event_collector::{ControllerEvent, InputDevice};
use crate::error::{report_fault, DeviceError, DeviceKind};
use crate::worker::{join_worker, spawn_worker};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the queue between the input thread and the dispatcher
const EVENT_BUFFER: usize = 1000;

/// How long one device read may block before the cancel flag is checked
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Handle for the running input branch
#[derive(Debug)]
pub struct InputHandle {
    device_name: String,
    worker: Option<std::thread::JoinHandle<()>>,
    dispatcher: Option<JoinHandle<u64>>,
}

impl InputHandle {
    /// Opens `device` on a dedicated thread and starts the dispatcher
    ///
    /// Device failures after a successful open are reported on `faults`.
    ///
    /// # Errors
    ///
    /// Returns the device's error if it cannot be opened; nothing keeps
    /// running in that case.
    pub async fn spawn(
        device: Box<dyn InputDevice>,
        dispatcher: InputDispatcher,
        token: CancellationToken,
        faults: mpsc::Sender<DeviceError>,
    ) -> Result<Self, DeviceError> {
        let device_name = device.name().to_string();
        info!("Opening input device: {}", device_name);

        let (event_sender, event_receiver) = mpsc::channel(EVENT_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel();

        let worker_token = token.clone();
        let worker_faults = faults.clone();
        let worker = spawn_worker("input-source", move || {
            run_input_source(device, event_sender, ready_tx, worker_token, worker_faults)
        })
        .map_err(|e| DeviceError::Unavailable {
            device: DeviceKind::Controller,
            reason: format!("failed to spawn input thread: {}", e),
        })?;

        match ready_rx.await {
            Ok(Ok(())) => info!("Input device {} opened", device_name),
            Ok(Err(e)) => {
                error!("Failed to open input device {}: {}", device_name, e);
                join_worker("input-source", worker, POLL_TIMEOUT).await;
                return Err(e);
            }
            Err(_) => {
                return Err(DeviceError::Unavailable {
                    device: DeviceKind::Controller,
                    reason: "input thread exited before opening the device".to_string(),
                });
            }
        }

        let dispatcher_task = tokio::spawn(async move {
            let outcome = dispatcher.run(event_receiver, token).await;
            if let Some(e) = outcome.error {
                error!("Input dispatcher stopped: {}", e);
                report_fault(&faults, e);
            }
            outcome.one_shots
        });

        Ok(Self {
            device_name,
            worker: Some(worker),
            dispatcher: Some(dispatcher_task),
        })
    }

    /// Waits for the dispatcher and the input thread after cancellation
    ///
    /// Returns the number of one-shot actions fired during the run.
    pub async fn shutdown(&mut self, grace: Duration) -> u64 {
        let one_shots = match self.dispatcher.take() {
            Some(task) => task.await.unwrap_or_else(|e| {
                error!("Input dispatcher panicked: {}", e);
                0
            }),
            None => 0,
        };

        if let Some(worker) = self.worker.take() {
            if join_worker("input-source", worker, grace).await {
                info!("Input device {} released", self.device_name);
            }
        }
        one_shots
    }
}

/// Body of the input-source thread
fn run_input_source(
    device: Box<dyn InputDevice>,
    events: mpsc::Sender<ControllerEvent>,
    ready: oneshot::Sender<Result<(), DeviceError>>,
    token: CancellationToken,
    faults: mpsc::Sender<DeviceError>,
) {
    let mut source = match device.open() {
        Ok(source) => {
            let _ = ready.send(Ok(()));
            source
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    while !token.is_cancelled() {
        match source.next_event(POLL_TIMEOUT) {
            Ok(Some(event)) => match events.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    warn!("Input queue full, dropping {:?}", event);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Dispatcher gone, stopping input source");
                    break;
                }
            },
            Ok(None) => {}
            Err(e) => {
                error!("Input source failed: {}", e);
                report_fault(&faults, e);
                break;
            }
        }
    }
    debug!("Input source loop finished");
}
