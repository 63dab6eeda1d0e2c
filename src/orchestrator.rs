//! Orchestrator - lifecycle of one flight session
//!
//! ```text
//! Idle ──start()──► Running ──fault / shutdown──► Stopped
//!   │                                               ▲
//!   └──────────── open failure (all released) ──────┘ (as Err)
//! ```
//!
//! `start` brings the vehicle link up, opens the controller and the camera and
//! starts both emitters. Any failure releases what was already opened. While
//! running, the first [`DeviceError`] reported by any branch ends the session;
//! there is no reconnection. `Stopped` owns nothing but the [`RunReport`].

use crate::config::ControllerProfile;
use crate::controller::{AxisState, InputDevice, InputDispatcher, InputHandle, JoystickType};
use crate::error::DeviceError;
use crate::mapping::{CommandEmitter, EmitterHandle, StickTranslator};
use crate::vehicle::VehicleSink;
use crate::vision::{CameraDevice, ClassifierPipeline, DisplaySink, VisionHandle, VisionStats};
use chrono::{DateTime, Local};
use statum::{machine, state};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long a device thread may take to notice cancellation
const DEVICE_GRACE: Duration = Duration::from_millis(500);

const FAULT_BUFFER: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Failed to start: {0}")]
    Start(#[from] DeviceError),
}

/// Devices and models handed to [`Orchestrator::start`]
pub struct Devices {
    pub controller: Box<dyn InputDevice>,
    pub camera: Box<dyn CameraDevice>,
    pub display: Box<dyn DisplaySink>,
    pub classifier: ClassifierPipeline,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// External termination signal
    Shutdown,
    DeviceLost(DeviceError),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Shutdown => write!(f, "shutdown requested"),
            StopReason::DeviceLost(e) => write!(f, "{}", e),
        }
    }
}

/// Summary of a finished session
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub reason: StopReason,
    pub started_at: DateTime<Local>,
    pub duration: Duration,
    /// Emitter ticks across both sticks, two commands each
    pub emitter_ticks: u64,
    pub one_shots: u64,
    pub vision: VisionStats,
}

#[state]
#[derive(Debug, Clone)]
pub enum OrchestratorState {
    Idle,
    Running,
    Stopped,
}

#[machine]
pub struct Orchestrator<S: OrchestratorState> {
    profile: ControllerProfile,
    axes: Arc<AxisState>,
    vehicle: Arc<dyn VehicleSink>,

    // Shutdown fan-out and the fault path back from every branch
    token: CancellationToken,
    faults_tx: mpsc::Sender<DeviceError>,
    faults_rx: mpsc::Receiver<DeviceError>,

    input: Option<InputHandle>,
    vision: Option<VisionHandle>,
    emitters: Vec<EmitterHandle>,

    started_at: Option<DateTime<Local>>,
    report: Option<RunReport>,
}

impl Orchestrator<Idle> {
    pub fn create(profile: ControllerProfile, vehicle: Arc<dyn VehicleSink>) -> Self {
        let (faults_tx, faults_rx) = mpsc::channel(FAULT_BUFFER);
        Self::new(
            profile,
            Arc::new(AxisState::new()),
            vehicle,
            CancellationToken::new(),
            faults_tx,
            faults_rx,
            None,       // input
            None,       // vision
            Vec::new(), // emitters
            None,       // started_at
            None,       // report
        )
    }

    /// Opens every device and starts all periodic work
    ///
    /// # Errors
    ///
    /// Returns the first device error; everything opened before it has been
    /// released when this returns.
    pub async fn start(mut self, devices: Devices) -> Result<Orchestrator<Running>, OrchestratorError> {
        info!("Starting orchestrator");
        self.axes.reset();

        if let Err(e) = self.launch(devices).await {
            error!("Start aborted: {}", e);
            self.release().await;
            return Err(e.into());
        }

        self.started_at = Some(Local::now());
        info!("Orchestrator running");
        Ok(self.transition())
    }

    async fn launch(&mut self, devices: Devices) -> Result<(), DeviceError> {
        let Devices {
            controller,
            camera,
            mut display,
            classifier,
        } = devices;

        if let Err(e) = self.vehicle.connect() {
            display.close();
            return Err(e);
        }

        let dispatcher = InputDispatcher::new(
            self.axes.clone(),
            self.profile.buttons.clone(),
            self.vehicle.clone(),
        );
        match InputHandle::spawn(
            controller,
            dispatcher,
            self.token.clone(),
            self.faults_tx.clone(),
        )
        .await
        {
            Ok(input) => self.input = Some(input),
            Err(e) => {
                display.close();
                return Err(e);
            }
        }

        let vision = VisionHandle::spawn(
            camera,
            classifier,
            display,
            self.token.clone(),
            self.faults_tx.clone(),
        )
        .await?;
        self.vision = Some(vision);

        for stick in [JoystickType::Right, JoystickType::Left] {
            let emitter = CommandEmitter::new(
                StickTranslator::for_stick(stick, &self.profile.tuning),
                self.axes.clone(),
                self.vehicle.clone(),
                self.profile.interval(),
            );
            self.emitters.push(EmitterHandle::spawn(
                emitter,
                self.token.clone(),
                self.faults_tx.clone(),
            ));
        }
        Ok(())
    }
}

impl Orchestrator<Running> {
    /// Runs until a device fails or `shutdown` resolves, then stops
    pub async fn run_until_stopped<F>(mut self, shutdown: F) -> Orchestrator<Stopped>
    where
        F: Future<Output = ()>,
    {
        let reason = tokio::select! {
            fault = self.faults_rx.recv() => match fault {
                Some(e) => {
                    error!("Device lost: {}", e);
                    StopReason::DeviceLost(e)
                }
                None => StopReason::Shutdown,
            },
            _ = shutdown => {
                info!("Termination signal received");
                StopReason::Shutdown
            }
        };
        self.stop(reason).await
    }

    /// Cancels all work, releases every device and builds the report
    pub async fn stop(mut self, reason: StopReason) -> Orchestrator<Stopped> {
        info!("Stopping orchestrator: {}", reason);
        let (emitter_ticks, one_shots, vision) = self.release().await;

        let started_at = self.started_at.unwrap_or_else(Local::now);
        let duration = (Local::now() - started_at).to_std().unwrap_or_default();
        let report = RunReport {
            reason,
            started_at,
            duration,
            emitter_ticks,
            one_shots,
            vision,
        };
        info!(
            "Session started {} ended after {:.1}s: {} ticks, {} one-shots, {} frames classified, {} dropped",
            report.started_at.format("%H:%M:%S"),
            report.duration.as_secs_f64(),
            report.emitter_ticks,
            report.one_shots,
            report.vision.frames_classified,
            report.vision.frames_dropped
        );

        self.report = Some(report);
        self.transition()
    }
}

impl Orchestrator<Stopped> {
    pub fn report(&self) -> Option<&RunReport> {
        self.report.as_ref()
    }
}

impl<S: OrchestratorState> Orchestrator<S> {
    /// Stops every branch in order: emitters, input, vision, then the link
    async fn release(&mut self) -> (u64, u64, VisionStats) {
        self.token.cancel();

        let mut ticks = 0;
        for emitter in &mut self.emitters {
            ticks += emitter.join().await;
        }
        self.emitters.clear();

        let one_shots = match self.input.take() {
            Some(mut input) => input.shutdown(DEVICE_GRACE).await,
            None => 0,
        };
        let vision = match self.vision.take() {
            Some(mut vision) => vision.shutdown(DEVICE_GRACE).await,
            None => VisionStats::default(),
        };

        self.vehicle.disconnect();

        while let Ok(fault) = self.faults_rx.try_recv() {
            warn!("Fault during shutdown: {}", fault);
        }
        (ticks, one_shots, vision)
    }
}
