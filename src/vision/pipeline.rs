//! Vision Handle - lifecycle of the camera → classifier → display branch
//!
//! Two threads joined by a two-slot frame queue. The camera thread never
//! waits on inference: when the queue is full the newest frame is dropped
//! and counted. The vision thread owns the display and closes it on exit.

use super::classifier::ClassifierPipeline;
use super::display::overlay_text;
use super::{CameraDevice, DisplaySink, Frame, FrameSource};
use crate::error::{report_fault, DeviceError, DeviceKind};
use crate::worker::{join_worker, spawn_worker};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Frames that may wait for the classifier
const FRAME_QUEUE: usize = 2;

/// How long the vision thread waits for a frame before checking for cancel
const RECV_POLL: Duration = Duration::from_millis(50);

/// Counters for one run of the vision branch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VisionStats {
    pub frames_classified: u64,
    pub frames_dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    classified: AtomicU64,
    dropped: AtomicU64,
}

/// Closes the display when dropped, whichever way the branch ends
struct DisplayGuard(Box<dyn DisplaySink>);

impl DisplayGuard {
    fn show(&mut self, frame: Frame, overlay: Option<&str>) -> Result<(), DeviceError> {
        self.0.show(frame, overlay)
    }
}

impl Drop for DisplayGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Handle for the running vision branch
#[derive(Debug)]
pub struct VisionHandle {
    camera_name: String,
    camera_worker: Option<std::thread::JoinHandle<()>>,
    vision_worker: Option<std::thread::JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl VisionHandle {
    /// Opens the camera and starts both threads
    ///
    /// The display is closed and the camera thread joined before returning
    /// if either thread fails to start.
    pub async fn spawn(
        camera: Box<dyn CameraDevice>,
        classifier: ClassifierPipeline,
        display: Box<dyn DisplaySink>,
        token: CancellationToken,
        faults: mpsc::Sender<DeviceError>,
    ) -> Result<Self, DeviceError> {
        let camera_name = camera.name().to_string();
        info!("Opening camera: {}", camera_name);

        let display = DisplayGuard(display);
        let branch = token.child_token();
        let counters = Arc::new(Counters::default());
        let (frame_tx, frame_rx) = sync_channel(FRAME_QUEUE);
        let (ready_tx, ready_rx) = oneshot::channel();

        let camera_worker = {
            let token = branch.clone();
            let faults = faults.clone();
            let counters = counters.clone();
            spawn_worker("camera-source", move || {
                run_camera_source(camera, frame_tx, ready_tx, token, faults, counters)
            })
        };
        let camera_worker = match camera_worker {
            Ok(worker) => worker,
            Err(e) => {
                return Err(DeviceError::Unavailable {
                    device: DeviceKind::Camera,
                    reason: format!("failed to spawn camera thread: {}", e),
                });
            }
        };

        let opened = match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err(DeviceError::Unavailable {
                device: DeviceKind::Camera,
                reason: "camera thread exited before opening the device".to_string(),
            }),
        };
        if let Err(e) = opened {
            error!("Failed to open camera {}: {}", camera_name, e);
            drop(display);
            join_worker("camera-source", camera_worker, RECV_POLL).await;
            return Err(e);
        }
        info!("Camera {} opened", camera_name);

        let vision_worker = {
            let token = branch.clone();
            let counters = counters.clone();
            spawn_worker("vision-worker", move || {
                run_vision_worker(frame_rx, classifier, display, token, faults, counters)
            })
        };
        let vision_worker = match vision_worker {
            Ok(worker) => worker,
            Err(e) => {
                branch.cancel();
                join_worker("camera-source", camera_worker, RECV_POLL).await;
                return Err(DeviceError::Unavailable {
                    device: DeviceKind::Display,
                    reason: format!("failed to spawn vision thread: {}", e),
                });
            }
        };

        Ok(Self {
            camera_name,
            camera_worker: Some(camera_worker),
            vision_worker: Some(vision_worker),
            counters,
        })
    }

    pub fn stats(&self) -> VisionStats {
        VisionStats {
            frames_classified: self.counters.classified.load(Ordering::Relaxed),
            frames_dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Waits for both threads after cancellation
    pub async fn shutdown(&mut self, grace: Duration) -> VisionStats {
        if let Some(worker) = self.camera_worker.take() {
            if join_worker("camera-source", worker, grace).await {
                info!("Camera {} released", self.camera_name);
            }
        }
        if let Some(worker) = self.vision_worker.take() {
            join_worker("vision-worker", worker, grace).await;
        }
        self.stats()
    }
}

fn run_camera_source(
    camera: Box<dyn CameraDevice>,
    frames: SyncSender<Frame>,
    ready: oneshot::Sender<Result<(), DeviceError>>,
    token: CancellationToken,
    faults: mpsc::Sender<DeviceError>,
    counters: Arc<Counters>,
) {
    let mut source: Box<dyn FrameSource> = match camera.open() {
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
        match source.next_frame() {
            Ok(frame) => match frames.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    let dropped = counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!("Classifier busy, dropped frame ({} so far)", dropped);
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("Vision worker gone, stopping camera");
                    break;
                }
            },
            Err(e) => {
                error!("Camera failed: {}", e);
                report_fault(&faults, e);
                break;
            }
        }
    }
    debug!("Camera loop finished");
}

fn run_vision_worker(
    frames: Receiver<Frame>,
    classifier: ClassifierPipeline,
    mut display: DisplayGuard,
    token: CancellationToken,
    faults: mpsc::Sender<DeviceError>,
    counters: Arc<Counters>,
) {
    while !token.is_cancelled() {
        let frame = match frames.recv_timeout(RECV_POLL) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Camera gone, stopping vision worker");
                break;
            }
        };

        let overlay = match classifier.classify(&frame) {
            Ok(result) => {
                counters.classified.fetch_add(1, Ordering::Relaxed);
                Some(overlay_text(&result))
            }
            Err(e) => {
                warn!("Classification failed, showing raw frame: {}", e);
                None
            }
        };

        if let Err(e) = display.show(frame, overlay.as_deref()) {
            error!("Display failed: {}", e);
            report_fault(&faults, e);
            break;
        }
    }
    drop(display);
    debug!("Vision worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::labels::LabelList;
    use crate::vision::{CentroidModel, Classifier, Prediction, TestPatternCamera, VisionError};
    use std::sync::Mutex;

    /// Display that records overlays and whether it was closed
    #[derive(Clone, Default)]
    struct SharedDisplay {
        overlays: Arc<Mutex<Vec<Option<String>>>>,
        closed: Arc<Mutex<bool>>,
        fail_after: Option<usize>,
    }

    impl DisplaySink for SharedDisplay {
        fn show(&mut self, _frame: Frame, overlay: Option<&str>) -> Result<(), DeviceError> {
            let mut overlays = self.overlays.lock().unwrap();
            if self.fail_after.is_some_and(|n| overlays.len() >= n) {
                return Err(DeviceError::Io {
                    device: DeviceKind::Display,
                    reason: "window closed".to_string(),
                });
            }
            overlays.push(overlay.map(str::to_string));
            Ok(())
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    struct SlowClassifier(Duration);

    impl Classifier for SlowClassifier {
        fn predict(&self, _frame: &Frame) -> Result<Prediction, VisionError> {
            std::thread::sleep(self.0);
            Ok(Prediction {
                index: 7,
                confidence: 0.25,
            })
        }
    }

    fn rgb_pipeline() -> ClassifierPipeline {
        let model = CentroidModel::from_toml_str(
            "centroids = [[255.0, 0.0, 0.0], [0.0, 255.0, 0.0], [0.0, 0.0, 255.0]]",
        )
        .unwrap();
        ClassifierPipeline::new(Box::new(model), LabelList::from_text("red\ngreen\nblue"))
    }

    fn fast_camera(index: u32) -> Box<TestPatternCamera> {
        Box::new(
            TestPatternCamera::new(index)
                .with_size(4, 4)
                .with_frame_interval(Duration::from_millis(2)),
        )
    }

    #[tokio::test]
    async fn frames_are_classified_and_overlaid() {
        let display = SharedDisplay::default();
        let token = CancellationToken::new();
        let (faults_tx, _faults_rx) = mpsc::channel(4);

        let mut handle = VisionHandle::spawn(
            fast_camera(0),
            rgb_pipeline(),
            Box::new(display.clone()),
            token.clone(),
            faults_tx,
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        let stats = handle.shutdown(Duration::from_secs(1)).await;

        assert!(stats.frames_classified > 0);
        assert!(*display.closed.lock().unwrap());
        let overlays = display.overlays.lock().unwrap();
        assert_eq!(overlays.len() as u64, stats.frames_classified);
        assert!(overlays[0]
            .as_deref()
            .unwrap()
            .starts_with("description: red, maxVal: "));
    }

    #[tokio::test]
    async fn slow_classifier_drops_frames() {
        let display = SharedDisplay::default();
        let token = CancellationToken::new();
        let (faults_tx, _faults_rx) = mpsc::channel(4);
        let pipeline = ClassifierPipeline::new(
            Box::new(SlowClassifier(Duration::from_millis(40))),
            LabelList::from_text("only one"),
        );

        let mut handle = VisionHandle::spawn(
            fast_camera(0),
            pipeline,
            Box::new(display.clone()),
            token.clone(),
            faults_tx,
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        let stats = handle.shutdown(Duration::from_secs(1)).await;

        assert!(stats.frames_dropped > 0);
        let overlays = display.overlays.lock().unwrap();
        assert_eq!(
            overlays[0].as_deref(),
            Some("description: Unknown, maxVal: 0.25")
        );
    }

    #[tokio::test]
    async fn unavailable_camera_closes_display() {
        let display = SharedDisplay::default();
        let (faults_tx, _faults_rx) = mpsc::channel(4);

        let result = VisionHandle::spawn(
            fast_camera(99),
            rgb_pipeline(),
            Box::new(display.clone()),
            CancellationToken::new(),
            faults_tx,
        )
        .await;

        assert!(matches!(result, Err(DeviceError::Unavailable { .. })));
        assert!(*display.closed.lock().unwrap());
    }

    #[test]
    fn dropped_display_guard_closes_display() {
        let display = SharedDisplay::default();
        let mut guard = DisplayGuard(Box::new(display.clone()));
        guard.show(Frame::solid(1, 1, [0, 0, 0]), None).unwrap();
        assert!(!*display.closed.lock().unwrap());

        drop(guard);
        assert!(*display.closed.lock().unwrap());
        assert_eq!(display.overlays.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn display_failure_is_reported() {
        let display = SharedDisplay {
            fail_after: Some(3),
            ..Default::default()
        };
        let token = CancellationToken::new();
        let (faults_tx, mut faults_rx) = mpsc::channel(4);

        let mut handle = VisionHandle::spawn(
            fast_camera(2),
            rgb_pipeline(),
            Box::new(display.clone()),
            token.clone(),
            faults_tx,
        )
        .await
        .unwrap();

        let fault = faults_rx.recv().await.unwrap();
        assert_eq!(fault.device(), DeviceKind::Display);

        token.cancel();
        handle.shutdown(Duration::from_secs(1)).await;
        assert!(*display.closed.lock().unwrap());
        assert_eq!(display.overlays.lock().unwrap().len(), 3);
    }
}
