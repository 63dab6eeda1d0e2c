//! Synthetic camera producing solid-colour test patterns
//!
//! Stands in for a capture device: the index picks the starting colour and
//! the pattern steps through [`PALETTE`] every [`FRAMES_PER_COLOUR`] frames.

use super::{CameraDevice, Frame, FrameSource, VisionError};
use crate::error::{DeviceError, DeviceKind};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const PALETTE: [[u8; 3]; 4] = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 0]];

/// Frames each palette colour is held for
pub const FRAMES_PER_COLOUR: u64 = 30;

/// Highest index that opens
pub const MAX_CAMERA_INDEX: u32 = 7;

#[derive(Debug, Clone)]
pub struct TestPatternCamera {
    name: String,
    index: u32,
    width: u32,
    height: u32,
    frame_interval: Duration,
}

impl TestPatternCamera {
    pub fn new(index: u32) -> Self {
        Self {
            name: format!("test-pattern-{}", index),
            index,
            width: 160,
            height: 120,
            frame_interval: Duration::from_millis(33),
        }
    }
}

#[cfg(test)]
impl TestPatternCamera {
    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

impl CameraDevice for TestPatternCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(self: Box<Self>) -> Result<Box<dyn FrameSource>, DeviceError> {
        if self.index > MAX_CAMERA_INDEX {
            return Err(DeviceError::Unavailable {
                device: DeviceKind::Camera,
                reason: format!("no camera at index {}", self.index),
            });
        }
        info!(
            "Camera {} streaming {}x{} every {}ms",
            self.name,
            self.width,
            self.height,
            self.frame_interval.as_millis()
        );
        Ok(Box::new(TestPatternSource {
            camera: *self,
            frames: 0,
            next_due: Instant::now(),
        }))
    }
}

struct TestPatternSource {
    camera: TestPatternCamera,
    frames: u64,
    next_due: Instant,
}

impl TestPatternSource {
    fn colour(&self) -> [u8; 3] {
        let step = self.frames / FRAMES_PER_COLOUR + self.camera.index as u64;
        PALETTE[(step % PALETTE.len() as u64) as usize]
    }

    fn render(&self) -> Result<Frame, VisionError> {
        let pixels = self.camera.width as usize * self.camera.height as usize;
        let data = self.colour().repeat(pixels);
        Frame::new(self.camera.width, self.camera.height, data)
    }
}

impl FrameSource for TestPatternSource {
    fn next_frame(&mut self) -> Result<Frame, DeviceError> {
        let now = Instant::now();
        if self.next_due > now {
            std::thread::sleep(self.next_due - now);
        }
        self.next_due += self.camera.frame_interval;

        let frame = self.render().map_err(|e| DeviceError::Io {
            device: DeviceKind::Camera,
            reason: e.to_string(),
        })?;
        self.frames += 1;
        if self.frames % FRAMES_PER_COLOUR == 0 {
            debug!("Camera {} produced {} frames", self.camera.name, self.frames);
        }
        Ok(frame)
    }
}
