//! Camera → classifier → display branch
//!
//! Independent of flight control: nothing here reads [`AxisState`] or talks to
//! the vehicle, so slow inference can only delay the video overlay.
//!
//! ```text
//! CameraDevice ──► camera thread ─[Frame]→ vision thread ──► DisplaySink
//!                  (sync_channel(2))        │
//!                                  ClassifierPipeline (model + labels)
//! ```
//!
//! [`AxisState`]: crate::controller::AxisState

pub mod camera;
pub mod classifier;
pub mod display;
pub mod labels;
pub mod pipeline;

pub use camera::TestPatternCamera;
pub use classifier::{CentroidModel, ClassifierPipeline};
pub use display::{overlay_text, LogDisplay};
pub use labels::{LabelList, UNKNOWN_LABEL};
pub use pipeline::{VisionHandle, VisionStats};

use crate::error::DeviceError;
use std::path::PathBuf;

/// Errors raised while loading or running the classifier
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model: {0}")]
    ModelParse(#[from] toml::de::Error),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// One RGB8 image, moved from stage to stage
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, VisionError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(VisionError::InvalidFrame(format!(
                "{}x{} RGB frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Single-colour frame
    #[cfg(test)]
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data.chunks_exact(3).map(|px| [px[0], px[1], px[2]])
    }

    /// Average colour, `None` for an empty frame
    pub fn mean_rgb(&self) -> Option<[f32; 3]> {
        if self.is_empty() {
            return None;
        }
        let mut sums = [0u64; 3];
        let mut count = 0u64;
        for px in self.pixels() {
            for (sum, channel) in sums.iter_mut().zip(px) {
                *sum += channel as u64;
            }
            count += 1;
        }
        Some(sums.map(|sum| (sum as f64 / count as f64) as f32))
    }
}

/// Outcome of classifying one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
}

/// Raw model output: most probable class index and its probability
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub confidence: f32,
}

/// An image classifier loaded once for the whole run
pub trait Classifier: Send + 'static {
    fn predict(&self, frame: &Frame) -> Result<Prediction, VisionError>;
}

/// An opened camera
pub trait FrameSource {
    /// Blocks until the next frame is available
    fn next_frame(&mut self) -> Result<Frame, DeviceError>;
}

/// A camera that can be opened on the camera thread
pub trait CameraDevice: Send + 'static {
    fn name(&self) -> &str;

    fn open(self: Box<Self>) -> Result<Box<dyn FrameSource>, DeviceError>;
}

/// Where annotated frames end up
pub trait DisplaySink: Send + 'static {
    fn show(&mut self, frame: Frame, overlay: Option<&str>) -> Result<(), DeviceError>;

    /// Releases the display; called once when the branch stops
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_is_checked() {
        assert!(Frame::new(2, 2, vec![0; 12]).is_ok());
        assert!(matches!(
            Frame::new(2, 2, vec![0; 11]),
            Err(VisionError::InvalidFrame(_))
        ));
    }

    #[test]
    fn mean_colour_of_mixed_frame() {
        let frame = Frame::new(2, 1, vec![255, 0, 0, 0, 0, 255]).unwrap();
        assert_eq!(frame.mean_rgb(), Some([127.5, 0.0, 127.5]));
        assert_eq!(Frame::solid(0, 0, [1, 2, 3]).mean_rgb(), None);
        assert_eq!(Frame::solid(4, 3, [9, 8, 7]).pixels().count(), 12);
    }
}
