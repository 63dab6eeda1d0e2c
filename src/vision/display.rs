use super::{ClassificationResult, DisplaySink, Frame};
use crate::error::{DeviceError, DeviceKind};
use tracing::{debug, info};

/// Frames between info-level display summaries
const SUMMARY_EVERY: u64 = 100;

/// Text drawn over a classified frame
pub fn overlay_text(result: &ClassificationResult) -> String {
    format!(
        "description: {}, maxVal: {}",
        result.label, result.confidence
    )
}

/// Headless display that reports what it would draw through tracing
#[derive(Debug)]
pub struct LogDisplay {
    title: String,
    frames_shown: u64,
    last_overlay: Option<String>,
    open: bool,
}

impl LogDisplay {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            frames_shown: 0,
            last_overlay: None,
            open: true,
        }
    }
}

#[cfg(test)]
impl LogDisplay {
    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    pub fn last_overlay(&self) -> Option<&str> {
        self.last_overlay.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl DisplaySink for LogDisplay {
    fn show(&mut self, frame: Frame, overlay: Option<&str>) -> Result<(), DeviceError> {
        if !self.open {
            return Err(DeviceError::Disconnected {
                device: DeviceKind::Display,
            });
        }

        self.frames_shown += 1;
        debug!(
            "[{}] {}x{} frame: {}",
            self.title,
            frame.width(),
            frame.height(),
            overlay.unwrap_or("-")
        );
        if let Some(text) = overlay {
            self.last_overlay = Some(text.to_string());
        }
        if self.frames_shown % SUMMARY_EVERY == 0 {
            info!(
                "[{}] {} frames shown, latest: {}",
                self.title,
                self.frames_shown,
                self.last_overlay.as_deref().unwrap_or("-")
            );
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            info!("[{}] closed after {} frames", self.title, self.frames_shown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_format() {
        let result = ClassificationResult {
            label: "goldfish".to_string(),
            confidence: 0.5,
        };
        assert_eq!(overlay_text(&result), "description: goldfish, maxVal: 0.5");
    }

    #[test]
    fn closed_display_rejects_frames() {
        let mut display = LogDisplay::new("test");
        display
            .show(Frame::solid(1, 1, [0, 0, 0]), Some("description: x, maxVal: 1"))
            .unwrap();
        display.show(Frame::solid(1, 1, [0, 0, 0]), None).unwrap();
        assert_eq!(display.frames_shown(), 2);
        assert_eq!(display.last_overlay(), Some("description: x, maxVal: 1"));

        display.close();
        assert!(!display.is_open());
        assert!(display.show(Frame::solid(1, 1, [0, 0, 0]), None).is_err());
    }
}
