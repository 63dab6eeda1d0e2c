use super::VisionError;
use std::path::Path;
use tracing::info;

/// Label shown when the model predicts a class the label list does not have
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Class names indexed by model output position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelList {
    labels: Vec<String>,
}

impl LabelList {
    /// One label per line; blank lines keep their position
    pub fn from_text(text: &str) -> Self {
        Self {
            labels: text.lines().map(str::to_string).collect(),
        }
    }

    pub async fn load(path: &Path) -> Result<Self, VisionError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| VisionError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let labels = Self::from_text(&text);
        info!("Loaded {} labels from {}", labels.len(), path.display());
        Ok(labels)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Label for `index`, or [`UNKNOWN_LABEL`] when out of range
    pub fn describe(&self, index: usize) -> &str {
        self.get(index).unwrap_or(UNKNOWN_LABEL)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
