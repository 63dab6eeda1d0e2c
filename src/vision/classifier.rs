//! Classifier model and the label-resolving pipeline around it
//!
//! [`CentroidModel`] is a small colour-centroid classifier: each class is an
//! RGB centroid, a frame is scored by the distance of its mean colour to every
//! centroid and the scores are turned into probabilities with a softmax.
//!
//! Model file format (TOML):
//!
//! ```toml
//! temperature = 16.0
//! centroids = [
//!     [255.0, 0.0, 0.0],
//!     [0.0, 255.0, 0.0],
//! ]
//! ```

use super::labels::LabelList;
use super::{ClassificationResult, Classifier, Frame, Prediction, VisionError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

fn default_temperature() -> f32 {
    16.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidModel {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    pub centroids: Vec<[f32; 3]>,
}

impl CentroidModel {
    pub fn from_toml_str(text: &str) -> Result<Self, VisionError> {
        let model: Self = toml::from_str(text)?;
        model.validate()?;
        Ok(model)
    }

    pub async fn load(path: &Path) -> Result<Self, VisionError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| VisionError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let model = Self::from_toml_str(&text)?;
        info!(
            "Loaded model with {} classes from {}",
            model.class_count(),
            path.display()
        );
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), VisionError> {
        if self.centroids.is_empty() {
            return Err(VisionError::InvalidModel(
                "model has no classes".to_string(),
            ));
        }
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(VisionError::InvalidModel(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        if let Some(i) = self
            .centroids
            .iter()
            .position(|c| c.iter().any(|v| !v.is_finite()))
        {
            return Err(VisionError::InvalidModel(format!(
                "centroid {} is not finite",
                i
            )));
        }
        Ok(())
    }

    pub fn class_count(&self) -> usize {
        self.centroids.len()
    }

    /// Class probabilities for a mean colour
    fn probabilities(&self, mean: [f32; 3]) -> Vec<f32> {
        let logits: Vec<f32> = self
            .centroids
            .iter()
            .map(|c| -distance(mean, *c) / self.temperature)
            .collect();
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }
}

fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

impl Classifier for CentroidModel {
    fn predict(&self, frame: &Frame) -> Result<Prediction, VisionError> {
        let mean = frame
            .mean_rgb()
            .ok_or_else(|| VisionError::Inference("empty frame".to_string()))?;

        // First maximum wins on ties
        let (index, confidence) = self
            .probabilities(mean)
            .into_iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            });

        Ok(Prediction { index, confidence })
    }
}

/// Model plus labels: turns a frame into a displayable result
pub struct ClassifierPipeline {
    classifier: Box<dyn Classifier>,
    labels: LabelList,
}

impl ClassifierPipeline {
    pub fn new(classifier: Box<dyn Classifier>, labels: LabelList) -> Self {
        Self { classifier, labels }
    }

    pub fn classify(&self, frame: &Frame) -> Result<ClassificationResult, VisionError> {
        let prediction = self.classifier.predict(frame)?;
        if prediction.index >= self.labels.len() {
            debug!(
                "Class {} has no label ({} labels loaded)",
                prediction.index,
                self.labels.len()
            );
        }
        Ok(ClassificationResult {
            label: self.labels.describe(prediction.index).to_string(),
            confidence: prediction.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::UNKNOWN_LABEL;

    const RGB_MODEL: &str = r#"
        temperature = 16.0
        centroids = [
            [255.0, 0.0, 0.0],
            [0.0, 255.0, 0.0],
            [0.0, 0.0, 255.0],
        ]
    "#;

    struct FixedClassifier(Prediction);

    impl Classifier for FixedClassifier {
        fn predict(&self, _frame: &Frame) -> Result<Prediction, VisionError> {
            Ok(self.0)
        }
    }

    #[test]
    fn nearest_centroid_wins() {
        let model = CentroidModel::from_toml_str(RGB_MODEL).unwrap();
        let prediction = model.predict(&Frame::solid(8, 8, [10, 240, 5])).unwrap();
        assert_eq!(prediction.index, 1);
        assert!(prediction.confidence > 0.9);
        assert!(prediction.confidence <= 1.0);
    }

    #[test]
    fn equidistant_frame_splits_probability() {
        let model = CentroidModel::from_toml_str(
            "centroids = [[0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]",
        )
        .unwrap();
        let prediction = model.predict(&Frame::solid(2, 2, [50, 50, 50])).unwrap();
        assert_eq!(prediction.index, 0);
        assert!((prediction.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_frame_is_an_inference_error() {
        let model = CentroidModel::from_toml_str(RGB_MODEL).unwrap();
        assert!(matches!(
            model.predict(&Frame::solid(0, 0, [0, 0, 0])),
            Err(VisionError::Inference(_))
        ));
    }

    #[test]
    fn invalid_models_are_rejected() {
        assert!(matches!(
            CentroidModel::from_toml_str("centroids = []"),
            Err(VisionError::InvalidModel(_))
        ));
        assert!(matches!(
            CentroidModel::from_toml_str("temperature = 0.0\ncentroids = [[1.0, 2.0, 3.0]]"),
            Err(VisionError::InvalidModel(_))
        ));
        assert!(matches!(
            CentroidModel::from_toml_str("centroids = \"red\""),
            Err(VisionError::ModelParse(_))
        ));
    }

    #[test]
    fn pipeline_resolves_labels() {
        let model = CentroidModel::from_toml_str(RGB_MODEL).unwrap();
        let pipeline = ClassifierPipeline::new(
            Box::new(model),
            LabelList::from_text("red\ngreen\nblue\n"),
        );
        let result = pipeline.classify(&Frame::solid(4, 4, [0, 0, 250])).unwrap();
        assert_eq!(result.label, "blue");
    }

    #[test]
    fn index_past_labels_is_unknown() {
        let labels: String = (0..1000).map(|i| format!("class {i}\n")).collect();
        let pipeline = ClassifierPipeline::new(
            Box::new(FixedClassifier(Prediction {
                index: 1500,
                confidence: 0.42,
            })),
            LabelList::from_text(&labels),
        );
        let result = pipeline.classify(&Frame::solid(1, 1, [0, 0, 0])).unwrap();
        assert_eq!(result.label, UNKNOWN_LABEL);
        assert_eq!(result.confidence, 0.42);
    }
}
