//! Process configuration: command line and controller profile
//!
//! Everything here is loaded and checked before any device is opened, so a
//! bad argument or file never leaves a half-started vehicle behind.
//!
//! Profile format (TOML, every section optional):
//!
//! ```toml
//! [[buttons]]
//! button = "West"
//! action = "stop"
//!
//! [tuning]
//! interval_ms = 10
//! yaw_threshold = 20.0
//! ```

use crate::mapping::{ButtonBindings, Tuning};
use crate::vision::{CentroidModel, LabelList, VisionError, UNKNOWN_LABEL};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Drive a drone from a gamepad while classifying the camera feed
#[derive(Debug, Clone, Parser)]
#[command(name = "tensordrone", version, about)]
pub struct Cli {
    /// Identifier of the vehicle to connect to
    pub vehicle_id: String,

    /// Controller profile (TOML)
    pub profile: PathBuf,

    /// Camera device index
    pub camera_index: u32,

    /// Classifier model file (TOML centroids)
    pub model: PathBuf,

    /// Label list, one class name per line
    pub labels: PathBuf,

    /// Override the emitter tick period from the profile
    #[arg(long, value_name = "MS")]
    pub tick_ms: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse profile: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid profile: {0}")]
    Invalid(String),

    #[error(transparent)]
    Vision(#[from] VisionError),
}

/// Button bindings and tuning for one gamepad
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerProfile {
    #[serde(default)]
    pub buttons: ButtonBindings,
    #[serde(default)]
    pub tuning: Tuning,
}

impl ControllerProfile {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let profile: Self = toml::from_str(text)?;
        profile.validate()?;
        Ok(profile)
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let profile = Self::from_toml_str(&text)?;
        info!(
            "Loaded profile {} ({} button bindings, {}ms interval)",
            path.display(),
            profile.buttons.len(),
            profile.tuning.interval_ms
        );
        if profile.buttons.is_empty() {
            warn!("Profile {} binds no buttons, one-shot actions are disabled", path.display());
        }
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tuning = &self.tuning;
        if tuning.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "interval_ms must be greater than zero".to_string(),
            ));
        }
        if !(tuning.offset.is_finite() && tuning.offset > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "offset must be positive, got {}",
                tuning.offset
            )));
        }
        if !(0.0..=1.0).contains(&tuning.min_fraction) {
            return Err(ConfigError::Invalid(format!(
                "min_fraction must be within 0..=1, got {}",
                tuning.min_fraction
            )));
        }
        let thresholds = [
            ("pitch_threshold", tuning.pitch_threshold),
            ("roll_threshold", tuning.roll_threshold),
            ("throttle_threshold", tuning.throttle_threshold),
            ("yaw_threshold", tuning.yaw_threshold),
        ];
        for (name, value) in thresholds {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Applies the `--tick-ms` override
    pub fn with_tick_override(mut self, tick_ms: Option<u64>) -> Result<Self, ConfigError> {
        if let Some(ms) = tick_ms {
            self.tuning.interval_ms = ms;
            self.validate()?;
        }
        Ok(self)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.tuning.interval_ms)
    }
}

/// Everything read from disk before a session opens any device
#[derive(Debug)]
pub struct SessionFiles {
    pub profile: ControllerProfile,
    pub labels: LabelList,
    pub model: CentroidModel,
}

impl SessionFiles {
    pub async fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let profile = ControllerProfile::load(&cli.profile)
            .await?
            .with_tick_override(cli.tick_ms)?;
        let labels = LabelList::load(&cli.labels).await?;
        let model = CentroidModel::load(&cli.model).await?;

        if labels.is_empty() {
            warn!(
                "Label list {} is empty, every class shows as {}",
                cli.labels.display(),
                UNKNOWN_LABEL
            );
        } else if model.class_count() > labels.len() {
            info!(
                "Model has {} classes but only {} labels, extra classes show as {}",
                model.class_count(),
                labels.len(),
                UNKNOWN_LABEL
            );
        }

        Ok(Self {
            profile,
            labels,
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ButtonType;
    use crate::mapping::OneShot;

    #[test]
    fn empty_profile_uses_defaults() {
        let profile = ControllerProfile::from_toml_str("").unwrap();
        assert_eq!(profile, ControllerProfile::default());
        assert_eq!(profile.interval(), Duration::from_millis(10));
        assert_eq!(
            profile.buttons.action_for(ButtonType::North),
            Some(OneShot::TakeOff)
        );
    }

    #[test]
    fn bindings_and_partial_tuning() {
        let profile = ControllerProfile::from_toml_str(
            r#"
            [[buttons]]
            button = "Start"
            action = "land"

            [tuning]
            yaw_threshold = 40.0
            "#,
        )
        .unwrap();

        assert_eq!(profile.buttons.len(), 1);
        assert_eq!(
            profile.buttons.action_for(ButtonType::Start),
            Some(OneShot::Land)
        );
        assert_eq!(profile.buttons.action_for(ButtonType::South), None);
        assert_eq!(profile.tuning.yaw_threshold, 40.0);
        assert_eq!(profile.tuning.pitch_threshold, 10.0);
    }

    #[test]
    fn invalid_tuning_is_rejected() {
        for text in [
            "[tuning]\ninterval_ms = 0",
            "[tuning]\noffset = 0.0",
            "[tuning]\nmin_fraction = 1.5",
            "[tuning]\nroll_threshold = -1.0",
        ] {
            assert!(
                matches!(
                    ControllerProfile::from_toml_str(text),
                    Err(ConfigError::Invalid(_))
                ),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn unknown_action_is_a_parse_error() {
        let text = "[[buttons]]\nbutton = \"South\"\naction = \"barrel_roll\"";
        assert!(matches!(
            ControllerProfile::from_toml_str(text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn tick_override() {
        let profile = ControllerProfile::default()
            .with_tick_override(Some(25))
            .unwrap();
        assert_eq!(profile.interval(), Duration::from_millis(25));
        assert!(ControllerProfile::default()
            .with_tick_override(Some(0))
            .is_err());
    }

    #[test]
    fn cli_takes_five_positionals() {
        let cli = Cli::try_parse_from([
            "tensordrone",
            "tello-01",
            "profile.toml",
            "2",
            "model.toml",
            "labels.txt",
            "--tick-ms",
            "20",
        ])
        .unwrap();
        assert_eq!(cli.vehicle_id, "tello-01");
        assert_eq!(cli.camera_index, 2);
        assert_eq!(cli.tick_ms, Some(20));

        assert!(Cli::try_parse_from(["tensordrone", "tello-01", "profile.toml"]).is_err());
    }

    #[tokio::test]
    async fn missing_profile_is_a_read_error() {
        assert!(matches!(
            ControllerProfile::load(Path::new("/nonexistent/profile.toml")).await,
            Err(ConfigError::Read { .. })
        ));
    }

    async fn write_session(name: &str, labels: Option<&str>) -> Cli {
        let dir = std::env::temp_dir().join(format!("tensordrone-{}-{}", std::process::id(), name));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("profile.toml"), "[tuning]\ninterval_ms = 20\n")
            .await
            .unwrap();
        tokio::fs::write(dir.join("model.toml"), "centroids = [[0.0, 0.0, 0.0], [9.0, 9.0, 9.0]]")
            .await
            .unwrap();
        if let Some(text) = labels {
            tokio::fs::write(dir.join("labels.txt"), text).await.unwrap();
        }

        Cli {
            vehicle_id: "tello-01".to_string(),
            profile: dir.join("profile.toml"),
            camera_index: 0,
            model: dir.join("model.toml"),
            labels: dir.join("labels.txt"),
            tick_ms: None,
        }
    }

    #[tokio::test]
    async fn session_files_load_together() {
        let cli = write_session("complete", Some("dark\n")).await;
        let files = SessionFiles::load(&cli).await.unwrap();

        assert_eq!(files.profile.interval(), Duration::from_millis(20));
        assert_eq!(files.labels.len(), 1);
        assert_eq!(files.model.class_count(), 2);
    }

    #[tokio::test]
    async fn unreadable_labels_are_a_config_error() {
        let cli = write_session("no-labels", None).await;
        assert!(matches!(
            SessionFiles::load(&cli).await,
            Err(ConfigError::Vision(VisionError::Read { .. }))
        ));
    }

    #[tokio::test]
    async fn tick_override_applies_to_loaded_profile() {
        let mut cli = write_session("override", Some("dark\n")).await;
        cli.tick_ms = Some(0);
        assert!(matches!(
            SessionFiles::load(&cli).await,
            Err(ConfigError::Invalid(_))
        ));
    }
}
