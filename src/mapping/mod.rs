//! Mapping of controller input onto vehicle commands.
//!
//! Two paths leave the controller:
//!
//! ```text
//! ButtonPressed ──► ButtonBindings ──► OneShot ──► VehicleSink      (immediate)
//! AxisChanged   ──► AxisState ──► CommandEmitter ──► VehicleSink    (every tick)
//! ```
//!
//! [`translate`] holds the dead-zone/normalisation algorithm, [`engine`] the
//! fixed-interval emitters that apply it.

pub mod engine;
pub mod translate;

pub use engine::{CommandEmitter, EmitterHandle};
pub use translate::{AxisRule, CommandPair, Normalizer, StickTranslator, Tuning};

use crate::controller::event_collector::ButtonType;
use crate::vehicle::MotionCommand;
use serde::{Deserialize, Serialize};

/// Discrete action fired once per button press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneShot {
    Stop,
    /// Take off with hull protection enabled
    TakeOff,
    Land,
}

impl OneShot {
    /// Commands sent to the vehicle for this action, in order
    pub fn commands(self) -> &'static [MotionCommand] {
        match self {
            OneShot::Stop => &[MotionCommand::Stop],
            OneShot::TakeOff => &[MotionCommand::EnableProtection, MotionCommand::TakeOff],
            OneShot::Land => &[MotionCommand::Land],
        }
    }
}

/// One `[[buttons]]` entry of a controller profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonBinding {
    pub button: ButtonType,
    pub action: OneShot,
}

/// Button to one-shot action table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ButtonBindings(Vec<ButtonBinding>);

impl ButtonBindings {
    #[cfg(test)]
    pub fn new(bindings: Vec<ButtonBinding>) -> Self {
        Self(bindings)
    }

    /// First action bound to `button`
    pub fn action_for(&self, button: ButtonType) -> Option<OneShot> {
        self.0
            .iter()
            .find(|binding| binding.button == button)
            .map(|binding| binding.action)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ButtonBindings {
    /// Square stops, triangle takes off, cross lands (DualShock face layout)
    fn default() -> Self {
        Self(vec![
            ButtonBinding {
                button: ButtonType::West,
                action: OneShot::Stop,
            },
            ButtonBinding {
                button: ButtonType::North,
                action: OneShot::TakeOff,
            },
            ButtonBinding {
                button: ButtonType::South,
                action: OneShot::Land,
            },
        ])
    }
}
