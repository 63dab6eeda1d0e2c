//! Shared Axis State - latest stick readings shared between input and emitters
//!
//! Written by the input dispatcher, read by the periodic command emitters.
//! Each axis is an independent atomic cell holding the bit pattern of an `f64`,
//! so a reader always sees a complete value from some earlier `set` and a
//! writer never waits on a reader.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// One analog channel of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisId {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

// Joystick type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoystickType {
    Left,
    Right,
}

impl JoystickType {
    /// Horizontal and vertical axis of this stick
    pub fn axes(self) -> (AxisId, AxisId) {
        match self {
            JoystickType::Left => (AxisId::LeftX, AxisId::LeftY),
            JoystickType::Right => (AxisId::RightX, AxisId::RightY),
        }
    }
}

/// Snapshot of one stick, read field by field
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StickPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Default)]
struct AxisCell(AtomicU64);

impl AxisCell {
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Four independent axis cells
///
/// Zero-initialised (`0.0f64` has an all-zero bit pattern). Updates are whole
/// value replacements; there is no read-modify-write anywhere.
#[derive(Debug, Default)]
pub struct AxisState {
    left_x: AxisCell,
    left_y: AxisCell,
    right_x: AxisCell,
    right_y: AxisCell,
}

impl AxisState {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, axis: AxisId) -> &AxisCell {
        match axis {
            AxisId::LeftX => &self.left_x,
            AxisId::LeftY => &self.left_y,
            AxisId::RightX => &self.right_x,
            AxisId::RightY => &self.right_y,
        }
    }

    pub fn set(&self, axis: AxisId, value: f64) {
        self.cell(axis).store(value);
    }

    pub fn get(&self, axis: AxisId) -> f64 {
        self.cell(axis).load()
    }

    /// Reads both axes of a stick. The pair is not a consistent snapshot;
    /// each field is the latest value of its own axis.
    pub fn stick(&self, stick: JoystickType) -> StickPosition {
        let (x_axis, y_axis) = stick.axes();
        StickPosition {
            x: self.get(x_axis),
            y: self.get(y_axis),
        }
    }

    pub fn reset(&self) {
        for axis in [AxisId::LeftX, AxisId::LeftY, AxisId::RightX, AxisId::RightY] {
            self.set(axis, 0.0);
        }
    }
}
