//! Stick position to motion command translation
//!
//! Raw axis values use the HID convention: `-32767..=32767`, pushing a stick
//! up gives a negative vertical value. Each axis has its own dead-zone; a value
//! whose magnitude is not strictly above it yields the neutral command.

use crate::controller::axis_state::{JoystickType, StickPosition};
use crate::vehicle::{Direction, MotionCommand, Speed, MAX_SPEED};
use serde::{Deserialize, Serialize};

/// Raw magnitude of a fully deflected axis
pub const AXIS_RAW_MAX: f64 = 32767.0;

/// Emitter timing and translation parameters, the `[tuning]` table of a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Emitter tick period in milliseconds
    pub interval_ms: u64,
    /// Dead-zone of the forward/backward axis (right stick, vertical)
    pub pitch_threshold: f64,
    /// Dead-zone of the left/right axis (right stick, horizontal)
    pub roll_threshold: f64,
    /// Dead-zone of the up/down axis (left stick, vertical)
    pub throttle_threshold: f64,
    /// Dead-zone of the rotation axis (left stick, horizontal)
    pub yaw_threshold: f64,
    /// Raw magnitude that maps to full speed
    pub offset: f64,
    /// Fraction of `offset` below which the speed is reported as zero
    pub min_fraction: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            interval_ms: 10,
            pitch_threshold: 10.0,
            roll_threshold: 10.0,
            throttle_threshold: 10.0,
            yaw_threshold: 20.0,
            offset: AXIS_RAW_MAX,
            min_fraction: 0.1,
        }
    }
}

/// Maps a raw magnitude onto `0..=100`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    pub offset: f64,
    pub min_fraction: f64,
}

impl Normalizer {
    pub fn new(offset: f64, min_fraction: f64) -> Self {
        Self {
            offset,
            min_fraction,
        }
    }

    /// Percentage of `offset`, truncated. Deflections under `min_fraction`
    /// give 0 and anything past `offset` is clamped to 100.
    pub fn normalize(&self, magnitude: f64) -> Speed {
        let fraction = magnitude.abs() / self.offset;
        if fraction.is_nan() || fraction < self.min_fraction {
            0
        } else if fraction > 1.0 {
            MAX_SPEED
        } else {
            (fraction * 100.0).floor() as Speed
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        let tuning = Tuning::default();
        Self::new(tuning.offset, tuning.min_fraction)
    }
}

/// Translation of one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRule {
    pub threshold: f64,
    /// Direction for values below `-threshold`
    pub negative: Direction,
    /// Direction for values above `threshold`
    pub positive: Direction,
    /// Direction sent at speed 0 inside the dead-zone
    pub neutral: Direction,
}

impl AxisRule {
    pub fn apply(&self, value: f64, normalizer: &Normalizer) -> MotionCommand {
        if value < -self.threshold {
            self.negative.at(normalizer.normalize(value))
        } else if value > self.threshold {
            self.positive.at(normalizer.normalize(value))
        } else {
            self.neutral.at(0)
        }
    }
}

/// Commands produced by one emitter tick, sent in field order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPair {
    /// From the vertical axis
    pub primary: MotionCommand,
    /// From the horizontal axis
    pub secondary: MotionCommand,
}

/// Translation of both axes of one stick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickTranslator {
    pub stick: JoystickType,
    pub vertical: AxisRule,
    pub horizontal: AxisRule,
    pub normalizer: Normalizer,
}

impl StickTranslator {
    pub fn for_stick(stick: JoystickType, tuning: &Tuning) -> Self {
        match stick {
            JoystickType::Left => Self::left_stick(tuning),
            JoystickType::Right => Self::right_stick(tuning),
        }
    }

    /// Right stick: forward/backward and strafe
    pub fn right_stick(tuning: &Tuning) -> Self {
        Self {
            stick: JoystickType::Right,
            vertical: AxisRule {
                threshold: tuning.pitch_threshold,
                negative: Direction::Forward,
                positive: Direction::Backward,
                neutral: Direction::Forward,
            },
            horizontal: AxisRule {
                threshold: tuning.roll_threshold,
                negative: Direction::Left,
                positive: Direction::Right,
                neutral: Direction::Right,
            },
            normalizer: Normalizer::new(tuning.offset, tuning.min_fraction),
        }
    }

    /// Left stick: altitude and rotation
    pub fn left_stick(tuning: &Tuning) -> Self {
        Self {
            stick: JoystickType::Left,
            vertical: AxisRule {
                threshold: tuning.throttle_threshold,
                negative: Direction::Up,
                positive: Direction::Down,
                neutral: Direction::Up,
            },
            horizontal: AxisRule {
                threshold: tuning.yaw_threshold,
                negative: Direction::CounterClockwise,
                positive: Direction::Clockwise,
                neutral: Direction::Clockwise,
            },
            normalizer: Normalizer::new(tuning.offset, tuning.min_fraction),
        }
    }

    pub fn translate(&self, position: StickPosition) -> CommandPair {
        CommandPair {
            primary: self.vertical.apply(position.y, &self.normalizer),
            secondary: self.horizontal.apply(position.x, &self.normalizer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn right() -> StickTranslator {
        StickTranslator::right_stick(&Tuning::default())
    }

    fn left() -> StickTranslator {
        StickTranslator::left_stick(&Tuning::default())
    }

    fn at(x: f64, y: f64) -> StickPosition {
        StickPosition { x, y }
    }

    #[test]
    fn normalize_truncates_percentage() {
        let n = Normalizer::default();
        assert_eq!(n.normalize(20000.0), 61);
        assert_eq!(n.normalize(-20000.0), 61);
        assert_eq!(n.normalize(AXIS_RAW_MAX), 100);
        assert_eq!(n.normalize(16383.5), 50);
    }

    #[test]
    fn normalize_floors_small_and_clamps_large() {
        let n = Normalizer::default();
        assert_eq!(n.normalize(15.0), 0);
        assert_eq!(n.normalize(3000.0), 0);
        assert_eq!(n.normalize(40000.0), 100);
        assert_eq!(n.normalize(f64::INFINITY), 100);
        assert_eq!(n.normalize(f64::NAN), 0);
    }

    #[test]
    fn normalize_is_monotonic_and_bounded() {
        let n = Normalizer::default();
        let mut previous = 0;
        for raw in (0..=40_000).step_by(7) {
            let speed = n.normalize(raw as f64);
            assert!(speed >= previous, "speed dropped at {raw}");
            assert!(speed <= MAX_SPEED);
            previous = speed;
        }
    }

    #[test]
    fn dead_zone_is_neutral_regardless_of_sign() {
        let t = right();
        for v in [-10.0, -9.5, -1.0, 0.0, 1.0, 9.99, 10.0] {
            let pair = t.translate(at(v, v));
            assert_eq!(pair.primary, MotionCommand::Forward(0), "y = {v}");
            assert_eq!(pair.secondary, MotionCommand::Right(0), "x = {v}");
        }
    }

    #[test]
    fn right_stick_vertical_scenarios() {
        let t = right();
        let speed = t.normalizer.normalize(20000.0);
        assert_eq!(
            t.translate(at(0.0, -20000.0)).primary,
            MotionCommand::Forward(speed)
        );
        assert_eq!(
            t.translate(at(0.0, 20000.0)).primary,
            MotionCommand::Backward(speed)
        );
        assert_eq!(t.translate(at(0.0, 5.0)).primary, MotionCommand::Forward(0));
    }

    #[test]
    fn right_stick_horizontal_scenarios() {
        let t = right();
        assert_eq!(
            t.translate(at(15.0, 0.0)).secondary,
            MotionCommand::Right(t.normalizer.normalize(15.0))
        );
        assert_eq!(t.translate(at(-5.0, 0.0)).secondary, MotionCommand::Right(0));
        assert_eq!(
            t.translate(at(-32767.0, 0.0)).secondary,
            MotionCommand::Left(100)
        );
    }

    #[test]
    fn yaw_needs_larger_deflection_than_throttle() {
        let t = left();
        let pair = t.translate(at(15.0, -15.0));
        assert_eq!(pair.primary, MotionCommand::Up(0));
        assert_eq!(pair.secondary, MotionCommand::Clockwise(0));

        // Still neutral for yaw at exactly its threshold
        assert_eq!(
            t.translate(at(20.0, 0.0)).secondary,
            MotionCommand::Clockwise(0)
        );
        assert_eq!(
            t.translate(at(-30000.0, 0.0)).secondary,
            MotionCommand::CounterClockwise(91)
        );
        assert_eq!(
            t.translate(at(0.0, 30000.0)).primary,
            MotionCommand::Down(91)
        );
    }

    #[test]
    fn thresholds_come_from_tuning() {
        let tuning = Tuning {
            pitch_threshold: 5000.0,
            ..Tuning::default()
        };
        let t = StickTranslator::for_stick(JoystickType::Right, &tuning);
        assert_eq!(t.translate(at(0.0, -4999.0)).primary, MotionCommand::Forward(0));
        assert_eq!(
            t.translate(at(0.0, -5001.0)).primary,
            MotionCommand::Forward(15)
        );
    }
}
