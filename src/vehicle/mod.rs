//! Vehicle command sink
//!
//! The control core only knows the [`VehicleSink`] contract: commands are
//! handed over fire-and-forget, and a failed hand-over means the link is gone.
//! The radio protocol behind a sink is not part of this crate.

pub mod dry_run;

pub use dry_run::DryRunVehicle;

use crate::error::DeviceError;

/// Normalised speed in `0..=100`
pub type Speed = u8;

/// Upper bound of [`Speed`]
pub const MAX_SPEED: Speed = 100;

/// A single instruction for the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionCommand {
    Forward(Speed),
    Backward(Speed),
    Left(Speed),
    Right(Speed),
    Up(Speed),
    Down(Speed),
    Clockwise(Speed),
    CounterClockwise(Speed),
    TakeOff,
    Land,
    Stop,
    EnableProtection,
}

impl MotionCommand {
    /// Speed of a movement command, `None` for discrete actions
    pub fn speed(&self) -> Option<Speed> {
        match *self {
            MotionCommand::Forward(s)
            | MotionCommand::Backward(s)
            | MotionCommand::Left(s)
            | MotionCommand::Right(s)
            | MotionCommand::Up(s)
            | MotionCommand::Down(s)
            | MotionCommand::Clockwise(s)
            | MotionCommand::CounterClockwise(s) => Some(s),
            MotionCommand::TakeOff
            | MotionCommand::Land
            | MotionCommand::Stop
            | MotionCommand::EnableProtection => None,
        }
    }

    pub fn is_discrete(&self) -> bool {
        self.speed().is_none()
    }
}

/// Direction of a continuous movement, without a magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
    Clockwise,
    CounterClockwise,
}

impl Direction {
    pub fn at(self, speed: Speed) -> MotionCommand {
        let speed = speed.min(MAX_SPEED);
        match self {
            Direction::Forward => MotionCommand::Forward(speed),
            Direction::Backward => MotionCommand::Backward(speed),
            Direction::Left => MotionCommand::Left(speed),
            Direction::Right => MotionCommand::Right(speed),
            Direction::Up => MotionCommand::Up(speed),
            Direction::Down => MotionCommand::Down(speed),
            Direction::Clockwise => MotionCommand::Clockwise(speed),
            Direction::CounterClockwise => MotionCommand::CounterClockwise(speed),
        }
    }
}

/// Anything that accepts motion commands for the one vehicle of this run
///
/// Shared between the input dispatcher and both emitters, so `send` takes
/// `&self` and must not block on an acknowledgement.
pub trait VehicleSink: Send + Sync + 'static {
    /// Establishes the link before the first command
    fn connect(&self) -> Result<(), DeviceError>;

    /// Hands one command to the link
    fn send(&self, command: MotionCommand) -> Result<(), DeviceError>;

    /// Releases the link; later `send` calls fail
    fn disconnect(&self);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_builds_matching_command() {
        assert_eq!(Direction::Forward.at(61), MotionCommand::Forward(61));
        assert_eq!(Direction::CounterClockwise.at(0), MotionCommand::CounterClockwise(0));
        assert_eq!(Direction::Up.at(250), MotionCommand::Up(MAX_SPEED));
    }

    #[test]
    fn discrete_commands_have_no_speed() {
        assert!(MotionCommand::TakeOff.is_discrete());
        assert!(MotionCommand::EnableProtection.is_discrete());
        assert_eq!(MotionCommand::Right(12).speed(), Some(12));
    }
}
