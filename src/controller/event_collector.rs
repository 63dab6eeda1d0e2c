use crate::controller::axis_state::AxisId;
use crate::error::{DeviceError, DeviceKind};
use crate::mapping::translate::AXIS_RAW_MAX;
use chrono::{DateTime, Local};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use serde::{Deserialize, Serialize};
use statum::{machine, state};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Event delivered by an input source, consumed at once by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerEvent {
    /// Raw axis value in `-32767..=32767`, stick up is negative
    AxisChanged(AxisId, f64),
    ButtonPressed(ButtonType),
}

// Button type, named by position so profiles work across pad layouts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonType {
    /// Cross / A
    South,
    /// Circle / B
    East,
    /// Square / X
    West,
    /// Triangle / Y
    North,
    Start,
    Select,
    LeftBumper,
    RightBumper,
    LeftStick,
    RightStick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
    Guide,
}

/// An opened controller producing [`ControllerEvent`]s
///
/// Runs on the input delivery thread only, so it does not need to be `Send`.
pub trait InputSource {
    /// Waits at most `timeout` for the next event. `Ok(None)` means nothing
    /// usable arrived; an error means the controller is gone.
    fn next_event(&mut self, timeout: Duration) -> Result<Option<ControllerEvent>, DeviceError>;
}

/// A controller that can be opened on the delivery thread
pub trait InputDevice: Send + 'static {
    fn name(&self) -> &str;

    fn open(self: Box<Self>) -> Result<Box<dyn InputSource>, DeviceError>;
}

/// Gamepad found through gilrs
#[derive(Debug, Default)]
pub struct GamepadDevice;

impl InputDevice for GamepadDevice {
    fn name(&self) -> &str {
        "gilrs gamepad"
    }

    fn open(self: Box<Self>) -> Result<Box<dyn InputSource>, DeviceError> {
        let collector = EventCollector::create()?.initialize()?;
        Ok(Box::new(collector))
    }
}

// Define collector states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
pub struct EventCollector<S: CollectionState> {
    // Gilrs context
    gilrs: Gilrs,

    // Gamepad whose events are forwarded
    active_gamepad: Option<GamepadId>,

    // For performance monitoring
    event_count: u64,
    last_log_time: DateTime<Local>,
}

impl EventCollector<Initializing> {
    pub fn create() -> Result<Self, DeviceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(DeviceError::Unavailable {
                    device: DeviceKind::Controller,
                    reason: e.to_string(),
                });
            }
        };

        Ok(Self::new(gilrs, None, 0, Local::now()))
    }

    /// Selects the first connected gamepad and transitions to Collecting
    pub fn initialize(mut self) -> Result<EventCollector<Collecting>, DeviceError> {
        let selected = {
            let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!(
                    "  [{}] ID: {}, Name: {}, UUID: {:?}",
                    idx,
                    id,
                    gamepad.name(),
                    gamepad.uuid()
                );
            }
            gamepads
                .first()
                .map(|(id, gamepad)| (*id, gamepad.name().to_string()))
        };

        match selected {
            Some((id, name)) => {
                info!("Selected gamepad: {} ({})", name, id);
                self.active_gamepad = Some(id);
                Ok(self.transition())
            }
            None => {
                warn!("No gamepad connected");
                Err(DeviceError::Unavailable {
                    device: DeviceKind::Controller,
                    reason: "no gamepad connected".to_string(),
                })
            }
        }
    }
}

impl EventCollector<Collecting> {
    fn log_stats(&mut self) {
        let log_interval = chrono::Duration::seconds(10);
        let now = Local::now();
        if now - self.last_log_time > log_interval {
            info!(
                "Input source stats: {} events in last {} seconds (avg {:.2}/sec)",
                self.event_count,
                log_interval.num_seconds(),
                self.event_count as f64 / log_interval.num_seconds() as f64
            );
            self.event_count = 0;
            self.last_log_time = now;
        }
    }
}

impl InputSource for EventCollector<Collecting> {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<ControllerEvent>, DeviceError> {
        self.log_stats();

        let Some(Event { id, event, .. }) = self.gilrs.next_event_blocking(Some(timeout)) else {
            return Ok(None);
        };

        if self.active_gamepad != Some(id) {
            debug!("Skipping event from non-active gamepad: {:?}", id);
            return Ok(None);
        }
        self.event_count += 1;

        if matches!(event, EventType::Disconnected) {
            warn!("Active controller disconnected");
            return Err(DeviceError::Disconnected {
                device: DeviceKind::Controller,
            });
        }

        let converted = convert_gilrs_event(event);
        match &converted {
            Some(ControllerEvent::ButtonPressed(button)) => info!(
                "Button pressed: {:?} at {}",
                button,
                Local::now().format("%H:%M:%S.%3f")
            ),
            Some(axis_event) => debug!("Captured event: {:?}", axis_event),
            None => debug!("Event ignored: {:?}", event),
        }
        Ok(converted)
    }
}

// Convert gilrs event to internal event type
fn convert_gilrs_event(event: EventType) -> Option<ControllerEvent> {
    match event {
        EventType::AxisChanged(axis, value, _) => map_axis(axis)
            .map(|(axis_id, invert)| ControllerEvent::AxisChanged(axis_id, to_raw_axis(value, invert))),
        EventType::ButtonPressed(button, _) => map_button(button).map(ControllerEvent::ButtonPressed),
        EventType::Connected => {
            info!("Controller connected event detected");
            None
        }
        _ => None,
    }
}

// gilrs reports vertical axes with up positive, the raw convention is up negative
fn map_axis(axis: Axis) -> Option<(AxisId, bool)> {
    match axis {
        Axis::LeftStickX => Some((AxisId::LeftX, false)),
        Axis::LeftStickY => Some((AxisId::LeftY, true)),
        Axis::RightStickX => Some((AxisId::RightX, false)),
        Axis::RightStickY => Some((AxisId::RightY, true)),
        _ => None,
    }
}

/// Scales a gilrs axis value in `-1.0..=1.0` to the raw device range
fn to_raw_axis(value: f32, invert: bool) -> f64 {
    let raw = (value.clamp(-1.0, 1.0) as f64 * AXIS_RAW_MAX).round();
    if invert {
        -raw
    } else {
        raw
    }
}

// Helper function to map gilrs Button to our ButtonType
fn map_button(button: Button) -> Option<ButtonType> {
    match button {
        Button::South => Some(ButtonType::South),
        Button::East => Some(ButtonType::East),
        Button::West => Some(ButtonType::West),
        Button::North => Some(ButtonType::North),
        Button::Start => Some(ButtonType::Start),
        Button::Select => Some(ButtonType::Select),
        Button::LeftTrigger => Some(ButtonType::LeftBumper),
        Button::RightTrigger => Some(ButtonType::RightBumper),
        Button::LeftThumb => Some(ButtonType::LeftStick),
        Button::RightThumb => Some(ButtonType::RightStick),
        Button::DPadUp => Some(ButtonType::DPadUp),
        Button::DPadDown => Some(ButtonType::DPadDown),
        Button::DPadLeft => Some(ButtonType::DPadLeft),
        Button::DPadRight => Some(ButtonType::DPadRight),
        Button::Mode => Some(ButtonType::Guide),
        _ => None,
    }
}
