//! Controller subsystem for gamepad input handling
//!
//! 1. [`event_collector`] - device events converted to [`ControllerEvent`]s
//! 2. [`dispatcher`] - the single handler applying each event
//! 3. [`axis_state`] - lock-free latest-value store read by the emitters
//! 4. [`controller_handle`] - thread/task lifecycle of the branch
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► input-source thread ──► InputDispatcher ──► AxisState
//!                                            │
//!                                            └──► VehicleSink (one-shots)
//! ```

pub mod axis_state;
pub mod controller_handle;
pub mod dispatcher;
pub mod event_collector;

pub use axis_state::{AxisId, AxisState, JoystickType, StickPosition};
pub use controller_handle::InputHandle;
pub use dispatcher::InputDispatcher;
pub use event_collector::{ButtonType, ControllerEvent, GamepadDevice, InputDevice, InputSource};
