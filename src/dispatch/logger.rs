//! Observer that logs all change notifications at info level.

use crate::dispatch::GamepadObserver;
use crate::joystick::types::{AxisChanged, ButtonChanged};
use log::info;

/// Logs every notification, prefixed with the controller name.
#[derive(Debug, Clone)]
pub struct EventLogger {
    name: String,
}

impl EventLogger {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl GamepadObserver for EventLogger {
    fn on_axis_changed(&self, event: AxisChanged) {
        info!("[{}] Axis {} -> {}", self.name, event.address, event.value);
    }

    fn on_button_changed(&self, event: ButtonChanged) {
        let state = if event.pressed { "pressed" } else { "released" };
        info!("[{}] Button {} {}", self.name, event.address, state);
    }
}
