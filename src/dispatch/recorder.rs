//! Recording observer.
//!
//! Keeps every notification it receives, in delivery order. Useful for tests
//! and for inspecting a device without writing a handler.

use crate::dispatch::GamepadObserver;
use crate::joystick::types::{AxisChanged, ButtonChanged, GamepadEvent};
use log::trace;
use std::sync::{Mutex, PoisonError};

/// Observer that records events instead of acting on them.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<GamepadEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<GamepadEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Take and clear the recorded events
    pub fn drain(&self) -> Vec<GamepadEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, event: GamepadEvent) {
        trace!("[RECORDER] {:?}", event);
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

impl GamepadObserver for EventRecorder {
    fn on_axis_changed(&self, event: AxisChanged) {
        self.push(event.into());
    }

    fn on_button_changed(&self, event: ButtonChanged) {
        self.push(event.into());
    }
}
