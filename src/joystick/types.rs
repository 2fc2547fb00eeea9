//! Joystick type definitions
//!
//! This module defines the change notification records raised by the decoder
//! and the kind of control a packet refers to.

use serde::{Deserialize, Serialize};

/// Kind of control addressed by a packet. Button and axis addresses are
/// separate numeric domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Button,
    Axis,
}

/// Axis value change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisChanged {
    /// Axis address
    pub address: u8,

    /// New signed value
    pub value: i16,
}

/// Button state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonChanged {
    /// Button address
    pub address: u8,

    /// New pressed state
    pub pressed: bool,
}

/// Either notification, as delivered to channel subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GamepadEvent {
    AxisChanged(AxisChanged),
    ButtonChanged(ButtonChanged),
}

impl GamepadEvent {
    /// Address of the control that changed
    pub fn address(&self) -> u8 {
        match self {
            GamepadEvent::AxisChanged(e) => e.address,
            GamepadEvent::ButtonChanged(e) => e.address,
        }
    }

    /// Kind of control that changed
    pub fn kind(&self) -> ControlKind {
        match self {
            GamepadEvent::AxisChanged(_) => ControlKind::Axis,
            GamepadEvent::ButtonChanged(_) => ControlKind::Button,
        }
    }
}

impl From<AxisChanged> for GamepadEvent {
    fn from(event: AxisChanged) -> Self {
        GamepadEvent::AxisChanged(event)
    }
}

impl From<ButtonChanged> for GamepadEvent {
    fn from(event: ButtonChanged) -> Self {
        GamepadEvent::ButtonChanged(event)
    }
}
