//! Gamepad-decoder: Linux joystick event stream decoder
//!
//! This library reads fixed-size joystick packets from a byte stream on a
//! background thread, tracks the state of every button and axis the device
//! declares, and notifies observers whenever a value changes.

pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod joystick;

// Re-export commonly used items
pub use config::{Config, ControllerSettings};
pub use decoder::{DecoderError, GamepadDecoder, LoopState, ReadLoopError};
pub use dispatch::{EventLogger, EventRecorder, GamepadObserver, SubscriptionId};
pub use joystick::{AxisChanged, ButtonChanged, ChannelSource, GamepadEvent, Packet, PacketSource, Snapshot};
