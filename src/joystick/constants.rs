//! Joystick protocol constants
//!
//! This module contains the constants for the Linux joystick event stream:
//! - Packet size and byte offsets
//! - Instruction flag bits
//! - Default device path and thread naming

// ============================================================================
// Packet Layout
// ============================================================================

/// Size of one event packet in bytes
pub const PACKET_SIZE: usize = 8;

/// Offset of the little-endian event timestamp (bytes 0-3)
pub const TIMESTAMP_OFFSET: usize = 0;

/// Offset of the little-endian value field (bytes 4-5)
/// Byte 4 doubles as the pressed marker for button packets
pub const VALUE_OFFSET: usize = 4;

/// Index of the instruction/flag byte
pub const INSTRUCTION_INDEX: usize = 6;

/// Index of the button or axis address
pub const ADDRESS_INDEX: usize = 7;

// ============================================================================
// Instruction Flags
// ============================================================================

/// Flag bits carried in the instruction byte. Bits are independent and may combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Instruction {
    /// Packet refers to a button
    Button = 0x01,
    /// Packet refers to an axis
    Axis = 0x02,
    /// Packet declares a control (initial state burst)
    Configuration = 0x80,
}

impl Instruction {
    /// Raw bit value of this flag
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Check whether this flag is set in the given instruction byte
    pub const fn is_set_in(self, value: u8) -> bool {
        value & self.bits() == self.bits()
    }
}

// ============================================================================
// Device Defaults
// ============================================================================

/// Device opened when no path is given
pub const DEFAULT_DEVICE_PATH: &str = "/dev/input/js0";

/// Name given to the background read loop thread
pub const DEFAULT_THREAD_NAME: &str = "gamepad-read-loop";

/// Default bound for channel subscribers
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;
