//! Joystick packet decoding
//!
//! Pure interpretation of a single 8-byte event packet. Every function here is
//! total: any byte pattern decodes without panicking, and unusual flag
//! combinations are resolved with the Button-before-Axis tie-break.

use crate::joystick::constants::*;
use crate::joystick::types::ControlKind;

/// One fixed-size event packet read from the device stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Packet([u8; PACKET_SIZE]);

impl From<[u8; PACKET_SIZE]> for Packet {
    fn from(bytes: [u8; PACKET_SIZE]) -> Self {
        Self(bytes)
    }
}

impl Packet {
    /// Build a synthetic packet from its flag byte, address and value
    pub fn encode(flags: u8, address: u8, value: i16) -> Self {
        let mut bytes = [0u8; PACKET_SIZE];
        bytes[VALUE_OFFSET..VALUE_OFFSET + 2].copy_from_slice(&value.to_le_bytes());
        bytes[INSTRUCTION_INDEX] = flags;
        bytes[ADDRESS_INDEX] = address;
        Self(bytes)
    }

    /// Live axis update
    pub fn axis(address: u8, value: i16) -> Self {
        Self::encode(Instruction::Axis.bits(), address, value)
    }

    /// Live button update
    pub fn button(address: u8, pressed: bool) -> Self {
        let value = if pressed { Instruction::Button.bits() as i16 } else { 0 };
        Self::encode(Instruction::Button.bits(), address, value)
    }

    /// Same packet with the Configuration flag added
    pub fn configured(mut self) -> Self {
        self.0[INSTRUCTION_INDEX] |= Instruction::Configuration.bits();
        self
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; PACKET_SIZE] {
        &self.0
    }

    /// Raw instruction byte
    pub fn instruction(&self) -> u8 {
        self.0[INSTRUCTION_INDEX]
    }

    /// True if the Configuration bit (0x80) is set
    pub fn has_configuration_flag(&self) -> bool {
        Instruction::Configuration.is_set_in(self.instruction())
    }

    /// True if the Button bit (0x01) is set
    pub fn is_button_packet(&self) -> bool {
        Instruction::Button.is_set_in(self.instruction())
    }

    /// True if the Axis bit (0x02) is set
    pub fn is_axis_packet(&self) -> bool {
        Instruction::Axis.is_set_in(self.instruction())
    }

    /// Pressed state of a button packet.
    ///
    /// Compares byte 4 for equality with the Button flag value (0x01) rather
    /// than testing a dedicated bit, so any other value reads as released.
    /// Byte 4 is also the low byte of the axis value; the two roles overlap.
    pub fn is_button_pressed(&self) -> bool {
        self.0[VALUE_OFFSET] == Instruction::Button.bits()
    }

    /// Button or axis address (byte 7)
    pub fn address(&self) -> u8 {
        self.0[ADDRESS_INDEX]
    }

    /// Signed little-endian axis value (bytes 4-5)
    pub fn axis_value(&self) -> i16 {
        i16::from_le_bytes([self.0[VALUE_OFFSET], self.0[VALUE_OFFSET + 1]])
    }

    /// Device timestamp in milliseconds (bytes 0-3)
    pub fn timestamp(&self) -> u32 {
        u32::from_le_bytes([
            self.0[TIMESTAMP_OFFSET],
            self.0[TIMESTAMP_OFFSET + 1],
            self.0[TIMESTAMP_OFFSET + 2],
            self.0[TIMESTAMP_OFFSET + 3],
        ])
    }

    /// Classify the packet, Button taking priority over Axis
    pub fn kind(&self) -> Option<ControlKind> {
        if self.is_button_packet() {
            Some(ControlKind::Button)
        } else if self.is_axis_packet() {
            Some(ControlKind::Axis)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_packet_round_trip() {
        let packet = Packet::axis(3, 300);
        assert!(packet.is_axis_packet());
        assert!(!packet.is_button_packet());
        assert!(!packet.has_configuration_flag());
        assert_eq!(packet.address(), 3);
        assert_eq!(packet.axis_value(), 300);
        assert_eq!(packet.as_bytes()[4..8], [0x2C, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_negative_axis_value() {
        let packet = Packet::from([0, 0, 0, 0, 0x01, 0x80, 0x02, 0x00]);
        assert_eq!(packet.axis_value(), i16::MIN + 1);

        let packet = Packet::from([0, 0, 0, 0, 0xFF, 0xFF, 0x02, 0x00]);
        assert_eq!(packet.axis_value(), -1);
    }

    #[test]
    fn test_configuration_flag_combines() {
        let packet = Packet::from([0, 0, 0, 0, 0x00, 0x00, 0x82, 0x03]);
        assert!(packet.has_configuration_flag());
        assert!(packet.is_axis_packet());
        assert!(!packet.is_button_packet());

        let packet = Packet::button(5, false).configured();
        assert_eq!(packet.instruction(), 0x81);
        assert!(packet.has_configuration_flag());
        assert!(packet.is_button_packet());
    }

    #[test]
    fn test_button_pressed_is_value_equality() {
        let pressed = Packet::from([0, 0, 0, 0, 0x01, 0x00, 0x01, 0x05]);
        assert!(pressed.is_button_pressed());

        let released = Packet::from([0, 0, 0, 0, 0x00, 0x00, 0x01, 0x05]);
        assert!(!released.is_button_pressed());

        // 0x03 has bit 0x01 set but is not equal to it
        let other = Packet::from([0, 0, 0, 0, 0x03, 0x00, 0x01, 0x05]);
        assert!(!other.is_button_pressed());

        assert!(Packet::button(5, true).is_button_pressed());
        assert!(!Packet::button(5, false).is_button_pressed());
    }

    #[test]
    fn test_kind_tie_break() {
        let both = Packet::encode(0x03, 1, 0);
        assert_eq!(both.kind(), Some(ControlKind::Button));

        let none = Packet::encode(0x00, 1, 0);
        assert_eq!(none.kind(), None);

        let config_only = Packet::encode(0x80, 1, 0);
        assert_eq!(config_only.kind(), None);
        assert!(config_only.has_configuration_flag());
    }

    #[test]
    fn test_any_byte_pattern_decodes() {
        for flags in 0..=u8::MAX {
            let packet = Packet::from([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, flags, 0xFF]);
            let _ = packet.kind();
            let _ = packet.is_button_pressed();
            let _ = packet.axis_value();
            assert_eq!(packet.address(), 0xFF);
        }
    }

    #[test]
    fn test_timestamp() {
        let packet = Packet::from([0x10, 0x27, 0x00, 0x00, 0, 0, 0x02, 0]);
        assert_eq!(packet.timestamp(), 10_000);
    }
}
