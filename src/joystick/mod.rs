//! Linux joystick stream support
//!
//! This module provides the pieces the decoder is built from:
//! - Packet layout constants and flag bits
//! - Stateless packet decoding
//! - Capability registry and device state store
//! - Byte-stream sources

pub mod constants;
pub mod types;
pub mod packet;
pub mod state;
pub mod source;

// Re-export commonly used items
pub use constants::*;
pub use types::*;
pub use packet::*;
pub use state::*;
pub use source::*;
