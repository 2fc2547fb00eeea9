//! Capability registry and device state store
//!
//! Addresses are discovered from Configuration packets and never removed.
//! Registration seeds the stored value (`false` for buttons, `0` for axes);
//! after that the stored value is the last value observed for the address.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Known controls and their last observed values
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    buttons: BTreeMap<u8, bool>,
    axes: BTreeMap<u8, i16>,
}

impl DeviceState {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a button address. Returns true if it was not known before.
    pub fn register_if_new_button(&mut self, address: u8) -> bool {
        if self.buttons.contains_key(&address) {
            return false;
        }
        self.buttons.insert(address, false);
        true
    }

    /// Register an axis address. Returns true if it was not known before.
    pub fn register_if_new_axis(&mut self, address: u8) -> bool {
        if self.axes.contains_key(&address) {
            return false;
        }
        self.axes.insert(address, 0);
        true
    }

    pub fn get_button(&self, address: u8) -> Option<bool> {
        self.buttons.get(&address).copied()
    }

    pub fn get_axis(&self, address: u8) -> Option<i16> {
        self.axes.get(&address).copied()
    }

    /// Overwrite a button value. Callers diff against `get_button` first.
    pub fn set_button(&mut self, address: u8, pressed: bool) {
        self.buttons.insert(address, pressed);
    }

    /// Overwrite an axis value. Callers diff against `get_axis` first.
    pub fn set_axis(&mut self, address: u8, value: i16) {
        self.axes.insert(address, value);
    }

    pub fn button_count(&self) -> usize {
        self.buttons.len()
    }

    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    /// Copy of the button map
    pub fn buttons(&self) -> BTreeMap<u8, bool> {
        self.buttons.clone()
    }

    /// Copy of the axis map
    pub fn axes(&self) -> BTreeMap<u8, i16> {
        self.axes.clone()
    }

    /// Owned copy of both maps
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            buttons: self.buttons.clone(),
            axes: self.axes.clone(),
        }
    }
}

/// Owned, read-only view of every known control at one point in time.
///
/// Both maps are copied together, so a single snapshot is consistent across
/// buttons and axes. It does not track later packets; take a new one to refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Button address -> pressed
    pub buttons: BTreeMap<u8, bool>,

    /// Axis address -> value
    pub axes: BTreeMap<u8, i16>,
}

impl Snapshot {
    #[inline]
    pub fn button(&self, address: u8) -> Option<bool> {
        self.buttons.get(&address).copied()
    }

    #[inline]
    pub fn axis(&self, address: u8) -> Option<i16> {
        self.axes.get(&address).copied()
    }

    /// Iterate addresses of pressed buttons
    pub fn pressed_buttons(&self) -> impl Iterator<Item = u8> + '_ {
        self.buttons
            .iter()
            .filter(|(_, pressed)| **pressed)
            .map(|(address, _)| *address)
    }
}
