// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry of known devices.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{Error, Result};

use super::{Device, NetworkInterface};

/// Maps device names to their descriptors.
///
/// Lookups vastly outnumber registrations, so the map sits behind a
/// `parking_lot::RwLock`. Entries never expire; registering a device under
/// an existing name replaces the stored descriptor.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Device>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a device, replacing any previous entry with the same name.
    pub fn register(&self, device: Device) {
        tracing::debug!(
            device = %device.name(),
            interfaces = device.networks().len(),
            "Registering device"
        );
        self.devices
            .write()
            .insert(device.name().to_string(), device);
    }

    /// Removes a device. Returns `true` if it was registered.
    pub fn remove(&self, name: &str) -> bool {
        self.devices.write().remove(name).is_some()
    }

    /// Returns a copy of a registered device.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Device> {
        self.devices.read().get(name).cloned()
    }

    /// Returns `true` if a device with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.devices.read().contains_key(name)
    }

    /// Resolves a device to the first interface of `network_type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDevice`] if no device is registered under
    /// `name`, or [`Error::NoCompatibleInterface`] if none of its interfaces
    /// is of `network_type`.
    pub fn resolve(&self, name: &str, network_type: &str) -> Result<NetworkInterface> {
        let devices = self.devices.read();
        let device = devices
            .get(name)
            .ok_or_else(|| Error::UnknownDevice(name.to_string()))?;

        device
            .interface_for(network_type)
            .cloned()
            .ok_or_else(|| Error::NoCompatibleInterface {
                device: name.to_string(),
                network_type: network_type.to_string(),
            })
    }

    /// Returns the names of all registered devices.
    #[must_use]
    pub fn device_names(&self) -> Vec<String> {
        self.devices.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}
