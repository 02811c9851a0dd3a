// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device and network interface descriptors.

use std::fmt;

/// One way of reaching a device: an address plus the network type that
/// understands it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkInterface {
    address: String,
    network_type: String,
}

impl NetworkInterface {
    /// Creates an interface descriptor, e.g. `("127.0.0.1", "Ethernet:TCP")`.
    #[must_use]
    pub fn new(address: impl Into<String>, network_type: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            network_type: network_type.into(),
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn network_type(&self) -> &str {
        &self.network_type
    }
}

impl fmt::Display for NetworkInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.network_type)
    }
}

/// A network-addressable node, identified by name.
///
/// Interfaces are kept in insertion order; the first one matching a
/// transport is the one used to reach the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    name: String,
    networks: Vec<NetworkInterface>,
}

impl Device {
    /// Creates a device with no interfaces.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            networks: Vec::new(),
        }
    }

    /// Builder-style variant of [`add_network_interface`](Self::add_network_interface).
    #[must_use]
    pub fn with_network_interface(
        mut self,
        address: impl Into<String>,
        network_type: impl Into<String>,
    ) -> Self {
        self.add_network_interface(address, network_type);
        self
    }

    /// Appends an interface; an identical descriptor is not added twice.
    pub fn add_network_interface(
        &mut self,
        address: impl Into<String>,
        network_type: impl Into<String>,
    ) {
        let interface = NetworkInterface::new(address, network_type);
        if !self.networks.contains(&interface) {
            self.networks.push(interface);
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn networks(&self) -> &[NetworkInterface] {
        &self.networks
    }

    /// Returns the first interface of the given network type.
    #[must_use]
    pub fn interface_for(&self, network_type: &str) -> Option<&NetworkInterface> {
        self.networks
            .iter()
            .find(|interface| interface.network_type == network_type)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
