// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Devices and the registry that resolves them to network addresses.
//!
//! # Examples
//!
//! ```
//! use ubiqlink::device::{Device, DeviceRegistry};
//!
//! let registry = DeviceRegistry::new();
//!
//! let mut device = Device::new("DummyDevice");
//! device.add_network_interface("127.0.0.1", "Ethernet:TCP");
//! registry.register(device);
//!
//! let interface = registry.resolve("DummyDevice", "Ethernet:TCP").unwrap();
//! assert_eq!(interface.address(), "127.0.0.1");
//! ```

mod descriptor;
mod registry;

pub use descriptor::{Device, NetworkInterface};
pub use registry::DeviceRegistry;
