// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gateway configuration.

use std::time::Duration;

use crate::device::NetworkInterface;
use crate::transport::{PollPolicy, TcpTransport};

/// Configuration of a [`Gateway`](super::Gateway).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ubiqlink::GatewayConfig;
/// use ubiqlink::transport::PollPolicy;
///
/// let config = GatewayConfig::new("kitchen-node")
///     .with_listen_address("127.0.0.1:0")
///     .with_interface("192.168.1.20:14984", "Ethernet:TCP")
///     .with_poll_policy(PollPolicy::new(10, Duration::from_millis(50)));
///
/// assert_eq!(config.device_name(), "kitchen-node");
/// assert_eq!(config.interfaces().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    device_name: String,
    listen_address: String,
    interfaces: Vec<NetworkInterface>,
    poll: PollPolicy,
    connect_timeout: Duration,
}

impl GatewayConfig {
    /// Address the inbound server binds when none is configured.
    pub const DEFAULT_LISTEN_ADDRESS: &'static str = "0.0.0.0:14984";

    /// Creates a configuration for a local device called `device_name`.
    #[must_use]
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            listen_address: Self::DEFAULT_LISTEN_ADDRESS.to_string(),
            interfaces: Vec::new(),
            poll: PollPolicy::default(),
            connect_timeout: TcpTransport::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the address [`serve`](super::Gateway::serve) binds.
    #[must_use]
    pub fn with_listen_address(mut self, address: impl Into<String>) -> Self {
        self.listen_address = address.into();
        self
    }

    /// Adds an interface the local device advertises.
    #[must_use]
    pub fn with_interface(
        mut self,
        address: impl Into<String>,
        network_type: impl Into<String>,
    ) -> Self {
        let interface = NetworkInterface::new(address, network_type);
        if !self.interfaces.contains(&interface) {
            self.interfaces.push(interface);
        }
        self
    }

    /// Sets how long outgoing calls wait for a reply.
    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Sets the connect timeout of the default TCP transport.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    #[must_use]
    pub fn listen_address(&self) -> &str {
        &self.listen_address
    }

    #[must_use]
    pub fn interfaces(&self) -> &[NetworkInterface] {
        &self.interfaces
    }

    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for GatewayConfig {
    /// Uses a generated device name of the form `device-<uuid>`.
    fn default() -> Self {
        Self::new(format!("device-{}", uuid::Uuid::new_v4()))
    }
}
