// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Local entry point of a node.
//!
//! A [`Gateway`] ties together the device registry, the adaptability engine,
//! the drivers hosted on this node and the inbound server. Application code
//! subscribes to remote events through it and uses it to reach other
//! devices.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use ubiqlink::{Device, Gateway, GatewayConfig};
//! use ubiqlink::engine::ListenerHandle;
//! use ubiqlink::message::Notify;
//!
//! # async fn example() -> ubiqlink::Result<()> {
//! let gateway = Gateway::new(GatewayConfig::new("kitchen-node"));
//! let _server = gateway.serve().await?;
//!
//! let thermostat = Device::new("thermostat").with_network_interface("192.168.1.30", "Ethernet:TCP");
//! gateway.device_registry().register(thermostat.clone());
//!
//! let listener: ListenerHandle = Arc::new(|notify: &Notify| {
//!     println!("temperature changed: {:?}", notify.parameter("value"));
//! });
//! gateway
//!     .register(&listener, &thermostat, "org.example.Thermostat", "TEMPERATURE_CHANGED")
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod messenger;

pub use config::GatewayConfig;
pub use messenger::Messenger;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::device::{Device, DeviceRegistry};
use crate::driver::DriverTable;
use crate::engine::{AdaptabilityEngine, ListenerHandle};
use crate::error::Result;
use crate::message::{Call, Notify, Parameters, Response};
use crate::transport::{CallHandler, NotifyHandler, Server, ServerHandle, TcpTransport, Transport};

/// A node's handle on the middleware.
///
/// Every gateway owns its own registry, engine and drivers; several
/// gateways in one process do not share state.
pub struct Gateway<T: Transport = TcpTransport> {
    config: GatewayConfig,
    current_device: RwLock<Device>,
    registry: Arc<DeviceRegistry>,
    messenger: Arc<Messenger<T>>,
    engine: AdaptabilityEngine<T>,
    drivers: Arc<DriverTable>,
}

impl Gateway {
    /// Creates a gateway speaking TCP.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        let transport = TcpTransport::new().with_connect_timeout(config.connect_timeout());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Gateway<T> {
    /// Creates a gateway over a custom transport.
    ///
    /// The local device is registered under the configured name with the
    /// configured interfaces.
    #[must_use]
    pub fn with_transport(config: GatewayConfig, transport: T) -> Self {
        let mut device = Device::new(config.device_name());
        for interface in config.interfaces() {
            device.add_network_interface(interface.address(), interface.network_type());
        }

        let registry = Arc::new(DeviceRegistry::new());
        registry.register(device.clone());

        let messenger = Arc::new(Messenger::new(
            transport,
            Arc::clone(&registry),
            config.poll_policy(),
        ));
        let engine = AdaptabilityEngine::new(Arc::clone(&messenger));

        tracing::debug!(
            device = %device.name(),
            network_type = %messenger.transport().network_type(),
            "Gateway created"
        );

        Self {
            config,
            current_device: RwLock::new(device),
            registry,
            messenger,
            engine,
            drivers: Arc::new(DriverTable::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the descriptor of the local device.
    #[must_use]
    pub fn current_device(&self) -> Device {
        self.current_device.read().clone()
    }

    #[must_use]
    pub fn device_registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn engine(&self) -> &AdaptabilityEngine<T> {
        &self.engine
    }

    /// Returns the drivers hosted on this node.
    #[must_use]
    pub fn drivers(&self) -> &Arc<DriverTable> {
        &self.drivers
    }

    /// Subscribes `listener` to `event_key` of `driver` on `device`.
    ///
    /// The driver is contacted only for the first listener of a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is unknown or unreachable, or if the
    /// driver rejects the subscription.
    pub async fn register(
        &self,
        listener: &ListenerHandle,
        device: &Device,
        driver: &str,
        event_key: &str,
    ) -> Result<()> {
        self.engine
            .register(listener, device, driver, event_key)
            .await
    }

    /// Like [`register`](Self::register), passing `parameters` to the driver.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub async fn register_with_parameters(
        &self,
        listener: &ListenerHandle,
        device: &Device,
        driver: &str,
        event_key: &str,
        parameters: Parameters,
    ) -> Result<()> {
        self.engine
            .register_with_parameters(listener, device, driver, event_key, parameters)
            .await
    }

    /// Removes `listener` from a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the unregister call for the last listener fails.
    pub async fn unregister(
        &self,
        listener: &ListenerHandle,
        device: &Device,
        driver: &str,
        parameters: Option<Parameters>,
        event_key: &str,
    ) -> Result<()> {
        self.engine
            .unregister(listener, device, driver, parameters, event_key)
            .await
    }

    /// Removes `listener` from every subscription.
    ///
    /// # Errors
    ///
    /// Returns the first failed unregister call.
    pub async fn unregister_all(&self, listener: &ListenerHandle) -> Result<()> {
        self.engine.unregister_all(listener).await
    }

    /// Sends `call` to `device` and waits for its reply.
    ///
    /// Returns `Ok(None)` if the device did not answer in time.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be resolved or reached, or if
    /// its reply is not a response.
    pub async fn call_service(&self, device: &Device, call: &Call) -> Result<Option<Response>> {
        self.messenger.call_device(device.name(), call).await
    }

    /// Sends `notify` to `device` without waiting for a reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be resolved or reached.
    pub async fn notify(&self, notify: &Notify, device: &Device) -> Result<()> {
        let interface = self.messenger.resolve(device.name())?;
        self.messenger.notify(&interface, notify).await
    }

    /// Starts the inbound server on the configured listen address.
    ///
    /// Inbound notifies are dispatched to this gateway's listeners and
    /// inbound calls are answered by its drivers. If the local device has no
    /// interface for this transport, the bound address is advertised, with
    /// loopback standing in for an unspecified address.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the address cannot be bound.
    pub async fn serve(&self) -> Result<ServerHandle> {
        let notifies: Arc<dyn NotifyHandler> = self.engine.table().clone();
        let calls: Arc<dyn CallHandler> = self.drivers.clone();
        let handle = Server::bind(self.config.listen_address(), notifies, calls).await?;

        let network_type = self.messenger.transport().network_type();
        let advertised = {
            let mut device = self.current_device.write();
            if device.interface_for(network_type).is_none() {
                let address = advertised_address(handle.local_addr());
                device.add_network_interface(address.to_string(), network_type);
                Some(device.clone())
            } else {
                None
            }
        };
        if let Some(device) = advertised {
            self.registry.register(device);
        }

        tracing::debug!(
            device = %self.config.device_name(),
            local_addr = %handle.local_addr(),
            "Gateway serving"
        );
        Ok(handle)
    }
}

impl<T: Transport> std::fmt::Debug for Gateway<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("device", &self.config.device_name())
            .field("engine", &self.engine)
            .field("drivers", &self.drivers)
            .finish_non_exhaustive()
    }
}

fn advertised_address(bound: SocketAddr) -> SocketAddr {
    let ip = match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, bound.port())
}
