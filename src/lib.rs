// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ubiqlink - device-to-device middleware for ubiquitous computing nodes.
//!
//! Nodes exchange newline-delimited JSON envelopes over a pluggable
//! transport (TCP by default). A node can call services of drivers hosted
//! on other nodes and subscribe to the events those drivers emit.
//!
//! # Building blocks
//!
//! - [`message`]: the `Call` / `Notify` / `Response` envelopes and their
//!   wire encoding
//! - [`transport`]: the [`Transport`](transport::Transport) seam, framed
//!   connections with bounded reads, and the inbound server
//! - [`device`]: device descriptors and the name to interface registry
//! - [`engine`]: subscription bookkeeping and notify dispatch
//! - [`driver`]: capability providers hosted on this node
//! - [`Gateway`]: the local API tying everything together
//!
//! # Subscribing to a remote event
//!
//! Registering the first listener for an event sends one
//! `registerListener` call to the remote driver; further listeners for the
//! same event are tracked locally. The driver then pushes `Notify` envelopes
//! to this node's server, which hands them to every matching listener.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ubiqlink::{Device, Gateway, GatewayConfig};
//! use ubiqlink::engine::ListenerHandle;
//! use ubiqlink::message::Notify;
//!
//! #[tokio::main]
//! async fn main() -> ubiqlink::Result<()> {
//!     let gateway = Gateway::new(GatewayConfig::new("hallway-node"));
//!     let _server = gateway.serve().await?;
//!
//!     let door = Device::new("front-door").with_network_interface("192.168.1.40", "Ethernet:TCP");
//!     gateway.device_registry().register(door.clone());
//!
//!     let listener: ListenerHandle = Arc::new(|notify: &Notify| {
//!         println!("{} from {:?}", notify.event_key(), notify.driver());
//!     });
//!     gateway
//!         .register(&listener, &door, "org.example.DoorDriver", "DOOR_OPENED")
//!         .await?;
//!
//!     // ... later
//!     gateway.unregister_all(&listener).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Hosting a driver
//!
//! ```no_run
//! use ubiqlink::{Gateway, GatewayConfig};
//! use ubiqlink::message::{Call, Response};
//!
//! # async fn example() -> ubiqlink::Result<()> {
//! let gateway = Gateway::new(GatewayConfig::new("lamp-node"));
//! gateway.drivers().deploy("org.example.Lamp", |call: &Call| match call.service() {
//!     "turnOn" => Response::new().with_data("state", "on"),
//!     other => Response::error(format!("unknown service {other}")),
//! });
//! let _server = gateway.serve().await?;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod driver;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod message;
pub mod transport;

pub use device::{Device, DeviceRegistry, NetworkInterface};
pub use driver::{Driver, DriverTable};
pub use engine::{AdaptabilityEngine, EventListener, ListenerHandle, SubscriptionKey};
pub use error::{ConnectionError, DecodeError, Error, Result};
pub use gateway::{Gateway, GatewayConfig};
pub use message::{Call, Message, Notify, Parameters, Response};
pub use transport::{PollPolicy, TcpTransport, Transport};
