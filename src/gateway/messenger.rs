// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request/response exchange over a transport.

use std::sync::Arc;

use crate::device::{DeviceRegistry, NetworkInterface};
use crate::error::{Error, Result};
use crate::message::{self, Call, Message, Notify, Response};
use crate::transport::{PollPolicy, Transport};

/// Sends messages to devices and collects their replies.
///
/// Each exchange opens its own connection and closes it when done.
#[derive(Debug)]
pub struct Messenger<T> {
    transport: T,
    registry: Arc<DeviceRegistry>,
    poll: PollPolicy,
}

impl<T: Transport> Messenger<T> {
    /// Creates a messenger resolving devices through `registry`.
    #[must_use]
    pub fn new(transport: T, registry: Arc<DeviceRegistry>, poll: PollPolicy) -> Self {
        Self {
            transport,
            registry,
            poll,
        }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Resolves a device to an interface this transport can reach.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDevice`](crate::Error::UnknownDevice) or
    /// [`Error::NoCompatibleInterface`](crate::Error::NoCompatibleInterface).
    pub fn resolve(&self, device: &str) -> Result<NetworkInterface> {
        self.registry.resolve(device, self.transport.network_type())
    }

    /// Sends `call` to `interface` and waits for the reply.
    ///
    /// Returns `Ok(None)` if no reply arrived within the poll window.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the call could not be delivered,
    /// [`Error::ReplyLost`] if the connection failed after the call was
    /// sent, or a decode error if the reply is not a response.
    pub async fn call(
        &self,
        interface: &NetworkInterface,
        call: &Call,
    ) -> Result<Option<Response>> {
        let mut connection = self.transport.connect(interface.address()).await?;

        tracing::debug!(
            peer = %connection.peer(),
            driver = %call.driver(),
            service = %call.service(),
            "Sending call"
        );
        connection.send(&Message::Call(call.clone())).await?;

        let frame = match connection.poll_frame(&self.poll).await {
            Ok(frame) => frame,
            Err(Error::Connection(source)) => {
                return Err(Error::ReplyLost {
                    peer: connection.peer().to_string(),
                    source,
                });
            }
            Err(err) => return Err(err),
        };
        // The reply, if any, has been read; a failed close changes nothing.
        let _ = connection.shutdown().await;

        let Some(frame) = frame else {
            tracing::debug!(
                driver = %call.driver(),
                service = %call.service(),
                "No response within read window"
            );
            return Ok(None);
        };

        let response = message::decode(&frame)?.into_response()?;
        Ok(Some(response))
    }

    /// Resolves `device` and sends `call` to it.
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve) and [`call`](Self::call).
    pub async fn call_device(&self, device: &str, call: &Call) -> Result<Option<Response>> {
        let interface = self.resolve(device)?;
        self.call(&interface, call).await
    }

    /// Sends `notify` to `interface` without waiting for a reply.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the peer cannot be reached.
    pub async fn notify(&self, interface: &NetworkInterface, notify: &Notify) -> Result<()> {
        let mut connection = self.transport.connect(interface.address()).await?;
        tracing::debug!(
            peer = %connection.peer(),
            event_key = %notify.event_key(),
            "Sending notify"
        );
        connection.send(&Message::Notify(notify.clone())).await?;
        connection.shutdown().await?;
        Ok(())
    }
}
