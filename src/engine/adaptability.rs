// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register/unregister semantics on top of the subscription table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::Device;
use crate::error::{Error, Result};
use crate::gateway::Messenger;
use crate::message::{
    Call, EVENT_KEY_PARAMETER, Notify, Parameters, REGISTER_LISTENER_SERVICE, Response,
    UNREGISTER_LISTENER_SERVICE,
};
use crate::transport::Transport;

use super::listener::ListenerHandle;
use super::subscription::{Removal, SubscriptionKey, SubscriptionTable};

/// Per-key async lock serializing register/unregister of one subscription.
type Gate = Arc<tokio::sync::Mutex<()>>;

/// Owner of the subscription table.
///
/// The remote driver is asked to register a subscription only when the first
/// listener for a key arrives, and to drop it only when the last one leaves.
/// Everything in between is local bookkeeping.
///
/// Registrations and unregistrations of the same key are serialized, and the
/// gate for a key is held across the network exchange. Dispatch never waits
/// on a gate, so inbound notifies are delivered while calls are in flight.
///
/// # Failure policy
///
/// - A first registration whose call cannot be delivered (connection error)
///   or that the driver rejects is rolled back and the error returned.
/// - A first registration that gets no reply within the poll window is kept.
/// - A first registration whose reply is lost or undecodable is kept, since
///   the driver may have acted on it, and the error returned.
/// - A last unregistration removes the entry before the call is sent; a
///   failed call is returned but the entry is not restored.
pub struct AdaptabilityEngine<T> {
    table: Arc<SubscriptionTable>,
    gates: Mutex<HashMap<SubscriptionKey, Gate>>,
    messenger: Arc<Messenger<T>>,
}

impl<T: Transport> AdaptabilityEngine<T> {
    /// Creates an engine with an empty table.
    #[must_use]
    pub fn new(messenger: Arc<Messenger<T>>) -> Self {
        Self {
            table: Arc::new(SubscriptionTable::new()),
            gates: Mutex::new(HashMap::new()),
            messenger,
        }
    }

    /// Returns the subscription table, e.g. to hand it to a
    /// [`Server`](crate::transport::Server) as notify handler.
    #[must_use]
    pub fn table(&self) -> &Arc<SubscriptionTable> {
        &self.table
    }

    /// Subscribes `listener` to `event_key` of `driver` on `device`.
    ///
    /// # Errors
    ///
    /// See [`register_with_parameters`](Self::register_with_parameters).
    pub async fn register(
        &self,
        listener: &ListenerHandle,
        device: &Device,
        driver: &str,
        event_key: &str,
    ) -> Result<()> {
        self.register_with_parameters(listener, device, driver, event_key, Parameters::new())
            .await
    }

    /// Subscribes `listener`, passing extra parameters to the driver.
    ///
    /// The parameters only travel with the register call sent for the first
    /// listener of a key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDevice`] before any state change or traffic if
    /// the device is not registered, a connection error if the register call
    /// could not be delivered, [`Error::ReplyLost`] or a decode error if its
    /// outcome is unknown, or [`Error::ServiceRejected`] if the driver
    /// answers with an error.
    pub async fn register_with_parameters(
        &self,
        listener: &ListenerHandle,
        device: &Device,
        driver: &str,
        event_key: &str,
        parameters: Parameters,
    ) -> Result<()> {
        let key = SubscriptionKey::new(device.name(), driver, event_key);
        let gate = self.gate(&key);
        let guard = gate.lock().await;

        let outcome = self.register_locked(&key, listener, parameters).await;

        self.release_gate(&key, &gate);
        drop(guard);
        outcome
    }

    async fn register_locked(
        &self,
        key: &SubscriptionKey,
        listener: &ListenerHandle,
        parameters: Parameters,
    ) -> Result<()> {
        if self.table.contains(key) {
            let insertion = self.table.add(key, listener);
            tracing::debug!(subscription = %key, ?insertion, "Subscription already active");
            return Ok(());
        }

        let interface = self.messenger.resolve(key.device())?;
        self.table.add(key, listener);
        tracing::debug!(subscription = %key, %interface, "Registering with driver");

        let call = event_call(REGISTER_LISTENER_SERVICE, key, parameters);
        match self.messenger.call(&interface, &call).await {
            Ok(Some(response)) if response.is_error() => {
                self.rollback(key, listener);
                Err(rejected(&call, &response))
            }
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                tracing::debug!(subscription = %key, "Register call not acknowledged");
                Ok(())
            }
            Err(err @ (Error::Connection(_) | Error::Encode(_))) => {
                self.rollback(key, listener);
                Err(err)
            }
            Err(err) => {
                tracing::debug!(
                    subscription = %key,
                    error = %err,
                    "Register outcome unknown, keeping subscription"
                );
                Err(err)
            }
        }
    }

    fn rollback(&self, key: &SubscriptionKey, listener: &ListenerHandle) {
        let removal = self.table.remove(key, listener);
        tracing::debug!(subscription = %key, ?removal, "Rolled back registration");
    }

    /// Removes `listener` from the subscription `(device, driver, event_key)`.
    ///
    /// When the last listener leaves, an unregister call carrying
    /// `parameters` is sent to the driver. Unregistering something that is
    /// not subscribed does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the unregister call fails or is rejected.
    pub async fn unregister(
        &self,
        listener: &ListenerHandle,
        device: &Device,
        driver: &str,
        parameters: Option<Parameters>,
        event_key: &str,
    ) -> Result<()> {
        let key = SubscriptionKey::new(device.name(), driver, event_key);
        self.unregister_key(&key, listener, parameters.unwrap_or_default())
            .await
    }

    /// Removes `listener` from every subscription it is part of.
    ///
    /// All entries are processed even if some unregister calls fail.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub async fn unregister_all(&self, listener: &ListenerHandle) -> Result<()> {
        let mut first_error = None;
        for key in self.table.keys_for(listener) {
            if let Err(err) = self.unregister_key(&key, listener, Parameters::new()).await {
                tracing::warn!(subscription = %key, error = %err, "Failed to unregister");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn unregister_key(
        &self,
        key: &SubscriptionKey,
        listener: &ListenerHandle,
        parameters: Parameters,
    ) -> Result<()> {
        let gate = self.gate(key);
        let guard = gate.lock().await;

        let outcome = match self.table.remove(key, listener) {
            Removal::NotSubscribed => {
                tracing::trace!(subscription = %key, "Listener not subscribed");
                Ok(())
            }
            Removal::Remaining(remaining) => {
                tracing::debug!(subscription = %key, remaining, "Listener removed");
                Ok(())
            }
            Removal::Emptied => {
                tracing::debug!(subscription = %key, "Unregistering from driver");
                let call = event_call(UNREGISTER_LISTENER_SERVICE, key, parameters);
                match self.messenger.call_device(key.device(), &call).await {
                    Ok(Some(response)) if response.is_error() => Err(rejected(&call, &response)),
                    Ok(_) => Ok(()),
                    Err(err) => Err(err),
                }
            }
        };

        self.release_gate(key, &gate);
        drop(guard);
        outcome
    }

    /// Delivers an inbound notify to matching listeners.
    pub fn dispatch(&self, notify: &Notify) -> usize {
        self.table.dispatch(notify)
    }

    /// Returns `true` if `key` has at least one listener.
    #[must_use]
    pub fn is_subscribed(&self, key: &SubscriptionKey) -> bool {
        self.table.contains(key)
    }

    fn gate(&self, key: &SubscriptionKey) -> Gate {
        Arc::clone(self.gates.lock().entry(key.clone()).or_default())
    }

    /// Drops the gate of a key that no longer has an entry.
    ///
    /// Called while the gate is held. A clone can only be taken under the
    /// `gates` lock, so a count of two (map plus caller) means nobody else is
    /// waiting on it.
    fn release_gate(&self, key: &SubscriptionKey, gate: &Gate) {
        let mut gates = self.gates.lock();
        if !self.table.contains(key) && Arc::strong_count(gate) == 2 {
            gates.remove(key);
        }
    }
}

impl<T> fmt::Debug for AdaptabilityEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptabilityEngine")
            .field("subscriptions", &self.table.len())
            .field("gates", &self.gates.lock().len())
            .finish_non_exhaustive()
    }
}

/// Builds a (un)register call; the event key always wins over a caller
/// parameter of the same name.
fn event_call(service: &str, key: &SubscriptionKey, parameters: Parameters) -> Call {
    Call::new(key.driver(), service)
        .with_parameters(parameters)
        .with_parameter(EVENT_KEY_PARAMETER, key.event_key())
}

fn rejected(call: &Call, response: &Response) -> Error {
    Error::ServiceRejected {
        driver: call.driver().to_string(),
        service: call.service().to_string(),
        message: response.error_message().unwrap_or_default().to_string(),
    }
}
