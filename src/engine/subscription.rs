// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription table and notify dispatch.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use parking_lot::RwLock;

use crate::message::Notify;
use crate::transport::NotifyHandler;

use super::listener::{ListenerHandle, same_listener};

/// Identity of a subscription: one event stream of one driver on one device.
///
/// Event keys are only unique per `(device, driver)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    device: String,
    driver: String,
    event_key: String,
}

impl SubscriptionKey {
    #[must_use]
    pub fn new(
        device: impl Into<String>,
        driver: impl Into<String>,
        event_key: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            driver: driver.into(),
            event_key: event_key.into(),
        }
    }

    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    #[must_use]
    pub fn driver(&self) -> &str {
        &self.driver
    }

    #[must_use]
    pub fn event_key(&self) -> &str {
        &self.event_key
    }

    /// Returns `true` if `notify` is addressed to this subscription.
    ///
    /// A notify without a driver matches on event key alone.
    #[must_use]
    pub fn matches(&self, notify: &Notify) -> bool {
        self.event_key == notify.event_key()
            && notify.driver().is_none_or(|driver| driver == self.driver)
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.device, self.driver, self.event_key)
    }
}

/// Result of adding a listener to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Insertion {
    /// The key was absent; a new entry holds only this listener.
    Created,
    /// The listener joined an existing entry.
    Joined,
    /// The listener was already part of the entry.
    AlreadyPresent,
}

/// Result of removing a listener from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    /// The key or the listener was not subscribed.
    NotSubscribed,
    /// The listener left; this many listeners remain.
    Remaining(usize),
    /// The listener was the last one and the entry is gone.
    Emptied,
}

/// Listener sets keyed by [`SubscriptionKey`].
///
/// Mutations and dispatch each hold the lock only long enough to touch the
/// map; listeners are invoked after it is released, so a slow listener never
/// stalls registrations and a listener may safely inspect the table.
#[derive(Default)]
pub struct SubscriptionTable {
    entries: RwLock<HashMap<SubscriptionKey, Vec<ListenerHandle>>>,
}

impl SubscriptionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, key: &SubscriptionKey, listener: &ListenerHandle) -> Insertion {
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            None => {
                entries.insert(key.clone(), vec![listener.clone()]);
                Insertion::Created
            }
            Some(listeners) if listeners.iter().any(|l| same_listener(l, listener)) => {
                Insertion::AlreadyPresent
            }
            Some(listeners) => {
                listeners.push(listener.clone());
                Insertion::Joined
            }
        }
    }

    pub(crate) fn remove(&self, key: &SubscriptionKey, listener: &ListenerHandle) -> Removal {
        let mut entries = self.entries.write();
        let Some(listeners) = entries.get_mut(key) else {
            return Removal::NotSubscribed;
        };

        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        if listeners.len() == before {
            return Removal::NotSubscribed;
        }
        if listeners.is_empty() {
            entries.remove(key);
            return Removal::Emptied;
        }
        Removal::Remaining(listeners.len())
    }

    /// Delivers `notify` to every listener of every matching entry.
    ///
    /// A listener subscribed under several matching keys is invoked once.
    /// A panicking listener is logged and skipped. Returns the number of
    /// listeners that handled the notify.
    pub fn dispatch(&self, notify: &Notify) -> usize {
        let targets: Vec<ListenerHandle> = {
            let entries = self.entries.read();
            let mut targets: Vec<ListenerHandle> = Vec::new();
            for listener in entries
                .iter()
                .filter(|(key, _)| key.matches(notify))
                .flat_map(|(_, listeners)| listeners)
            {
                if !targets.iter().any(|t| same_listener(t, listener)) {
                    targets.push(listener.clone());
                }
            }
            targets
        };

        if targets.is_empty() {
            tracing::trace!(
                event_key = %notify.event_key(),
                driver = ?notify.driver(),
                "No subscription for notify"
            );
            return 0;
        }

        tracing::debug!(
            event_key = %notify.event_key(),
            listeners = targets.len(),
            "Dispatching notify"
        );

        let mut delivered = 0;
        for listener in &targets {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(notify))).is_ok() {
                delivered += 1;
            } else {
                tracing::warn!(event_key = %notify.event_key(), "Listener panicked");
            }
        }
        delivered
    }

    /// Returns `true` if the key has an active entry.
    #[must_use]
    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Returns the number of listeners subscribed under `key`.
    #[must_use]
    pub fn listener_count(&self, key: &SubscriptionKey) -> usize {
        self.entries.read().get(key).map_or(0, Vec::len)
    }

    /// Returns every key `listener` is subscribed under.
    #[must_use]
    pub fn keys_for(&self, listener: &ListenerHandle) -> Vec<SubscriptionKey> {
        self.entries
            .read()
            .iter()
            .filter(|(_, listeners)| listeners.iter().any(|l| same_listener(l, listener)))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Returns all active keys.
    #[must_use]
    pub fn keys(&self) -> Vec<SubscriptionKey> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns the number of active entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl NotifyHandler for SubscriptionTable {
    fn handle_notify(&self, notify: &Notify) {
        self.dispatch(notify);
    }
}

impl fmt::Debug for SubscriptionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionTable")
            .field("entries", &self.len())
            .finish()
    }
}
