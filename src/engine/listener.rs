// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listener contract.

use std::sync::Arc;

use crate::message::Notify;

/// Callback invoked when a matching notify arrives.
///
/// Listeners run on the task that read the notify from the network, so they
/// should return quickly; spawn a task for anything slow. Closures taking a
/// `&Notify` implement this trait.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use ubiqlink::engine::ListenerHandle;
/// use ubiqlink::message::Notify;
///
/// let listener: ListenerHandle = Arc::new(|notify: &Notify| {
///     println!("event {}", notify.event_key());
/// });
/// listener.on_event(&Notify::new("DOOR_OPENED"));
/// ```
pub trait EventListener: Send + Sync {
    /// Handles one delivered notify.
    fn on_event(&self, notify: &Notify);
}

impl<F> EventListener for F
where
    F: Fn(&Notify) + Send + Sync,
{
    fn on_event(&self, notify: &Notify) {
        self(notify);
    }
}

/// Shared handle to a listener.
///
/// The engine compares handles by pointer: the same `Arc` registered twice
/// for a key is one listener, two separately allocated listeners are two.
pub type ListenerHandle = Arc<dyn EventListener>;

/// Returns `true` if both handles point at the same listener.
pub(crate) fn same_listener(a: &ListenerHandle, b: &ListenerHandle) -> bool {
    Arc::ptr_eq(a, b)
}
