// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event subscriptions and notify dispatch.
//!
//! # Overview
//!
//! - [`EventListener`] - the callback contract application code implements
//! - [`SubscriptionKey`] - `(device, driver, event key)` identity of a subscription
//! - [`SubscriptionTable`] - listener sets per key, and notify dispatch
//! - [`AdaptabilityEngine`] - register/unregister semantics on top of the table
//!
//! # Lifecycle of a key
//!
//! ```text
//!            register (first listener) → registerListener call
//!   Absent ─────────────────────────────────────────────────► Active
//!     ▲                                                        │  ▲
//!     │   unregister (last listener) → unregisterListener call  │  │ register / unregister
//!     └────────────────────────────────────────────────────────┘  │ (other listeners, no call)
//!                                                                  └──┘
//! ```

mod adaptability;
mod listener;
mod subscription;

pub use adaptability::AdaptabilityEngine;
pub use listener::{EventListener, ListenerHandle};
pub use subscription::{SubscriptionKey, SubscriptionTable};
