// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Locally hosted drivers.
//!
//! A driver answers the calls other nodes send to it, including the
//! `registerListener` / `unregisterListener` calls of remote subscribers.
//! Drivers are looked up by the `driver` field of the inbound call.
//!
//! # Examples
//!
//! ```
//! use ubiqlink::driver::DriverTable;
//! use ubiqlink::message::{Call, Response};
//! use ubiqlink::transport::CallHandler;
//!
//! let drivers = DriverTable::new();
//! drivers.deploy("org.example.Echo", |call: &Call| {
//!     Response::new().with_data("service", call.service())
//! });
//!
//! let reply = drivers.handle_call(&Call::new("org.example.Echo", "ping"));
//! assert!(!reply.is_error());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::message::{Call, Response};
use crate::transport::CallHandler;

/// A capability provider answering calls.
pub trait Driver: Send + Sync {
    /// Answers one call; errors are reported through [`Response::error`].
    fn handle(&self, call: &Call) -> Response;
}

impl<F> Driver for F
where
    F: Fn(&Call) -> Response + Send + Sync,
{
    fn handle(&self, call: &Call) -> Response {
        self(call)
    }
}

/// Drivers deployed on this node, keyed by driver name.
#[derive(Default)]
pub struct DriverTable {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
}

impl DriverTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploys `driver` under `name`, replacing any previous deployment.
    pub fn deploy(&self, name: impl Into<String>, driver: impl Driver + 'static) {
        self.deploy_shared(name, Arc::new(driver));
    }

    /// Deploys a driver the caller keeps a handle to.
    pub fn deploy_shared(&self, name: impl Into<String>, driver: Arc<dyn Driver>) {
        let name = name.into();
        tracing::debug!(driver = %name, "Deploying driver");
        self.drivers.write().insert(name, driver);
    }

    /// Removes a driver. Returns `true` if it was deployed.
    pub fn undeploy(&self, name: &str) -> bool {
        self.drivers.write().remove(name).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.read().get(name).cloned()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.drivers.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.drivers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drivers.read().is_empty()
    }
}

impl CallHandler for DriverTable {
    fn handle_call(&self, call: &Call) -> Response {
        let Some(driver) = self.get(call.driver()) else {
            tracing::debug!(driver = %call.driver(), service = %call.service(), "Unknown driver");
            return Response::error(format!("driver '{}' not found", call.driver()));
        };

        match catch_unwind(AssertUnwindSafe(|| driver.handle(call))) {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(driver = %call.driver(), service = %call.service(), "Driver panicked");
                Response::error(format!(
                    "driver '{}' failed on '{}'",
                    call.driver(),
                    call.service()
                ))
            }
        }
    }
}

impl fmt::Debug for DriverTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverTable")
            .field("drivers", &self.names())
            .finish()
    }
}
