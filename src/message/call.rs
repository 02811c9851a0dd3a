// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Service call envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EVENT_KEY_PARAMETER, Parameters};

/// A request to invoke `service` on `driver`.
///
/// # Examples
///
/// ```
/// use ubiqlink::message::Call;
///
/// let call = Call::new("org.example.EventDriver", "registerListener")
///     .with_parameter("eventKey", "TEST_EVENT_KEY");
///
/// assert_eq!(call.parameter("eventKey"), Some("TEST_EVENT_KEY"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    driver: String,
    service: String,
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    parameters: Parameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instance_id: Option<String>,
}

impl Call {
    /// Creates a call without parameters.
    #[must_use]
    pub fn new(driver: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            service: service.into(),
            parameters: Parameters::new(),
            instance_id: None,
        }
    }

    /// Adds or replaces a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Merges a set of parameters, replacing existing names.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Addresses a specific instance of the driver.
    #[must_use]
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Returns the target driver.
    #[must_use]
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Returns the invoked service.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Returns the driver instance, if one was addressed.
    #[must_use]
    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    /// Returns all parameters.
    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Returns a string parameter.
    ///
    /// Non-string values are reported as absent; use
    /// [`parameter_value`](Self::parameter_value) for those.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }

    /// Returns a parameter of any JSON type.
    #[must_use]
    pub fn parameter_value(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Returns the `eventKey` parameter of a (un)register call.
    #[must_use]
    pub fn event_key(&self) -> Option<&str> {
        self.parameter(EVENT_KEY_PARAMETER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_accessors() {
        let call = Call::new("Driver", "service")
            .with_parameter("name", "value")
            .with_parameter("count", 2);

        assert_eq!(call.parameter("name"), Some("value"));
        assert_eq!(call.parameter("count"), None);
        assert_eq!(call.parameter_value("count"), Some(&Value::from(2)));
        assert_eq!(call.parameter("missing"), None);
    }

    #[test]
    fn with_parameters_overrides_existing() {
        let mut extra = Parameters::new();
        extra.insert("eventKey".to_string(), Value::from("OTHER"));
        extra.insert("filter".to_string(), Value::from("all"));

        let call = Call::new("Driver", "service")
            .with_parameter("eventKey", "KEY")
            .with_parameters(extra);

        assert_eq!(call.event_key(), Some("OTHER"));
        assert_eq!(call.parameter("filter"), Some("all"));
    }

    #[test]
    fn instance_id_defaults_to_none() {
        let call = Call::new("Driver", "service");
        assert_eq!(call.instance_id(), None);
        assert_eq!(
            Call::new("Driver", "service")
                .with_instance_id("d1")
                .instance_id(),
            Some("d1")
        );
    }
}
