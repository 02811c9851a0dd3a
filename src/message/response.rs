// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Service response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Parameters;

/// The reply to a [`Call`](super::Call).
///
/// A caller that received no frame within its read window gets no
/// `Response` at all; an empty `Response` means the driver answered with
/// nothing to report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    response_data: Parameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Response {
    /// Creates an empty, successful response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a response reporting a failure.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            response_data: Parameters::new(),
            error: Some(message.into()),
        }
    }

    /// Adds a result value.
    #[must_use]
    pub fn with_data(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.response_data.insert(name.into(), value.into());
        self
    }

    /// Returns the result values.
    #[must_use]
    pub fn data(&self) -> &Parameters {
        &self.response_data
    }

    /// Returns one result value.
    #[must_use]
    pub fn data_value(&self, name: &str) -> Option<&Value> {
        self.response_data.get(name)
    }

    /// Returns the error text, if the driver reported one.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns `true` if the driver reported an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
