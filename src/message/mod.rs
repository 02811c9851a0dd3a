// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire messages exchanged between devices.
//!
//! Three envelope shapes share a single line stream:
//!
//! - [`Call`] - invokes a service on a driver and expects a [`Response`]
//! - [`Notify`] - asynchronous event addressed by event key, no reply
//! - [`Response`] - the reply to a call, possibly carrying an error
//!
//! Each message is serialized as one compact JSON object tagged by a `type`
//! field and terminated by a single `\n` on the wire.
//!
//! # Examples
//!
//! ```
//! use ubiqlink::message::{self, Message, Notify};
//!
//! let frame = message::encode(&Message::Notify(Notify::new("TEST_EVENT_KEY"))).unwrap();
//! assert!(!frame.contains('\n'));
//!
//! let decoded = message::decode(&frame).unwrap();
//! assert_eq!(decoded, Message::Notify(Notify::new("TEST_EVENT_KEY")));
//! ```

mod call;
mod notify;
mod response;

pub use call::Call;
pub use notify::Notify;
pub use response::Response;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Parameter map carried by calls, notifies and responses.
pub type Parameters = HashMap<String, serde_json::Value>;

/// Service a client invokes on a driver to subscribe to one of its events.
pub const REGISTER_LISTENER_SERVICE: &str = "registerListener";

/// Service a client invokes on a driver to drop an event subscription.
pub const UNREGISTER_LISTENER_SERVICE: &str = "unregisterListener";

/// Call parameter naming the event a (un)register call is about.
pub const EVENT_KEY_PARAMETER: &str = "eventKey";

/// A message as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// A service invocation.
    #[serde(rename = "SERVICE_CALL_REQUEST")]
    Call(Call),
    /// An asynchronous event.
    #[serde(rename = "NOTIFY")]
    Notify(Notify),
    /// The reply to a call.
    #[serde(rename = "SERVICE_CALL_RESPONSE")]
    Response(Response),
}

impl Message {
    /// Returns a short name for the message kind, used in logs and errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Call(_) => "call",
            Self::Notify(_) => "notify",
            Self::Response(_) => "response",
        }
    }

    /// Unwraps a response.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedMessage`] for any other kind.
    pub fn into_response(self) -> Result<Response, DecodeError> {
        match self {
            Self::Response(response) => Ok(response),
            other => Err(DecodeError::UnexpectedMessage {
                expected: "response",
                actual: other.kind(),
            }),
        }
    }
}

impl From<Call> for Message {
    fn from(call: Call) -> Self {
        Self::Call(call)
    }
}

impl From<Notify> for Message {
    fn from(notify: Notify) -> Self {
        Self::Notify(notify)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

/// Serializes a message into a single frame, without the trailing newline.
///
/// Compact JSON escapes control characters inside strings, so the frame
/// never contains a raw newline.
///
/// # Errors
///
/// Returns the serializer error if the message cannot be represented as
/// JSON.
pub fn encode(message: &Message) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

/// Parses one frame into a message.
///
/// Surrounding whitespace (including a trailing `\r`) is ignored.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] if the frame is not a valid message.
pub fn decode(frame: &str) -> Result<Message, DecodeError> {
    serde_json::from_str(frame.trim()).map_err(Into::into)
}
