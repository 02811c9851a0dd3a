// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `ubiqlink` library.
//!
//! Failures fall into a few families: the transport could not reach a peer
//! ([`ConnectionError`]), a frame could not be encoded or decoded
//! ([`DecodeError`]), a call was sent but its reply was lost, or the request
//! could not be addressed at all (unknown device, no compatible interface).
//! A read window that closes without data is not an error; it is reported as
//! an absent [`Response`](crate::message::Response).

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not establish or use a connection.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// A received frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A message could not be serialized into a frame.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The call was sent but the connection failed while waiting for the
    /// reply; the peer may or may not have acted on it.
    #[error("reply from {peer} lost: {source}")]
    ReplyLost {
        /// The endpoint the call was sent to.
        peer: String,
        /// The failure seen while reading.
        #[source]
        source: ConnectionError,
    },

    /// The target device is not present in the device registry.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// The device is known but none of its interfaces matches the transport.
    #[error("device {device} has no {network_type} interface")]
    NoCompatibleInterface {
        /// The device that was looked up.
        device: String,
        /// The network type the transport speaks.
        network_type: String,
    },

    /// The remote driver answered the call with an error.
    #[error("{driver}.{service} rejected: {message}")]
    ServiceRejected {
        /// Driver the call was addressed to.
        driver: String,
        /// Service that was invoked.
        service: String,
        /// Error text carried by the response.
        message: String,
    },
}

/// Errors raised while connecting to or talking with a remote endpoint.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The remote host refused the connection or could not be reached.
    #[error("failed to connect to {address}: {source}")]
    Refused {
        /// The address that was dialed.
        address: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Connection establishment did not complete in time.
    #[error("connection to {address} timed out after {timeout_ms} ms")]
    Timeout {
        /// The address that was dialed.
        address: String,
        /// The connect timeout that elapsed.
        timeout_ms: u64,
    },

    /// The address could not be understood by the transport.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Reading from or writing to an established connection failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while decoding a frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not a valid message.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame decoded to a different message kind than expected.
    #[error("expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// The message kind the caller waited for.
        expected: &'static str,
        /// The message kind that arrived.
        actual: &'static str,
    },

    /// The frame contains bytes that are not valid UTF-8.
    #[error("frame is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A line is longer than the frame length limit.
    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge {
        /// The configured limit in bytes.
        limit: usize,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
