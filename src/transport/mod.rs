// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Byte-stream transports carrying line-framed messages.
//!
//! A [`Transport`] opens a [`Connection`] to a remote address. A connection
//! writes one frame per line and reads frames back with a bounded
//! poll-retry window, because the stream itself carries no message boundary
//! other than the newline.
//!
//! # Transports
//!
//! - [`TcpTransport`]: the reference transport over TCP stream sockets
//!
//! Other transports plug in by implementing [`Transport`]; anything that is
//! `AsyncRead + AsyncWrite` can back a [`Connection`].
//!
//! # Inbound traffic
//!
//! [`Server`] accepts connections and hands every decoded frame to a
//! [`NotifyHandler`] or [`CallHandler`], one task per accepted connection.

mod connection;
mod server;
mod tcp;

pub use connection::{Connection, MAX_FRAME_LEN};
pub use server::{CallHandler, NotifyHandler, Server, ServerHandle};
pub use tcp::TcpTransport;

use std::future::Future;
use std::time::Duration;

use crate::error::ConnectionError;

/// Trait for transports that can open connections to remote devices.
///
/// # Examples
///
/// ```no_run
/// use ubiqlink::transport::{PollPolicy, TcpTransport, Transport};
///
/// # async fn example() -> ubiqlink::Result<()> {
/// let transport = TcpTransport::new();
/// let mut connection = transport.connect("192.168.1.20").await?;
///
/// connection
///     .send_frame(r#"{"type":"NOTIFY","eventKey":"DOOR_OPENED"}"#)
///     .await?;
/// if let Some(reply) = connection.poll_frame(&PollPolicy::default()).await? {
///     println!("peer answered: {reply}");
/// }
/// # Ok(())
/// # }
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Network type label of the interfaces this transport can reach,
    /// e.g. `Ethernet:TCP`.
    fn network_type(&self) -> &str;

    /// Opens a connection to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the address is invalid or the remote
    /// endpoint cannot be reached.
    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Connection, ConnectionError>> + Send;
}

/// Bounds how long a reader waits for a reply frame.
///
/// The reader waits in slices of `interval`, at most `max_attempts` times,
/// so a reply that never comes costs at most [`budget`](Self::budget).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ubiqlink::transport::PollPolicy;
///
/// let policy = PollPolicy::new(10, Duration::from_millis(50));
/// assert_eq!(policy.budget(), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl PollPolicy {
    /// Default number of wait slices.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
    /// Default length of a wait slice.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

    /// Creates a policy; zero attempts are raised to one.
    #[must_use]
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the worst-case wait before a read gives up.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_INTERVAL)
    }
}
