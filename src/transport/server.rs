// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound connection handling.
//!
//! ```text
//! TcpListener.accept()
//!         ↓  (one task per connection)
//! Connection.next_frame() ── until EOF
//!         ↓
//!   message::decode()
//!    ├─ Notify   → NotifyHandler::handle_notify   (no reply)
//!    ├─ Call     → CallHandler::handle_call       → Response frame
//!    ├─ Response → ignored
//!    └─ garbage  → error Response frame
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{ConnectionError, DecodeError, Error};
use crate::message::{self, Call, Message, Notify, Response};

use super::Connection;

/// Pause after a failed accept, e.g. when the process is out of descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Receives notifies arriving on inbound connections.
pub trait NotifyHandler: Send + Sync {
    /// Handles one inbound notify.
    fn handle_notify(&self, notify: &Notify);
}

/// Answers calls arriving on inbound connections.
pub trait CallHandler: Send + Sync {
    /// Handles one inbound call and produces the reply.
    fn handle_call(&self, call: &Call) -> Response;
}

/// TCP server that feeds inbound frames to handlers.
#[derive(Debug)]
pub struct Server;

impl Server {
    /// Binds `address` and starts accepting connections in the background.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the address cannot be bound.
    pub async fn bind(
        address: &str,
        notifies: Arc<dyn NotifyHandler>,
        calls: Arc<dyn CallHandler>,
    ) -> Result<ServerHandle, ConnectionError> {
        let listener =
            TcpListener::bind(address)
                .await
                .map_err(|source| ConnectionError::Refused {
                    address: address.to_string(),
                    source,
                })?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tracing::debug!(%local_addr, "Server listening");
        let task = tokio::spawn(accept_loop(listener, shutdown_rx, notifies, calls));

        Ok(ServerHandle {
            local_addr,
            shutdown: shutdown_tx,
            task: Some(task),
        })
    }
}

/// Handle to a running [`Server`].
///
/// Dropping the handle stops accepting new connections. Connections that
/// were already accepted run until their peer closes them.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Returns the address the server is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for the accept loop to end.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
    notifies: Arc<dyn NotifyHandler>,
    calls: Arc<dyn CallHandler>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::trace!(%peer, "Accepted connection");
                    tokio::spawn(serve_connection(
                        stream,
                        peer,
                        Arc::clone(&notifies),
                        Arc::clone(&calls),
                    ));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }
    tracing::debug!("Server stopped accepting connections");
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    notifies: Arc<dyn NotifyHandler>,
    calls: Arc<dyn CallHandler>,
) {
    let mut connection = Connection::new(stream, peer.to_string());

    loop {
        let decoded = match connection.next_frame().await {
            Ok(Some(frame)) => message::decode(&frame),
            Ok(None) => break,
            // The offending line was consumed; the stream is still in sync.
            Err(Error::Decode(err @ DecodeError::InvalidUtf8(_))) => Err(err),
            Err(err) => {
                tracing::warn!(%peer, error = %err, "Dropping connection");
                break;
            }
        };

        let reply = match decoded {
            Ok(Message::Notify(notify)) => {
                tracing::debug!(
                    %peer,
                    event_key = %notify.event_key(),
                    driver = ?notify.driver(),
                    "Received notify"
                );
                notifies.handle_notify(&notify);
                None
            }
            Ok(Message::Call(call)) => {
                tracing::debug!(
                    %peer,
                    driver = %call.driver(),
                    service = %call.service(),
                    "Received call"
                );
                Some(calls.handle_call(&call))
            }
            Ok(Message::Response(_)) => {
                tracing::debug!(%peer, "Ignoring unsolicited response");
                None
            }
            Err(err) => {
                tracing::warn!(%peer, error = %err, "Received malformed frame");
                Some(Response::error(format!("malformed message: {err}")))
            }
        };

        if let Some(response) = reply
            && let Err(err) = connection.send(&response.into()).await
        {
            tracing::warn!(%peer, error = %err, "Failed to send response");
            break;
        }
    }

    tracing::trace!(%peer, "Connection closed");
}
