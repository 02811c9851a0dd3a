// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TCP stream socket transport.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::ConnectionError;

use super::{Connection, Transport};

/// Transport over TCP stream sockets.
///
/// Interface addresses may be a bare host (`192.168.1.20`), in which case
/// the default port is used, or a `host:port` pair.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ubiqlink::transport::TcpTransport;
///
/// let transport = TcpTransport::new()
///     .with_default_port(15000)
///     .with_connect_timeout(Duration::from_secs(2));
/// assert_eq!(transport.default_port(), 15000);
/// ```
#[derive(Debug, Clone)]
pub struct TcpTransport {
    default_port: u16,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Network type label of TCP interfaces.
    pub const NETWORK_TYPE: &'static str = "Ethernet:TCP";
    /// Port used when an address does not name one.
    pub const DEFAULT_PORT: u16 = 14984;
    /// Default connection establishment timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a TCP transport with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_port: Self::DEFAULT_PORT,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the port used for addresses without one.
    #[must_use]
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    /// Sets the connection establishment timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Turns an interface address into a dialable `host:port` string.
    fn endpoint(&self, address: &str) -> Result<String, ConnectionError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ConnectionError::InvalidAddress(address.to_string()));
        }

        if let Ok(socket) = address.parse::<SocketAddr>() {
            return Ok(socket.to_string());
        }
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.default_port).to_string());
        }

        match address.rsplit_once(':') {
            None => Ok(format!("{address}:{}", self.default_port)),
            Some((host, port)) if !host.is_empty() && !host.contains(':') => port
                .parse::<u16>()
                .map(|port| format!("{host}:{port}"))
                .map_err(|_| ConnectionError::InvalidAddress(address.to_string())),
            Some(_) => Err(ConnectionError::InvalidAddress(address.to_string())),
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    fn network_type(&self) -> &str {
        Self::NETWORK_TYPE
    }

    async fn connect(&self, address: &str) -> Result<Connection, ConnectionError> {
        let endpoint = self.endpoint(address)?;
        tracing::debug!(endpoint = %endpoint, "Opening TCP connection");

        let stream = match tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(endpoint.as_str()),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ConnectionError::Refused {
                    address: endpoint,
                    source,
                });
            }
            Err(_) => {
                return Err(ConnectionError::Timeout {
                    address: endpoint,
                    timeout_ms: millis(self.connect_timeout),
                });
            }
        };

        stream.set_nodelay(true)?;
        Ok(Connection::new(stream, endpoint))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_millis_saturate() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
    use tokio::net::TcpListener;

    #[test]
    fn bare_host_gets_default_port() {
        let transport = TcpTransport::new();
        assert_eq!(transport.endpoint("127.0.0.1").unwrap(), "127.0.0.1:14984");
        assert_eq!(transport.endpoint("localhost").unwrap(), "localhost:14984");
    }

    #[test]
    fn explicit_port_is_kept() {
        let transport = TcpTransport::new();
        assert_eq!(transport.endpoint("127.0.0.1:9000").unwrap(), "127.0.0.1:9000");
        assert_eq!(transport.endpoint("gateway.local:9000").unwrap(), "gateway.local:9000");
    }

    #[test]
    fn ipv6_addresses() {
        let transport = TcpTransport::new().with_default_port(7000);
        assert_eq!(transport.endpoint("::1").unwrap(), "[::1]:7000");
        assert_eq!(transport.endpoint("[::1]:8000").unwrap(), "[::1]:8000");
    }

    #[test]
    fn invalid_addresses_are_rejected() {
        let transport = TcpTransport::new();
        assert!(matches!(
            transport.endpoint(""),
            Err(ConnectionError::InvalidAddress(_))
        ));
        assert!(matches!(
            transport.endpoint("host:notaport"),
            Err(ConnectionError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn connect_to_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let connection = TcpTransport::new().connect(&address).await.unwrap();
        assert_eq!(connection.peer(), address);
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        // Bind then drop to obtain a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = TcpTransport::new().connect(&address).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Refused { .. }));
    }
}
