//! Datagram endpoint - the UDP side of the bridge.
//!
//! Owns a connectionless socket bound to a fixed local port. Inbound
//! datagrams may come from any sender; outbound datagrams go to whatever
//! destination the caller passes, which is `None` until a peer has been
//! recorded.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// Default port the bridge listens on.
pub const DEFAULT_PORT: u16 = 7070;

/// Practical cap on a single datagram payload. Oversized datagrams are
/// truncated to this many bytes.
pub const DEFAULT_RECV_BUFFER: usize = 1024;

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub bind: SocketAddr,
    pub recv_buffer: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            recv_buffer: DEFAULT_RECV_BUFFER,
        }
    }
}

impl EndpointConfig {
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_recv_buffer(mut self, recv_buffer: usize) -> Self {
        self.recv_buffer = recv_buffer;
        self
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to bind {addr}: {source}")]
pub struct BindError {
    pub addr: SocketAddr,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, thiserror::Error)]
#[error("datagram receive failed: {0}")]
pub struct RecvError(#[from] pub io::Error);

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// No peer address has been recorded yet.
    #[error("no destination peer address known")]
    DestinationUnknown,
    #[error("datagram send failed: {0}")]
    Io(#[from] io::Error),
}

/// UDP socket wrapper shared by the receive loop and the output task.
#[derive(Debug)]
pub struct DatagramEndpoint {
    socket: UdpSocket,
    recv_buffer: usize,
}

impl DatagramEndpoint {
    pub async fn bind(config: EndpointConfig) -> Result<Self, BindError> {
        let socket = UdpSocket::bind(config.bind)
            .await
            .map_err(|source| BindError {
                addr: config.bind,
                source,
            })?;
        Ok(Self {
            socket,
            recv_buffer: config.recv_buffer,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Wait for one datagram. Returns the payload (truncated to the
    /// configured buffer size) and the sender's address.
    pub async fn recv(&self) -> Result<(Vec<u8>, SocketAddr), RecvError> {
        let mut buf = vec![0u8; self.recv_buffer];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf, from))
    }

    /// Send one datagram to `dest`. `None` means no peer has been recorded
    /// yet and fails with [`SendError::DestinationUnknown`].
    pub async fn send(&self, payload: &[u8], dest: Option<SocketAddr>) -> Result<(), SendError> {
        let dest = dest.ok_or(SendError::DestinationUnknown)?;
        self.socket.send_to(payload, dest).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> EndpointConfig {
        EndpointConfig::default().with_bind(SocketAddr::from(([127, 0, 0, 1], 0)))
    }

    #[test]
    fn config_defaults() {
        let config = EndpointConfig::default();
        assert_eq!(config.bind.port(), DEFAULT_PORT);
        assert_eq!(config.recv_buffer, DEFAULT_RECV_BUFFER);
    }

    #[tokio::test]
    async fn roundtrip() {
        let a = DatagramEndpoint::bind(local_config()).await.unwrap();
        let b = DatagramEndpoint::bind(local_config()).await.unwrap();

        a.send(b"ping", Some(b.local_addr().unwrap())).await.unwrap();

        let (payload, from) = b.recv().await.unwrap();
        assert_eq!(payload, b"ping");
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn oversized_datagram_is_truncated() {
        let rx = DatagramEndpoint::bind(local_config().with_recv_buffer(4))
            .await
            .unwrap();
        let tx = DatagramEndpoint::bind(local_config()).await.unwrap();

        tx.send(b"longer than four bytes", Some(rx.local_addr().unwrap()))
            .await
            .unwrap();

        let (payload, _) = rx.recv().await.unwrap();
        assert_eq!(payload, b"long");
    }

    #[tokio::test]
    async fn send_without_destination_fails() {
        let endpoint = DatagramEndpoint::bind(local_config()).await.unwrap();
        let err = endpoint.send(b"pong", None).await.unwrap_err();
        assert!(matches!(err, SendError::DestinationUnknown));
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = DatagramEndpoint::bind(local_config()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let err = DatagramEndpoint::bind(EndpointConfig::default().with_bind(taken))
            .await
            .unwrap_err();
        assert_eq!(err.addr, taken);
    }
}
