//! Shared "current peer" cell.
//!
//! The receive loop records the sender of every inbound datagram; the
//! output task reads whichever address is current when a line is ready.
//! Last writer wins, and the value starts out unknown.

use std::net::SocketAddr;

use tokio::sync::watch;

/// Create a linked writer/reader pair over an initially unknown peer.
pub fn peer_cell() -> (PeerWriter, PeerReader) {
    let (tx, rx) = watch::channel(None);
    (PeerWriter(tx), PeerReader(rx))
}

/// Write side, owned by the receive loop.
pub struct PeerWriter(watch::Sender<Option<SocketAddr>>);

impl PeerWriter {
    pub fn record(&self, addr: SocketAddr) {
        self.0.send_replace(Some(addr));
    }
}

/// Read side, handed to the output task.
#[derive(Clone)]
pub struct PeerReader(watch::Receiver<Option<SocketAddr>>);

impl PeerReader {
    pub fn current(&self) -> Option<SocketAddr> {
        *self.0.borrow()
    }
}
