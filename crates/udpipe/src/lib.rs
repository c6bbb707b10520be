//! udpipe: bridge a single UDP peer to the stdio of a spawned child process.
//!
//! The child is launched on arrival of the first datagram, so the peer's
//! address is known before any child output has to be routed back. Payloads
//! are relayed as opaque line-oriented text: one inbound datagram becomes
//! one newline-terminated line on the child's stdin, and one line of child
//! stdout becomes one outbound datagram to the most recently seen peer.

pub mod bridge;
pub mod endpoint;
pub mod peer;
pub mod process;

pub use bridge::{Bridge, FatalError};
pub use endpoint::{BindError, DatagramEndpoint, EndpointConfig, RecvError, SendError};
pub use peer::{PeerReader, PeerWriter, peer_cell};
pub use process::{ChildIo, ChildLines, ExecSpawner, ProcessBridge, SpawnError, Spawner, StartError};
