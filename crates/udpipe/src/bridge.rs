//! Bridge controller - composes the datagram endpoint and process bridge.
//!
//! The receive loop is the driver: the first datagram records its sender
//! as the peer and starts the child exactly once, and every datagram
//! (first included) is forwarded to the child's stdin as one
//! newline-terminated line. A spawned task forwards each child stdout
//! line back as one datagram to whichever peer is current at send time.

use std::process::ExitCode;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::mpsc;

use crate::endpoint::{BindError, DatagramEndpoint, RecvError, SendError};
use crate::peer::{PeerReader, peer_cell};
use crate::process::{ChildLines, ProcessBridge, StartError};

/// Any error here collapses the whole bridge; each class maps to its own
/// process exit status. A missing command-line argument exits through the
/// argument parser's own status before any socket is opened.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Receive(#[from] RecvError),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error(transparent)]
    Start(#[from] StartError),
    #[error("write to child stdin failed: {0}")]
    ChildWrite(#[source] std::io::Error),
}

impl FatalError {
    pub fn exit_code(&self) -> u8 {
        match self {
            FatalError::Bind(_) => 3,
            FatalError::Send(_) => 4,
            FatalError::Receive(_) => 5,
            FatalError::Start(_) => 6,
            FatalError::ChildWrite(_) => 7,
        }
    }

    pub fn exit_status(&self) -> ExitCode {
        ExitCode::from(self.exit_code())
    }
}

pub struct Bridge {
    endpoint: Arc<DatagramEndpoint>,
    process: ProcessBridge,
}

impl Bridge {
    pub fn new(endpoint: DatagramEndpoint, process: ProcessBridge) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
            process,
        }
    }

    /// Run until a fatal error. There is no graceful shutdown path.
    pub async fn run(mut self) -> Result<(), FatalError> {
        let (peer_writer, peer_reader) = peer_cell();
        let (fatal_tx, mut fatal_rx) = mpsc::channel(1);
        let mut child_stdin: Option<ChildStdin> = None;

        loop {
            tokio::select! {
                biased;

                Some(err) = fatal_rx.recv() => {
                    return Err(err);
                }

                recvd = self.endpoint.recv() => {
                    let (payload, from) = recvd?;
                    tracing::debug!(bytes = payload.len(), peer = %from, "datagram received");
                    peer_writer.record(from);

                    if !self.process.started() {
                        tracing::info!("first datagram, starting child process");
                        let io = self.process.start()?;
                        tracing::debug!(pid = self.process.id(), "child process running");
                        spawn_output_forwarder(
                            Arc::clone(&self.endpoint),
                            io.stdout_lines,
                            peer_reader.clone(),
                            fatal_tx.clone(),
                        );
                        child_stdin = Some(io.stdin);
                    }

                    if let Some(stdin) = child_stdin.as_mut() {
                        forward_line(stdin, &payload)
                            .await
                            .map_err(FatalError::ChildWrite)?;
                    }
                }
            }
        }
    }
}

/// One inbound datagram becomes exactly one line on the child's stdin:
/// the payload bytes unmodified, then a single newline. Embedded newlines
/// are not reinterpreted.
async fn forward_line(stdin: &mut ChildStdin, payload: &[u8]) -> std::io::Result<()> {
    stdin.write_all(payload).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

/// Forward child stdout lines to the current peer, one datagram per line.
/// Stdout EOF (or a read error) just ends forwarding, matching a child
/// that exits on its own; only a transmit failure is fatal.
fn spawn_output_forwarder(
    endpoint: Arc<DatagramEndpoint>,
    mut lines: ChildLines,
    peer: PeerReader,
    fatal_tx: mpsc::Sender<FatalError>,
) {
    tokio::spawn(async move {
        loop {
            match lines.next().await {
                Some(Ok(line)) => match endpoint.send(line.as_bytes(), peer.current()).await {
                    Ok(()) => {}
                    Err(SendError::DestinationUnknown) => {
                        tracing::warn!(line = %line, "no peer recorded yet, dropping child output");
                    }
                    Err(err) => {
                        let _ = fatal_tx.send(FatalError::Send(err)).await;
                        return;
                    }
                },
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "child stdout read failed, stopping output forwarding");
                    return;
                }
                None => {
                    tracing::debug!("child stdout closed, output forwarding done");
                    return;
                }
            }
        }
    });
}
