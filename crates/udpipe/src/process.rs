//! Process bridge - lazy one-shot spawn of the child process.
//!
//! The child is not launched at startup: the caller triggers `start` once
//! the first datagram has arrived. The started/not-started distinction is
//! an explicit state, and a second `start` can never spawn twice.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::codec::{FramedRead, LinesCodec};

/// Lazy, finite stream of child stdout lines. Ends when the child closes
/// its stdout or exits; not restartable.
pub type ChildLines = FramedRead<ChildStdout, LinesCodec>;

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("spawn failed: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// The child has already been started; there is never a second spawn.
    #[error("child process already started")]
    AlreadyStarted,
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error("child {0} not captured")]
    StdioMissing(&'static str),
}

/// Extension point for different child spawn strategies.
pub trait Spawner: Send + Sync {
    fn spawn(&self) -> Result<Child, SpawnError>;
}

/// Spawns the configured executable with no arguments, stdin/stdout piped
/// and stderr inherited.
pub struct ExecSpawner {
    program: PathBuf,
}

impl ExecSpawner {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl Spawner for ExecSpawner {
    fn spawn(&self) -> Result<Child, SpawnError> {
        let child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        Ok(child)
    }
}

/// The live streams of a started child.
#[derive(Debug)]
pub struct ChildIo {
    pub stdin: ChildStdin,
    pub stdout_lines: ChildLines,
}

enum State {
    Idle,
    Started(Child),
}

/// Owns the child process across its whole life.
pub struct ProcessBridge {
    spawner: Arc<dyn Spawner>,
    state: State,
}

impl ProcessBridge {
    pub fn new(spawner: Arc<dyn Spawner>) -> Self {
        Self {
            spawner,
            state: State::Idle,
        }
    }

    pub fn started(&self) -> bool {
        matches!(self.state, State::Started(_))
    }

    /// OS pid of the started child, if any.
    pub fn id(&self) -> Option<u32> {
        match &self.state {
            State::Idle => None,
            State::Started(child) => child.id(),
        }
    }

    /// Spawn the child and hand back its stdio streams. Transitions
    /// Idle -> Started exactly once; a failed spawn leaves the bridge Idle.
    pub fn start(&mut self) -> Result<ChildIo, StartError> {
        if self.started() {
            return Err(StartError::AlreadyStarted);
        }

        let mut child = self.spawner.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or(StartError::StdioMissing("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(StartError::StdioMissing("stdout"))?;

        self.state = State::Started(child);

        Ok(ChildIo {
            stdin,
            stdout_lines: FramedRead::new(stdout, LinesCodec::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::StreamExt;
    use tokio::io::AsyncWriteExt;

    fn cat_spawner() -> Arc<dyn Spawner> {
        Arc::new(ExecSpawner::new(PathBuf::from("/bin/cat")))
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn start_spawns_and_pipes() {
        let mut bridge = ProcessBridge::new(cat_spawner());
        assert!(!bridge.started());

        let mut io = bridge.start().unwrap();
        assert!(bridge.started());
        assert!(bridge.id().is_some());

        io.stdin.write_all(b"hello\n").await.unwrap();
        io.stdin.flush().await.unwrap();

        let line = io.stdout_lines.next().await.unwrap().unwrap();
        assert_eq!(line, "hello");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn second_start_is_rejected() {
        let mut bridge = ProcessBridge::new(cat_spawner());
        let _io = bridge.start().unwrap();

        assert!(matches!(bridge.start(), Err(StartError::AlreadyStarted)));
        assert!(bridge.started());
    }

    #[tokio::test]
    async fn spawn_failure_surfaces() {
        let mut bridge = ProcessBridge::new(Arc::new(ExecSpawner::new(PathBuf::from(
            "/nonexistent/program",
        ))));

        let err = bridge.start().unwrap_err();
        assert!(matches!(err, StartError::Spawn(_)));
        assert!(!bridge.started());
    }
}
