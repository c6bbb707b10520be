use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use udpipe::bridge::{Bridge, FatalError};
use udpipe::endpoint::{DatagramEndpoint, EndpointConfig};
use udpipe::process::{ExecSpawner, ProcessBridge};

#[derive(Debug, Parser)]
#[command(
    name = "udpipe",
    version,
    about = "Bridge a single UDP peer to the stdio of a spawned child process"
)]
struct Args {
    /// Path of the executable to spawn on the first datagram
    program: PathBuf,

    /// Local address for the datagram socket
    #[arg(long, default_value_t = EndpointConfig::default().bind)]
    bind: SocketAddr,

    /// Append diagnostic output to this file
    #[arg(long, default_value = "/tmp/udpipe.log")]
    log_file: PathBuf,
}

/// Initialize tracing with UDPIPE_LOG support, appending to the log file.
/// The log sink is not part of the functional contract: if the file cannot
/// be opened, the bridge runs silent.
fn init_tracing(path: &Path) {
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    else {
        return;
    };

    let filter = EnvFilter::try_from_env("UDPIPE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file)),
    );
    let _ = subscriber.try_init();
}

async fn run(args: Args) -> Result<(), FatalError> {
    let endpoint = DatagramEndpoint::bind(EndpointConfig::default().with_bind(args.bind)).await?;
    tracing::info!(
        addr = %args.bind,
        program = %args.program.display(),
        "udpipe listening"
    );

    let process = ProcessBridge::new(Arc::new(ExecSpawner::new(args.program)));
    Bridge::new(endpoint, process).run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_file);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, exit_code = err.exit_code(), "fatal error, exiting");
            err.exit_status()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_rejected() {
        assert!(Args::try_parse_from(["udpipe"]).is_err());
    }

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["udpipe", "/bin/cat"]).unwrap();
        assert_eq!(args.program, PathBuf::from("/bin/cat"));
        assert_eq!(args.bind.port(), udpipe::endpoint::DEFAULT_PORT);
        assert_eq!(args.log_file, PathBuf::from("/tmp/udpipe.log"));
    }

    #[test]
    fn bind_override() {
        let args =
            Args::try_parse_from(["udpipe", "/bin/cat", "--bind", "127.0.0.1:9000"]).unwrap();
        assert_eq!(args.bind, "127.0.0.1:9000".parse().unwrap());
    }
}
