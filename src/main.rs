//! Entry point for `xmodem-fetch`.
//!
//! Argument parsing, connection setup, logging, and exit policy live here;
//! all protocol work is delegated to the library. Connection-level failures
//! (connect, handshake, timeout, local I/O) exit non-zero; a transfer cut
//! short by the server is reported but treated as best-effort completion.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use xmodem_fetch::{transport, Ending, ProgressObserver, Session, SessionConfig, TransferSummary};

/// Download a file from an XMODEM-over-TCP server.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Server host name or address.
    host: String,

    /// Server TCP port.
    port: u16,

    /// Remote file to download.
    file: String,

    /// Local destination path.
    output: PathBuf,

    /// Connect/read wait bound in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

/// Progress line on stderr, updated in place.
struct StderrProgress {
    filename: String,
}

impl ProgressObserver for StderrProgress {
    fn on_metadata(&mut self, fingerprint: &str) {
        eprintln!("{}: fingerprint {}", self.filename, fingerprint);
    }

    fn on_chunk(&mut self, _bytes: usize, total: u64) {
        eprint!("\r{}: {} bytes", self.filename, total);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(summary) => {
            eprintln!();
            report(&cli, &summary);
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> xmodem_fetch::Result<TransferSummary> {
    let wait = Duration::from_secs(cli.timeout);
    let addr = format!("{}:{}", cli.host, cli.port);

    let stream = transport::connect(&addr, wait).await?;
    let sink = tokio::fs::File::create(&cli.output).await?;

    let config = SessionConfig {
        read_timeout: wait,
        ..SessionConfig::default()
    };

    Session::new(stream, sink, config)
        .with_progress(StderrProgress {
            filename: cli.file.clone(),
        })
        .download(&cli.file)
        .await
}

fn report(cli: &Cli, summary: &TransferSummary) {
    match summary.ending {
        Ending::Complete => {
            println!(
                "{}: downloaded {} bytes to {}",
                cli.file,
                summary.bytes_written,
                cli.output.display()
            );
        }
        Ending::RemoteCancelled => {
            println!(
                "{}: cancelled by server after {} bytes; partial file kept",
                cli.file, summary.bytes_written
            );
        }
        Ending::ConnectionClosed => {
            println!(
                "{}: connection closed after {} bytes; partial file kept",
                cli.file, summary.bytes_written
            );
        }
    }

    if summary.noise_bytes > 0 {
        eprintln!("note: skipped {} stray bytes on the wire", summary.noise_bytes);
    }
}
