//! Transfer session state machine.
//!
//! Drives one download end to end: handshake, file request, checksum-mode
//! select, then the receive loop until end-of-transmission, cancellation,
//! transport close, or timeout. The session owns the transport; the framer
//! and controller do the per-packet work.
//!
//! ```text
//! Handshaking → Requesting → ModeSelect → Receiving → Terminated
//! ```
//!
//! The entry point returns a typed [`TransferSummary`] instead of absorbing
//! failures, so callers decide exit behavior themselves.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::controller::{Acceptance, TransferController, TransferEvent};
use crate::error::{Result, XmodemError};
use crate::protocol::{wire, PacketBuffer};

/// Observer for transfer progress. All callbacks have no-op defaults.
pub trait ProgressObserver: Send {
    /// Packet zero arrived; `fingerprint` is the announced content digest.
    fn on_metadata(&mut self, _fingerprint: &str) {}
    /// An in-order payload chunk of `bytes` was appended; `total` bytes so far.
    fn on_chunk(&mut self, _bytes: usize, _total: u64) {}
}

/// Observer that reports nothing.
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wait bound on every transport read.
    pub read_timeout: Duration,
    /// Transport read chunk size.
    pub read_chunk: usize,
    /// Cap on accumulated greeting bytes before the handshake is failed.
    pub greeting_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            read_chunk: 4096,
            greeting_limit: 16 * 1024,
        }
    }
}

/// How a transfer that reached the receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// End-of-transmission received; the file is complete.
    Complete,
    /// The sender cancelled; the written prefix is preserved.
    RemoteCancelled,
    /// The transport closed mid-stream; the written prefix is preserved.
    ConnectionClosed,
}

/// Result of a finished session.
#[derive(Debug, Clone)]
pub struct TransferSummary {
    pub ending: Ending,
    pub bytes_written: u64,
    pub packets_accepted: u64,
    /// Stray bytes the framer discarded during resynchronization.
    pub noise_bytes: u64,
    /// Fingerprint announced by packet zero, if any.
    pub fingerprint: Option<String>,
    /// Whether the received content matches the announced fingerprint.
    pub fingerprint_matches: Option<bool>,
}

/// One download over a connected transport.
pub struct Session<T, W> {
    transport: T,
    controller: TransferController<W>,
    framer: PacketBuffer,
    config: SessionConfig,
    progress: Box<dyn ProgressObserver>,
}

impl<T, W> Session<T, W>
where
    T: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a session over a connected transport writing to `sink`.
    pub fn new(transport: T, sink: W, config: SessionConfig) -> Self {
        Self {
            transport,
            controller: TransferController::new(sink),
            framer: PacketBuffer::new(),
            config,
            progress: Box::new(NoProgress),
        }
    }

    /// Install a progress observer.
    pub fn with_progress(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.progress = Box::new(observer);
        self
    }

    /// Run the whole download for `filename`.
    ///
    /// A courtesy end-of-transmission byte is sent on every terminal path,
    /// success or failure; its own failure is ignored.
    pub async fn download(mut self, filename: &str) -> Result<TransferSummary> {
        let result = self.run(filename).await;

        let _ = self.transport.write_all(&[wire::EOT]).await;
        let _ = self.transport.flush().await;

        result
    }

    async fn run(&mut self, filename: &str) -> Result<TransferSummary> {
        self.handshake().await?;
        self.request(filename).await?;
        self.receive().await
    }

    /// Probe the server with a newline and wait for its affirmative token.
    async fn handshake(&mut self) -> Result<()> {
        self.transport.write_all(b"\n").await?;
        self.transport.flush().await?;

        let mut greeting = Vec::new();
        let mut buf = vec![0u8; self.config.read_chunk];

        loop {
            let read = timeout(self.config.read_timeout, self.transport.read(&mut buf))
                .await
                .map_err(|_| {
                    XmodemError::Handshake("timed out waiting for server greeting".into())
                })?;

            let n = match read? {
                0 => {
                    return Err(XmodemError::Handshake(
                        "connection closed before server greeting".into(),
                    ))
                }
                n => n,
            };

            greeting.extend_from_slice(&buf[..n]);

            if contains_affirmative(&greeting) {
                tracing::debug!(bytes = greeting.len(), "handshake complete");
                return Ok(());
            }

            if greeting.len() > self.config.greeting_limit {
                return Err(XmodemError::Handshake(format!(
                    "no affirmative token in the first {} greeting bytes",
                    greeting.len()
                )));
            }
        }
    }

    /// Send the download request line and the checksum-mode select byte.
    /// No server reply is awaited before entering the receive loop.
    async fn request(&mut self, filename: &str) -> Result<()> {
        tracing::debug!(filename, "requesting download");
        self.transport
            .write_all(format!("download {filename}\n").as_bytes())
            .await?;
        self.transport.write_all(&[wire::CRC_MODE]).await?;
        self.transport.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<TransferSummary> {
        let mut buf = vec![0u8; self.config.read_chunk];

        loop {
            let n = match timeout(self.config.read_timeout, self.transport.read(&mut buf)).await {
                Err(_) => return Err(XmodemError::ReadTimeout(self.config.read_timeout)),
                Ok(Ok(0)) => {
                    tracing::warn!("connection closed mid-transfer");
                    return self.finish(Ending::ConnectionClosed).await;
                }
                Ok(read) => read?,
            };

            for raw in self.framer.push(&buf[..n]) {
                let disposition = self.controller.handle(raw).await?;

                if let Some(reply) = disposition.reply {
                    self.transport.write_all(&[reply]).await?;
                }

                match disposition.accepted {
                    Some(Acceptance::Metadata) => {
                        if let Some(fingerprint) = self.controller.fingerprint() {
                            self.progress.on_metadata(fingerprint);
                        }
                    }
                    Some(Acceptance::Payload { bytes, .. }) => {
                        self.progress.on_chunk(bytes, self.controller.bytes_written());
                    }
                    None => {}
                }

                match disposition.event {
                    Some(TransferEvent::Finished) => {
                        return self.finish(Ending::Complete).await;
                    }
                    Some(TransferEvent::Cancelled) => {
                        tracing::warn!("transfer cancelled by sender");
                        return self.finish(Ending::RemoteCancelled).await;
                    }
                    None => {}
                }
            }
        }
    }

    async fn finish(&mut self, ending: Ending) -> Result<TransferSummary> {
        self.controller.flush().await?;

        let fingerprint_matches = self.controller.fingerprint_matches();
        if fingerprint_matches == Some(false) {
            // The firmware sometimes announces the digest of a compressed
            // sibling file, so this is advisory rather than fatal.
            tracing::warn!(
                announced = self.controller.fingerprint().unwrap_or_default(),
                "received content does not match announced fingerprint"
            );
        }

        Ok(TransferSummary {
            ending,
            bytes_written: self.controller.bytes_written(),
            packets_accepted: self.controller.packets_accepted(),
            noise_bytes: self.framer.noise_bytes(),
            fingerprint: self.controller.fingerprint().map(str::to_owned),
            fingerprint_matches,
        })
    }
}

/// Case-insensitive search for the "ok" token in the greeting stream.
fn contains_affirmative(greeting: &[u8]) -> bool {
    greeting.windows(2).any(|w| w.eq_ignore_ascii_case(b"ok"))
}
