//! # xmodem-fetch
//!
//! Client for a checksum-verified XMODEM-style file download protocol run
//! over a TCP stream, as spoken by Smoothieware-derived CNC controllers.
//!
//! ## Architecture
//!
//! - **Framing** ([`protocol::PacketBuffer`]): turns the raw, possibly
//!   fragmented byte stream into discrete packets, resynchronizing past
//!   noise bytes.
//! - **Decoding** ([`protocol::DataPacket`]): header parsing, the
//!   sequence/complement structural check, and CRC-16/XMODEM validation.
//! - **Control** ([`controller::TransferController`]): ack/nak decisions,
//!   in-order sink writes, fingerprint tracking.
//! - **Session** ([`session::Session`]): handshake, download request,
//!   checksum-mode select, and the receive loop.
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use xmodem_fetch::{transport, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> xmodem_fetch::Result<()> {
//!     let stream = transport::connect("192.168.1.20:2222", Duration::from_secs(10)).await?;
//!     let sink = tokio::fs::File::create("part.gcode").await?;
//!     let summary = Session::new(stream, sink, SessionConfig::default())
//!         .download("part.gcode")
//!         .await?;
//!     println!("{} bytes", summary.bytes_written);
//!     Ok(())
//! }
//! ```

pub mod controller;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use controller::TransferController;
pub use error::{Result, XmodemError};
pub use session::{Ending, NoProgress, ProgressObserver, Session, SessionConfig, TransferSummary};
