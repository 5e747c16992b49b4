//! Transfer controller: accept/acknowledge/reject logic.
//!
//! Consumes the packets extracted by the framer, appends accepted payloads
//! to the output sink in strict sequence order, and tells the session which
//! control byte (if any) to send back. Out-of-order and malformed packets
//! are dropped without a reply; the sender's retry timer recovers them.

use std::io;

use md5::{Digest, Md5};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::protocol::{wire, DataPacket, RawPacket};

/// What a handled packet contributed to the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Packet zero: transfer metadata, nothing written to the sink.
    Metadata,
    /// An in-order data packet whose content was appended.
    Payload { seq: u8, bytes: usize },
}

/// Terminal protocol event signalled by a control packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEvent {
    /// End-of-transmission: the file is complete.
    Finished,
    /// The sender cancelled the transfer.
    Cancelled,
}

/// Outcome of handling one packet: the reply byte to send (if any), what
/// was accepted (if anything), and whether the session must terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Disposition {
    pub reply: Option<u8>,
    pub accepted: Option<Acceptance>,
    pub event: Option<TransferEvent>,
}

impl Disposition {
    /// Drop silently: no reply, no effect.
    fn silent() -> Self {
        Self::default()
    }

    fn nak() -> Self {
        Self {
            reply: Some(wire::NAK),
            ..Self::default()
        }
    }

    fn ack(accepted: Option<Acceptance>, event: Option<TransferEvent>) -> Self {
        Self {
            reply: Some(wire::ACK),
            accepted,
            event,
        }
    }
}

/// Drives the accept/ack/reject protocol and owns the output sink.
pub struct TransferController<W> {
    sink: W,
    /// Last accepted sequence number; `None` until the first packet lands.
    last_seq: Option<u8>,
    bytes_written: u64,
    packets_accepted: u64,
    /// Fingerprint announced by packet zero, once seen.
    fingerprint: Option<String>,
    /// Running MD5 over appended content, checked against the fingerprint.
    digest: Md5,
}

impl<W: AsyncWrite + Unpin> TransferController<W> {
    /// Create a controller writing accepted payloads to `sink`.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            last_seq: None,
            bytes_written: 0,
            packets_accepted: 0,
            fingerprint: None,
            digest: Md5::new(),
        }
    }

    /// The sequence number that would continue the transfer.
    pub fn expected_seq(&self) -> u8 {
        self.last_seq.map_or(0, |seq| seq.wrapping_add(1))
    }

    /// Handle one framed packet. Errors are sink write failures and are
    /// fatal to the session; every protocol-level problem is absorbed here.
    pub async fn handle(&mut self, raw: RawPacket) -> io::Result<Disposition> {
        match raw {
            RawPacket::Eot => Ok(Disposition::ack(None, Some(TransferEvent::Finished))),
            RawPacket::Cancel => Ok(Disposition::ack(None, Some(TransferEvent::Cancelled))),
            RawPacket::Data(bytes) => {
                let packet = match DataPacket::decode(bytes) {
                    Ok(packet) => packet,
                    Err(error) => {
                        tracing::debug!(%error, "dropping malformed packet");
                        return Ok(Disposition::silent());
                    }
                };
                self.handle_data(packet).await
            }
        }
    }

    async fn handle_data(&mut self, packet: DataPacket) -> io::Result<Disposition> {
        // Packet zero before any data is transfer metadata, accepted without
        // checksum validation. Once payload flow has begun, sequence 0 is an
        // ordinary wrapped sequence number.
        if packet.seq() == 0 && self.last_seq.is_none() {
            let fingerprint = packet.fingerprint();
            tracing::debug!(%fingerprint, "received metadata packet");
            self.fingerprint = Some(fingerprint);
            self.last_seq = Some(0);
            self.packets_accepted += 1;
            return Ok(Disposition::ack(Some(Acceptance::Metadata), None));
        }

        if !packet.checksum_ok() {
            tracing::debug!(seq = packet.seq(), "checksum mismatch, rejecting");
            return Ok(Disposition::nak());
        }

        let expected = self.expected_seq();
        if packet.seq() != expected {
            tracing::debug!(
                seq = packet.seq(),
                expected,
                "out-of-sequence packet dropped"
            );
            return Ok(Disposition::silent());
        }

        let content = packet.content();
        self.sink.write_all(content).await?;
        self.digest.update(content);
        self.bytes_written += content.len() as u64;
        self.packets_accepted += 1;
        self.last_seq = Some(packet.seq());

        Ok(Disposition::ack(
            Some(Acceptance::Payload {
                seq: packet.seq(),
                bytes: content.len(),
            }),
            None,
        ))
    }

    /// Flush the output sink.
    pub async fn flush(&mut self) -> io::Result<()> {
        self.sink.flush().await
    }

    /// Total payload bytes appended to the sink.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Packets accepted (metadata included).
    pub fn packets_accepted(&self) -> u64 {
        self.packets_accepted
    }

    /// Fingerprint announced by packet zero, if one was received.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Whether the received content matches the announced fingerprint.
    /// `None` when no metadata packet was seen.
    pub fn fingerprint_matches(&self) -> Option<bool> {
        self.fingerprint
            .as_ref()
            .map(|announced| *announced == hex::encode(self.digest.clone().finalize()))
    }

    /// Consume the controller, returning the sink.
    pub fn into_sink(self) -> W {
        self.sink
    }

    #[cfg(test)]
    fn force_last_seq(&mut self, seq: u8) {
        self.last_seq = Some(seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_data_packet, PacketKind};
    use bytes::Bytes;

    fn data(seq: u8, content: &[u8]) -> RawPacket {
        RawPacket::Data(Bytes::from(encode_data_packet(
            PacketKind::Short,
            seq,
            content,
        )))
    }

    fn metadata(md5: &str) -> RawPacket {
        data(0, md5.as_bytes())
    }

    #[tokio::test]
    async fn test_in_order_packet_is_written_and_acked() {
        let mut ctl = TransferController::new(Vec::new());
        ctl.handle(metadata("aa")).await.unwrap();

        let disp = ctl.handle(data(1, b"hello")).await.unwrap();

        assert_eq!(disp.reply, Some(wire::ACK));
        assert_eq!(disp.accepted, Some(Acceptance::Payload { seq: 1, bytes: 5 }));
        assert_eq!(disp.event, None);
        assert_eq!(ctl.bytes_written(), 5);
        assert_eq!(ctl.into_sink(), b"hello");
    }

    #[tokio::test]
    async fn test_metadata_packet_acked_without_checksum_check() {
        let mut ctl = TransferController::new(Vec::new());

        // Corrupt the CRC; packet zero must still be accepted.
        let mut bytes = encode_data_packet(PacketKind::Short, 0, b"fingerprint");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let disp = ctl.handle(RawPacket::Data(Bytes::from(bytes))).await.unwrap();

        assert_eq!(disp.reply, Some(wire::ACK));
        assert_eq!(disp.accepted, Some(Acceptance::Metadata));
        assert_eq!(ctl.expected_seq(), 1);
        assert_eq!(ctl.bytes_written(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_packet_gets_nak_and_no_write() {
        let mut ctl = TransferController::new(Vec::new());
        ctl.handle(metadata("aa")).await.unwrap();

        let mut bytes = encode_data_packet(PacketKind::Short, 1, b"data");
        bytes[10] ^= 0x01;
        let disp = ctl.handle(RawPacket::Data(Bytes::from(bytes))).await.unwrap();

        assert_eq!(disp.reply, Some(wire::NAK));
        assert_eq!(disp.accepted, None);
        assert_eq!(ctl.bytes_written(), 0);
    }

    #[tokio::test]
    async fn test_malformed_packet_dropped_silently() {
        let mut ctl = TransferController::new(Vec::new());

        let mut bytes = encode_data_packet(PacketKind::Short, 1, b"data");
        bytes[2] = 0x00; // complement no longer matches
        let disp = ctl.handle(RawPacket::Data(Bytes::from(bytes))).await.unwrap();

        assert_eq!(disp, Disposition::default());
        assert_eq!(ctl.bytes_written(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_packet_dropped_without_reply() {
        let mut ctl = TransferController::new(Vec::new());
        ctl.handle(metadata("aa")).await.unwrap();
        ctl.handle(data(1, b"once")).await.unwrap();

        let disp = ctl.handle(data(1, b"once")).await.unwrap();

        assert_eq!(disp, Disposition::default());
        assert_eq!(ctl.bytes_written(), 4);
        assert_eq!(ctl.into_sink(), b"once");
    }

    #[tokio::test]
    async fn test_skipped_sequence_dropped_without_reply() {
        let mut ctl = TransferController::new(Vec::new());
        ctl.handle(metadata("aa")).await.unwrap();

        let disp = ctl.handle(data(3, b"future")).await.unwrap();

        assert_eq!(disp, Disposition::default());
        assert_eq!(ctl.bytes_written(), 0);
    }

    #[tokio::test]
    async fn test_sequence_wraps_past_255() {
        let mut ctl = TransferController::new(Vec::new());
        ctl.force_last_seq(255);

        // Sequence 0 after 255 is a data packet, not metadata.
        let disp = ctl.handle(data(0, b"wrapped")).await.unwrap();

        assert_eq!(
            disp.accepted,
            Some(Acceptance::Payload { seq: 0, bytes: 7 })
        );
        assert_eq!(ctl.expected_seq(), 1);
        assert_eq!(ctl.into_sink(), b"wrapped");
    }

    #[tokio::test]
    async fn test_eot_and_cancel_are_acked_terminal_events() {
        let mut ctl = TransferController::new(Vec::new());

        let eot = ctl.handle(RawPacket::Eot).await.unwrap();
        assert_eq!(eot.reply, Some(wire::ACK));
        assert_eq!(eot.event, Some(TransferEvent::Finished));

        let can = ctl.handle(RawPacket::Cancel).await.unwrap();
        assert_eq!(can.reply, Some(wire::ACK));
        assert_eq!(can.event, Some(TransferEvent::Cancelled));
    }

    #[tokio::test]
    async fn test_fingerprint_verification() {
        let content = b"the quick brown fox";
        let md5 = hex::encode(Md5::digest(content));

        let mut ctl = TransferController::new(Vec::new());
        ctl.handle(metadata(&md5)).await.unwrap();
        ctl.handle(data(1, content)).await.unwrap();

        assert_eq!(ctl.fingerprint(), Some(md5.as_str()));
        assert_eq!(ctl.fingerprint_matches(), Some(true));
    }

    #[tokio::test]
    async fn test_fingerprint_mismatch_detected() {
        let mut ctl = TransferController::new(Vec::new());
        ctl.handle(metadata("00112233445566778899aabbccddeeff"))
            .await
            .unwrap();
        ctl.handle(data(1, b"unexpected content")).await.unwrap();

        assert_eq!(ctl.fingerprint_matches(), Some(false));
    }

    #[tokio::test]
    async fn test_no_fingerprint_without_metadata() {
        let ctl = TransferController::new(Vec::new());
        assert_eq!(ctl.fingerprint(), None);
        assert_eq!(ctl.fingerprint_matches(), None);
    }
}
