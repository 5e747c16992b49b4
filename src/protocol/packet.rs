//! Data-packet decoding and validation.
//!
//! A raw packet extracted by the framer is parsed into a [`DataPacket`]:
//! header fields, the checksummed body region, and the transmitted CRC.
//! Structural failures (wrong size, unknown marker, sequence/complement
//! mismatch) are reported as [`PacketError`]; callers drop such packets
//! without replying and rely on the sender's own retry timer.

use bytes::Bytes;
use thiserror::Error;

use super::wire::{self, LONG_PACKET_SIZE, LONG_PAYLOAD, SHORT_PACKET_SIZE, SHORT_PAYLOAD};

/// The two data-packet forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// SOH-marked, 128-byte payload, 1-byte length field.
    Short,
    /// STX-marked, 8192-byte payload, 2-byte length field.
    Long,
}

impl PacketKind {
    /// Map a marker byte to a packet kind. Returns `None` for non-data markers.
    pub fn from_marker(byte: u8) -> Option<Self> {
        match byte {
            wire::SOH => Some(PacketKind::Short),
            wire::STX => Some(PacketKind::Long),
            _ => None,
        }
    }

    /// The marker byte for this kind.
    pub fn marker(self) -> u8 {
        match self {
            PacketKind::Short => wire::SOH,
            PacketKind::Long => wire::STX,
        }
    }

    /// Total on-wire packet size including marker and checksum.
    pub fn total_size(self) -> usize {
        match self {
            PacketKind::Short => SHORT_PACKET_SIZE,
            PacketKind::Long => LONG_PACKET_SIZE,
        }
    }

    /// Fixed payload size for this kind.
    pub fn payload_size(self) -> usize {
        match self {
            PacketKind::Short => SHORT_PAYLOAD,
            PacketKind::Long => LONG_PAYLOAD,
        }
    }

    /// Width of the auxiliary length field (1 byte short, 2 bytes long).
    pub fn aux_width(self) -> usize {
        match self {
            PacketKind::Short => 1,
            PacketKind::Long => 2,
        }
    }
}

/// Structural decode failure. These packets are dropped silently.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// Packet byte count does not match the size its marker implies.
    #[error("packet is {got} bytes, expected {want}")]
    WrongLength { got: usize, want: usize },

    /// First byte is not a data-packet marker.
    #[error("unknown packet marker 0x{0:02X}")]
    UnknownMarker(u8),

    /// The one's-complement sequence check failed.
    #[error("sequence {seq} does not match complement {complement}")]
    SequenceCheck { seq: u8, complement: u8 },
}

/// A structurally valid data packet.
///
/// `body` is the checksummed region: the auxiliary length field followed by
/// the fixed-size (padded) payload. The sender starts its running CRC at
/// the length field, so verification and trimming both work off this slice.
#[derive(Debug, Clone)]
pub struct DataPacket {
    kind: PacketKind,
    seq: u8,
    declared_len: usize,
    body: Bytes,
    checksum: u16,
}

impl DataPacket {
    /// Decode a raw packet (marker byte included) into its fields.
    pub fn decode(raw: Bytes) -> Result<Self, PacketError> {
        let marker = *raw.first().ok_or(PacketError::WrongLength { got: 0, want: 1 })?;
        let kind = PacketKind::from_marker(marker).ok_or(PacketError::UnknownMarker(marker))?;

        let total = kind.total_size();
        if raw.len() != total {
            return Err(PacketError::WrongLength {
                got: raw.len(),
                want: total,
            });
        }

        let seq = raw[1];
        let complement = raw[2];
        if seq != !complement {
            return Err(PacketError::SequenceCheck { seq, complement });
        }

        let declared_len = match kind {
            PacketKind::Short => raw[3] as usize,
            PacketKind::Long => u16::from_be_bytes([raw[3], raw[4]]) as usize,
        };

        let body = raw.slice(3..total - 2);
        let checksum = u16::from_be_bytes([raw[total - 2], raw[total - 1]]);

        Ok(Self {
            kind,
            seq,
            declared_len,
            body,
            checksum,
        })
    }

    /// Packet kind (short/long).
    #[inline]
    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// Sequence number (0-255).
    #[inline]
    pub fn seq(&self) -> u8 {
        self.seq
    }

    /// The auxiliary length field, clamped to the fixed payload size.
    #[inline]
    pub fn declared_len(&self) -> usize {
        self.declared_len.min(self.kind.payload_size())
    }

    /// The transmitted trailing checksum.
    #[inline]
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Verify the transmitted CRC against the checksummed body region.
    pub fn checksum_ok(&self) -> bool {
        wire::crc16(&self.body) == self.checksum
    }

    /// Payload bytes to append to the sink: the fixed payload minus its
    /// CTRL-Z tail, per the declared length.
    pub fn content(&self) -> &[u8] {
        let start = self.kind.aux_width();
        &self.body[start..start + self.declared_len()]
    }

    /// Interpret the content as a metadata fingerprint (packet zero carries
    /// an MD5 hex string padded with CTRL-Z).
    pub fn fingerprint(&self) -> String {
        String::from_utf8_lossy(self.content())
            .trim_end_matches(char::from(wire::PAD))
            .trim()
            .to_ascii_lowercase()
    }
}

/// Encode a complete data packet as it appears on the wire.
///
/// Pads `content` with CTRL-Z up to the fixed payload size and computes the
/// trailing CRC over the length field plus padded payload, mirroring the
/// sender. Used by tests and useful for protocol tooling.
///
/// # Panics
///
/// Panics if `content` exceeds the payload size for `kind`.
pub fn encode_data_packet(kind: PacketKind, seq: u8, content: &[u8]) -> Vec<u8> {
    let payload_size = kind.payload_size();
    assert!(content.len() <= payload_size);

    let mut packet = Vec::with_capacity(kind.total_size());
    packet.push(kind.marker());
    packet.push(seq);
    packet.push(!seq);

    match kind {
        PacketKind::Short => packet.push(content.len() as u8),
        PacketKind::Long => packet.extend_from_slice(&(content.len() as u16).to_be_bytes()),
    }

    packet.extend_from_slice(content);
    packet.resize(packet.len() + (payload_size - content.len()), wire::PAD);

    // CRC region starts at the length field.
    let crc = wire::crc16(&packet[3..]);
    packet.extend_from_slice(&crc.to_be_bytes());
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_short_packet() {
        let raw = Bytes::from(encode_data_packet(PacketKind::Short, 3, b"hello"));
        let pkt = DataPacket::decode(raw).unwrap();

        assert_eq!(pkt.kind(), PacketKind::Short);
        assert_eq!(pkt.seq(), 3);
        assert_eq!(pkt.declared_len(), 5);
        assert!(pkt.checksum_ok());
        assert_eq!(pkt.content(), b"hello");
    }

    #[test]
    fn test_decode_long_packet() {
        let content = vec![0x42u8; 5000];
        let raw = Bytes::from(encode_data_packet(PacketKind::Long, 9, &content));
        let pkt = DataPacket::decode(raw).unwrap();

        assert_eq!(pkt.kind(), PacketKind::Long);
        assert_eq!(pkt.seq(), 9);
        assert_eq!(pkt.declared_len(), 5000);
        assert!(pkt.checksum_ok());
        assert_eq!(pkt.content(), &content[..]);
    }

    #[test]
    fn test_decode_rejects_complement_mismatch() {
        let mut bytes = encode_data_packet(PacketKind::Short, 7, b"data");
        bytes[2] = !6; // complement of the wrong sequence number
        let err = DataPacket::decode(Bytes::from(bytes)).unwrap_err();

        assert_eq!(
            err,
            PacketError::SequenceCheck {
                seq: 7,
                complement: !6
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_marker() {
        let mut bytes = encode_data_packet(PacketKind::Short, 1, b"x");
        bytes[0] = 0x55;
        let err = DataPacket::decode(Bytes::from(bytes)).unwrap_err();
        assert_eq!(err, PacketError::UnknownMarker(0x55));
    }

    #[test]
    fn test_decode_rejects_truncated_packet() {
        let bytes = encode_data_packet(PacketKind::Short, 1, b"x");
        let err = DataPacket::decode(Bytes::from(bytes).slice(..100)).unwrap_err();
        assert_eq!(
            err,
            PacketError::WrongLength {
                got: 100,
                want: wire::SHORT_PACKET_SIZE
            }
        );
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut bytes = encode_data_packet(PacketKind::Short, 2, b"payload");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let pkt = DataPacket::decode(Bytes::from(bytes)).unwrap();
        assert!(!pkt.checksum_ok());
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let mut bytes = encode_data_packet(PacketKind::Long, 2, &[7u8; 100]);
        bytes[50] ^= 0x01;
        let pkt = DataPacket::decode(Bytes::from(bytes)).unwrap();
        assert!(!pkt.checksum_ok());
    }

    #[test]
    fn test_declared_len_clamped_to_payload_size() {
        let mut bytes = encode_data_packet(PacketKind::Short, 1, b"abc");
        bytes[3] = 0xFF; // 255 > 128-byte payload
        let pkt = DataPacket::decode(Bytes::from(bytes)).unwrap();
        assert_eq!(pkt.declared_len(), wire::SHORT_PAYLOAD);
        assert_eq!(pkt.content().len(), wire::SHORT_PAYLOAD);
    }

    #[test]
    fn test_fingerprint_strips_padding() {
        let md5 = "d41d8cd98f00b204e9800998ecf8427e";
        let raw = Bytes::from(encode_data_packet(PacketKind::Short, 0, md5.as_bytes()));
        let pkt = DataPacket::decode(raw).unwrap();
        assert_eq!(pkt.fingerprint(), md5);
    }

    #[test]
    fn test_full_payload_content() {
        let content = vec![0x11u8; wire::SHORT_PAYLOAD];
        let raw = Bytes::from(encode_data_packet(PacketKind::Short, 4, &content));
        let pkt = DataPacket::decode(raw).unwrap();
        assert_eq!(pkt.content(), &content[..]);
        assert!(pkt.checksum_ok());
    }
}
