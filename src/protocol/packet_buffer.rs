//! Packet buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for buffer management. The transport feeds raw
//! chunks in via [`PacketBuffer::push`]; complete packets come out, partial
//! trailing bytes stay buffered for the next push. Unrecognized leading
//! bytes are discarded one at a time, which resynchronizes the stream after
//! shell banners or line noise.

use bytes::{Buf, Bytes, BytesMut};

use super::packet::PacketKind;
use super::wire::{CAN, EOT, LONG_PACKET_SIZE};

/// A complete raw packet extracted from the stream, tagged by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPacket {
    /// A full data packet (marker byte included), ready for decoding.
    Data(Bytes),
    /// Single-byte end-of-transmission packet.
    Eot,
    /// Single-byte cancel packet.
    Cancel,
}

/// Buffer for accumulating incoming bytes and extracting complete packets.
pub struct PacketBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
    /// Bytes discarded during resynchronization.
    noise: u64,
}

impl PacketBuffer {
    /// Create a new packet buffer sized for one long packet plus slack.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(LONG_PACKET_SIZE + 1024),
            noise: 0,
        }
    }

    /// Append data and extract all complete packets currently buffered.
    ///
    /// Splitting the same byte stream across any number of pushes yields
    /// the same packet sequence as a single push.
    pub fn push(&mut self, data: &[u8]) -> Vec<RawPacket> {
        self.buffer.extend_from_slice(data);

        let mut packets = Vec::new();
        while let Some(packet) = self.try_extract_one() {
            packets.push(packet);
        }
        packets
    }

    /// Try to extract a single packet from the head of the buffer.
    ///
    /// Skips noise bytes until a recognized marker is found, then either
    /// consumes a full packet or returns `None` to wait for more input.
    fn try_extract_one(&mut self) -> Option<RawPacket> {
        loop {
            let marker = *self.buffer.first()?;

            match marker {
                EOT => {
                    self.buffer.advance(1);
                    return Some(RawPacket::Eot);
                }
                CAN => {
                    self.buffer.advance(1);
                    return Some(RawPacket::Cancel);
                }
                _ => {
                    if let Some(kind) = PacketKind::from_marker(marker) {
                        let total = kind.total_size();
                        if self.buffer.len() < total {
                            // Data marker seen but the packet is still
                            // arriving; wait for the next push.
                            return None;
                        }
                        return Some(RawPacket::Data(self.buffer.split_to(total).freeze()));
                    }

                    self.buffer.advance(1);
                    self.noise += 1;
                    tracing::trace!(byte = marker, "discarding stray byte");
                }
            }
        }
    }

    /// Number of bytes buffered but not yet consumed into a packet.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer holds no pending bytes.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total bytes discarded during resynchronization so far.
    pub fn noise_bytes(&self) -> u64 {
        self.noise
    }

    /// Drop all pending bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}
