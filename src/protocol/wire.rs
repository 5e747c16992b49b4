//! Wire constants and the checksum primitive.
//!
//! Packet layouts (all multi-byte integers Big Endian):
//! ```text
//! short: [SOH][seq][255-seq][len: 1       ][payload: 128 ][crc: 2]  = 134 bytes
//! long:  [STX][seq][255-seq][len: 2 BE    ][payload: 8192][crc: 2]  = 8199 bytes
//! ```
//! The CRC covers the length field *and* the padded payload, i.e. every
//! byte between the sequence complement and the trailing checksum.
//!
//! `EOT` and `CAN` travel as bare single-byte packets. `ACK`/`NAK` are the
//! client's per-packet replies.

use crc::{Crc, CRC_16_XMODEM};

/// Start of a 128-byte (short) data packet.
pub const SOH: u8 = 0x01;
/// Start of an 8192-byte (long) data packet.
pub const STX: u8 = 0x02;
/// End of transmission.
pub const EOT: u8 = 0x04;
/// Positive acknowledge.
pub const ACK: u8 = 0x06;
/// Negative acknowledge, asks the sender to resend the same sequence number.
pub const NAK: u8 = 0x15;
/// Transfer cancellation.
pub const CAN: u8 = 0x18;
/// Checksum-mode select byte sent after the download request.
pub const CRC_MODE: u8 = b'C';
/// Padding byte filling the tail of a partial payload.
pub const PAD: u8 = 0x1A;

/// Payload size of a short packet.
pub const SHORT_PAYLOAD: usize = 128;
/// Payload size of a long packet.
pub const LONG_PAYLOAD: usize = 8192;

/// Total short packet size: marker + seq/complement + 1-byte length + payload + crc.
pub const SHORT_PACKET_SIZE: usize = 1 + 2 + 1 + SHORT_PAYLOAD + 2;
/// Total long packet size: marker + seq/complement + 2-byte length + payload + crc.
pub const LONG_PACKET_SIZE: usize = 1 + 2 + 2 + LONG_PAYLOAD + 2;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC-16/XMODEM (CCITT polynomial 0x1021, seed 0, no reflection).
///
/// Matches Python's `binascii.crc_hqx(data, 0)`.
///
/// ```
/// assert_eq!(xmodem_fetch::protocol::crc16(b"123456789"), 0x31C3);
/// ```
#[inline]
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_check_vector() {
        // Standard CRC-16/XMODEM check value.
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_crc16_empty_is_seed() {
        assert_eq!(crc16(b""), 0x0000);
    }

    #[test]
    fn test_crc16_is_deterministic() {
        let data = vec![0xA5u8; 8192];
        assert_eq!(crc16(&data), crc16(&data));
    }

    #[test]
    fn test_packet_sizes() {
        assert_eq!(SHORT_PACKET_SIZE, 134);
        assert_eq!(LONG_PACKET_SIZE, 8199);
    }
}
