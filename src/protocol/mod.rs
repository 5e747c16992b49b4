//! Protocol layer: wire constants, packet decoding, incremental framing.

mod packet;
mod packet_buffer;
pub mod wire;

pub use packet::{encode_data_packet, DataPacket, PacketError, PacketKind};
pub use packet_buffer::{PacketBuffer, RawPacket};
pub use wire::crc16;
