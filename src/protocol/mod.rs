//! Packet Codec
//!
//! Stateless mapping between GMP commands and the 4-byte wire packets,
//! plus reassembly of packets out of a byte stream that also carries talk.
pub mod command;
pub mod frame;
pub mod packet;

pub use command::{Color, Command, CommandKind, Move, Query, MOVE_COLOR_MASK, MOVE_POINT_MASK};
pub use frame::{ByteEvent, FrameAssembler};
pub use packet::{Packet, PacketError, PACKET_LEN};
