//! Wire format of a GMP packet.
//!
//! ```text
//!  byte 0   0 0 0 0 0 0 A S    S: sequence bit, A: acknowledge bit
//!  byte 1   1 c c c c c c c    checksum: (byte0 + byte2 + byte3) | 0x80
//!  byte 2   1 k k k 0 v v v    k: command kind, v: value bits 9..7
//!  byte 3   1 v v v v v v v    v: value bits 6..0
//! ```
//!
//! Byte 0 is always below 4 so a receiver can find the start of a packet
//! in a stream that also carries 7-bit talk characters.
use crate::protocol::command::{Command, CommandKind, VALUE_MASK};
use thiserror::Error;

pub const PACKET_LEN: usize = 4;

const SEQ_BIT: u8 = 0x01;
const ACK_BIT: u8 = 0x02;
const FRAMING_BIT: u8 = 0x80;

/// A decoded packet: one command plus the two sequencing bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub seq: bool,
    pub ack: bool,
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("bad checksum: expected {expected:#04x}, got {actual:#04x}")]
    BadChecksum { expected: u8, actual: u8 },
    #[error("first byte {0:#04x} is not a packet start")]
    NotAStart(u8),
}

impl Packet {
    pub fn new(seq: bool, ack: bool, command: Command) -> Self {
        Packet { seq, ack, command }
    }

    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let value = self.command.value & VALUE_MASK;
        let mut bytes = [0u8; PACKET_LEN];
        if self.seq {
            bytes[0] |= SEQ_BIT;
        }
        if self.ack {
            bytes[0] |= ACK_BIT;
        }
        bytes[2] = FRAMING_BIT | (self.command.kind.code() << 4) | (value >> 7) as u8;
        bytes[3] = FRAMING_BIT | (value & 0x7f) as u8;
        bytes[1] = checksum(bytes[0], bytes[2], bytes[3]);
        bytes
    }

    pub fn decode(bytes: &[u8; PACKET_LEN]) -> Result<Self, PacketError> {
        if !is_start_byte(bytes[0]) {
            Err(PacketError::NotAStart(bytes[0]))?
        }
        let expected = checksum(bytes[0], bytes[2], bytes[3]);
        if expected != bytes[1] {
            Err(PacketError::BadChecksum {
                expected,
                actual: bytes[1],
            })?
        }
        let kind = CommandKind::from_code(bytes[2] >> 4);
        let value = (((bytes[2] & 0x07) as u16) << 7) | (bytes[3] & 0x7f) as u16;
        Ok(Packet {
            seq: bytes[0] & SEQ_BIT != 0,
            ack: bytes[0] & ACK_BIT != 0,
            command: Command::new(kind, value),
        })
    }
}

#[inline]
pub fn checksum(b0: u8, b2: u8, b3: u8) -> u8 {
    b0.wrapping_add(b2).wrapping_add(b3) | FRAMING_BIT
}

/// values 0..=3 open a new packet
#[inline]
pub fn is_start_byte(byte: u8) -> bool {
    byte < 4
}

/// values 4..=127 are talk characters
#[inline]
pub fn is_talk_byte(byte: u8) -> bool {
    byte > 3 && byte < 128
}

/// bit pattern of a byte, used for wire tracing
pub fn format_bits(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:08b}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod test_packet {
    use super::*;

    #[test]
    fn test_round_trip() {
        for kind in CommandKind::ALL {
            for value in 0..=VALUE_MASK {
                for (seq, ack) in [(false, false), (true, false), (false, true), (true, true)] {
                    let packet = Packet::new(seq, ack, Command::new(kind, value));
                    let bytes = packet.encode();
                    assert!(is_start_byte(bytes[0]));
                    assert!(bytes[1..].iter().all(|b| b & FRAMING_BIT != 0));
                    assert_eq!(Packet::decode(&bytes), Ok(packet));
                }
            }
        }
    }

    #[test]
    fn test_checksum_rejected() {
        let bytes = Packet::new(true, false, Command::undo(1)).encode();
        for wrong in 0..=255u8 {
            if wrong == bytes[1] {
                continue;
            }
            let corrupted = [bytes[0], wrong, bytes[2], bytes[3]];
            assert!(matches!(
                Packet::decode(&corrupted),
                Err(PacketError::BadChecksum { .. })
            ));
        }
    }

    #[test]
    fn test_known_bytes() {
        // MOVE black at value 0x0b5, seq set, ack clear
        let bytes = Packet::new(true, false, Command::new(CommandKind::Move, 0x0b5)).encode();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[2], 0x80 | (5 << 4) | 0x01);
        assert_eq!(bytes[3], 0x80 | 0x35);
        assert_eq!(bytes[1], (0x01u8.wrapping_add(bytes[2]).wrapping_add(bytes[3])) | 0x80);
    }

    #[test]
    fn test_byte_classes() {
        assert!((0..4).all(is_start_byte));
        assert!((4..128).all(is_talk_byte));
        assert!((128..=255).all(|b| !is_start_byte(b) && !is_talk_byte(b)));
    }

    #[test]
    fn test_format_bits() {
        assert_eq!(format_bits(&[1, 0x80]), "00000001 10000000");
    }
}
