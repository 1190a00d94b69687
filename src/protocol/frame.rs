use crate::protocol::packet::{is_start_byte, is_talk_byte, Packet, PacketError, PACKET_LEN};

/// what a single inbound byte turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteEvent {
    /// a talk character
    Talk(char),
    /// a packet start or body byte; the packet is not complete yet
    Partial,
    /// a start byte cut off an unfinished packet
    Restart,
    /// the fourth byte of a packet arrived
    Frame(Result<Packet, PacketError>),
    /// a packet body byte without a preceding start byte
    Noise,
}

/// Reassembles 4-byte packets from a stream that interleaves them with
/// talk characters.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: [u8; PACKET_LEN],
    /// bytes still missing from the current packet
    pending: usize,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) -> ByteEvent {
        if is_talk_byte(byte) {
            return ByteEvent::Talk(byte as char);
        }
        if is_start_byte(byte) {
            let restarted = self.pending > 0;
            self.buffer[0] = byte;
            self.pending = PACKET_LEN - 1;
            return if restarted {
                ByteEvent::Restart
            } else {
                ByteEvent::Partial
            };
        }
        if self.pending == 0 {
            return ByteEvent::Noise;
        }
        self.buffer[PACKET_LEN - self.pending] = byte;
        self.pending -= 1;
        if self.pending > 0 {
            ByteEvent::Partial
        } else {
            ByteEvent::Frame(Packet::decode(&self.buffer))
        }
    }
}
