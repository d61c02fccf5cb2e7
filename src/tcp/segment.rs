use bitflags::bitflags;

use super::sequence::WrappingInt32;

bitflags! {
    /// Control bits carried by a segment.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        const FIN = 0b0001;
        const SYN = 0b0010;
        const RST = 0b0100;
        const ACK = 0b1000;
    }
}

/// An already-parsed TCP segment.
///
/// Ports, options and checksums belong to the wire layer; the core only ever
/// sees these fields. `ackno` is meaningful only when `Flags::ACK` is set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Segment {
    pub flags: Flags,
    pub seqno: WrappingInt32,
    pub ackno: WrappingInt32,
    pub window: u16,
    pub payload: Vec<u8>,
}

impl Segment {
    pub fn syn(&self) -> bool {
        self.flags.contains(Flags::SYN)
    }

    pub fn fin(&self) -> bool {
        self.flags.contains(Flags::FIN)
    }

    pub fn rst(&self) -> bool {
        self.flags.contains(Flags::RST)
    }

    pub fn ack(&self) -> bool {
        self.flags.contains(Flags::ACK)
    }

    /// Payload length plus one unit each for SYN and FIN.
    pub fn length_in_sequence_space(&self) -> u64 {
        self.payload.len() as u64 + u64::from(self.syn()) + u64::from(self.fin())
    }
}
