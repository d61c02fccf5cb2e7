use log::trace;

use super::byte_stream::ByteStream;
use super::reassembler::StreamReassembler;
use super::segment::Segment;
use super::sequence::WrappingInt32;
use super::state::ReceiverState;

/// The receiving half of a connection.
///
/// Turns incoming segments into stream writes through a `StreamReassembler`
/// and reports the ackno and window to put on outgoing segments.
#[derive(Debug)]
pub struct Receiver {
    reassembler: StreamReassembler,
    capacity: usize,
    isn: Option<WrappingInt32>,
}

impl Receiver {
    pub fn new(capacity: usize) -> Self {
        Self {
            reassembler: StreamReassembler::new(capacity),
            capacity,
            isn: None,
        }
    }

    /// Hand a segment to the receiver. Nothing is accepted before the SYN.
    pub fn segment_received(&mut self, seg: &Segment) {
        if seg.syn() && self.isn.is_none() {
            trace!("peer isn {}", seg.seqno);
            self.isn = Some(seg.seqno);
        }
        let Some(isn) = self.isn else {
            return;
        };

        let checkpoint = self.reassembler.first_unassembled();
        let abs_seqno = seg.seqno.unwrap(isn, checkpoint);
        // The SYN occupies absolute seqno 0; payload starts right after it.
        let index = if seg.syn() {
            abs_seqno
        } else if abs_seqno == 0 {
            return;
        } else {
            abs_seqno - 1
        };

        self.reassembler.insert(&seg.payload, index, seg.fin());
    }

    /// The next seqno the peer should send, once a SYN has been seen.
    pub fn ackno(&self) -> Option<WrappingInt32> {
        let isn = self.isn?;
        let stream = self.reassembler.stream_out();
        let abs_ackno = stream.bytes_written() + 1 + u64::from(stream.input_ended());
        Some(WrappingInt32::wrap(abs_ackno, isn))
    }

    /// Room left in the receive buffer, as advertised to the peer.
    pub fn window_size(&self) -> usize {
        self.capacity - self.reassembler.stream_out().buffer_size()
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.reassembler.unassembled_bytes()
    }

    pub fn stream_out(&self) -> &ByteStream {
        self.reassembler.stream_out()
    }

    pub fn stream_out_mut(&mut self) -> &mut ByteStream {
        self.reassembler.stream_out_mut()
    }

    pub fn state(&self) -> ReceiverState {
        let stream = self.stream_out();
        if stream.error() {
            ReceiverState::Error
        } else if self.isn.is_none() {
            ReceiverState::Listen
        } else if stream.input_ended() {
            ReceiverState::FinReceived
        } else {
            ReceiverState::SynReceived
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcp::segment::Flags;

    const ISN: WrappingInt32 = WrappingInt32::new(u32::MAX - 2);

    fn seg(flags: Flags, seqno: WrappingInt32, payload: &[u8]) -> Segment {
        Segment {
            flags,
            seqno,
            payload: payload.to_vec(),
            ..Default::default()
        }
    }

    fn read_all(r: &mut Receiver) -> Vec<u8> {
        let n = r.stream_out().buffer_size();
        r.stream_out_mut().read(n)
    }

    #[test]
    fn no_ackno_before_syn() {
        let mut r = Receiver::new(4000);
        assert_eq!(r.ackno(), None);
        r.segment_received(&seg(Flags::empty(), ISN + 1, b"early"));
        assert_eq!(r.ackno(), None);
        assert_eq!(r.stream_out().bytes_written(), 0);
        assert_eq!(r.state(), ReceiverState::Listen);
        assert_eq!(r.window_size(), 4000);
    }

    #[test]
    fn syn_sets_ackno_to_isn_plus_one() {
        let mut r = Receiver::new(4000);
        r.segment_received(&seg(Flags::SYN, ISN, b""));
        assert_eq!(r.ackno(), Some(ISN + 1));
        assert_eq!(r.state(), ReceiverState::SynReceived);
    }

    #[test]
    fn ackno_advances_with_assembled_bytes_across_wrap() {
        let mut r = Receiver::new(4000);
        r.segment_received(&seg(Flags::SYN, ISN, b""));
        r.segment_received(&seg(Flags::empty(), ISN + 1, b"abcd"));
        assert_eq!(r.ackno(), Some(ISN + 5));
        r.segment_received(&seg(Flags::empty(), ISN + 9, b"ijkl"));
        assert_eq!(r.ackno(), Some(ISN + 5));
        assert_eq!(r.unassembled_bytes(), 4);
        r.segment_received(&seg(Flags::empty(), ISN + 5, b"efgh"));
        assert_eq!(r.ackno(), Some(ISN + 13));
        assert_eq!(read_all(&mut r), b"abcdefghijkl");
    }

    #[test]
    fn syn_may_carry_payload() {
        let mut r = Receiver::new(4000);
        r.segment_received(&seg(Flags::SYN, ISN, b"hi"));
        assert_eq!(r.ackno(), Some(ISN + 3));
        assert_eq!(read_all(&mut r), b"hi");
    }

    #[test]
    fn segment_claiming_syn_slot_is_dropped() {
        let mut r = Receiver::new(4000);
        r.segment_received(&seg(Flags::SYN, ISN, b""));
        r.segment_received(&seg(Flags::empty(), ISN, b"bogus"));
        assert_eq!(r.ackno(), Some(ISN + 1));
        assert_eq!(r.stream_out().bytes_written(), 0);
    }

    #[test]
    fn fin_counts_once_in_order() {
        let mut r = Receiver::new(4000);
        r.segment_received(&seg(Flags::SYN, ISN, b""));
        r.segment_received(&seg(Flags::FIN, ISN + 3, b""));
        assert_eq!(r.ackno(), Some(ISN + 1));
        r.segment_received(&seg(Flags::empty(), ISN + 1, b"ab"));
        assert_eq!(r.ackno(), Some(ISN + 4));
        assert_eq!(r.state(), ReceiverState::FinReceived);
        assert_eq!(read_all(&mut r), b"ab");
        assert!(r.stream_out().eof());
    }

    #[test]
    fn window_shrinks_until_application_reads() {
        let mut r = Receiver::new(10);
        r.segment_received(&seg(Flags::SYN, ISN, b""));
        r.segment_received(&seg(Flags::empty(), ISN + 1, b"abcdef"));
        assert_eq!(r.window_size(), 4);
        r.stream_out_mut().read(4);
        assert_eq!(r.window_size(), 8);
    }

    #[test]
    fn later_syn_does_not_relatch() {
        let mut r = Receiver::new(100);
        r.segment_received(&seg(Flags::SYN, ISN, b""));
        r.segment_received(&seg(Flags::SYN, WrappingInt32::new(5), b""));
        assert_eq!(r.ackno(), Some(ISN + 1));
    }
}
