use std::cmp::{max, min};
use std::collections::VecDeque;

use log::trace;

use super::byte_stream::ByteStream;
use super::config::TcpConfig;
use super::isn::IsnGenerator;
use super::segment::{Flags, Segment};
use super::sequence::WrappingInt32;
use super::state::SenderState;

/// A segment that has been sent and not yet fully acknowledged.
///
/// Everything it needs is copied in when it is sent; it keeps no link back to
/// the sender.
#[derive(Debug, Clone)]
struct Outstanding {
    segment: Segment,
    /// Absolute seqno at which the whole segment counts as acknowledged.
    ack_end: u64,
    /// Sender clock reading at which it is due for retransmission.
    deadline: u64,
    rto: u64,
    /// Sent while the peer advertised a zero window.
    probe: bool,
}

/// The sending half of a connection.
///
/// Reads the outbound `ByteStream`, cuts it into segments that fit the peer's
/// window, and keeps every sent segment until it is acknowledged, resending
/// it when its timer runs out. Time only moves through `tick`.
#[derive(Debug)]
pub struct Sender {
    isn: WrappingInt32,
    segments_out: VecDeque<Segment>,
    stream: ByteStream,
    outstanding: VecDeque<Outstanding>,
    initial_rto: u64,
    rto: u64,
    /// Milliseconds since the sender was created.
    clock: u64,
    next_seqno: u64,
    next_ackno: u64,
    /// Sequence space the peer still has room for.
    window: u64,
    zero_window: bool,
    consecutive_retransmissions: u32,
    max_payload_size: usize,
    backoff_zero_window: bool,
}

impl Sender {
    pub fn new(config: &TcpConfig) -> Self {
        Self {
            isn: config.fixed_isn.unwrap_or_else(IsnGenerator::random),
            segments_out: VecDeque::new(),
            stream: ByteStream::new(config.send_capacity),
            outstanding: VecDeque::new(),
            initial_rto: config.rt_timeout,
            rto: config.rt_timeout,
            clock: 0,
            next_seqno: 0,
            next_ackno: 0,
            window: 1,
            zero_window: false,
            consecutive_retransmissions: 0,
            max_payload_size: config.max_payload_size,
            backoff_zero_window: config.backoff_zero_window,
        }
    }

    pub fn stream_in(&self) -> &ByteStream {
        &self.stream
    }

    pub fn stream_in_mut(&mut self) -> &mut ByteStream {
        &mut self.stream
    }

    /// Send as much as the window allows.
    ///
    /// The very first call sends a bare SYN and nothing else. Later calls
    /// carve the outbound stream into segments and attach FIN once the stream
    /// has ended and there is room for it.
    pub fn fill_window(&mut self) {
        if self.next_seqno == 0 {
            self.send_segment(Flags::SYN, Vec::new());
            return;
        }
        if self.fin_sent() {
            return;
        }

        while self.window > 0 {
            let room = min(self.window, self.max_payload_size as u64) as usize;
            let payload = self.stream.read(min(room, self.stream.buffer_size()));
            let mut flags = Flags::empty();
            if self.stream.eof() && (payload.len() as u64) < self.window {
                flags |= Flags::FIN;
            }
            if payload.is_empty() && flags.is_empty() {
                break;
            }
            self.send_segment(flags, payload);
            if flags.contains(Flags::FIN) {
                break;
            }
        }
    }

    /// Process an acknowledgment and window advertisement from the peer.
    ///
    /// An ackno for data never sent is ignored, and so is one older than the
    /// newest seen, window included.
    pub fn ack_received(&mut self, ackno: WrappingInt32, window_size: u16) {
        let abs_ackno = ackno.unwrap(self.isn, self.next_seqno);
        if abs_ackno > self.next_seqno {
            trace!("ignoring ack {} beyond next seqno {}", abs_ackno, self.next_seqno);
            return;
        }
        if abs_ackno < self.next_ackno {
            trace!("ignoring stale ack {} behind {}", abs_ackno, self.next_ackno);
            return;
        }

        let mut progressed = false;
        while let Some(front) = self.outstanding.front() {
            if front.ack_end > abs_ackno {
                break;
            }
            trace!("segment {} acknowledged", front.segment.seqno);
            self.outstanding.pop_front();
            progressed = true;
        }
        if progressed {
            self.consecutive_retransmissions = 0;
            self.rto = self.initial_rto;
            for entry in self.outstanding.iter_mut() {
                entry.rto = self.initial_rto;
                entry.deadline = self.clock + self.initial_rto;
            }
        }

        self.next_ackno = abs_ackno;
        self.zero_window = window_size == 0;
        let advertised = max(u64::from(window_size), 1);
        self.window = advertised.saturating_sub(self.bytes_in_flight());

        self.fill_window();
    }

    /// Advance the clock and resend whatever timed out.
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        self.clock += ms_since_last_tick;

        let mut fired = false;
        for entry in self.outstanding.iter_mut() {
            if entry.deadline > self.clock {
                continue;
            }
            trace!("retransmitting {} after {}ms", entry.segment.seqno, entry.rto);
            self.segments_out.push_back(entry.segment.clone());
            if !entry.probe || self.backoff_zero_window {
                entry.rto *= 2;
            }
            entry.deadline = self.clock + entry.rto;
            self.rto = max(self.rto, entry.rto);
            fired = true;
        }
        if fired {
            self.consecutive_retransmissions += 1;
        }
    }

    /// A flagless, payload-free segment at the next seqno. Not tracked.
    pub fn empty_segment(&self) -> Segment {
        Segment {
            seqno: self.next_seqno(),
            ..Default::default()
        }
    }

    /// Queue an empty segment, typically to carry an ACK.
    pub fn send_empty_segment(&mut self) {
        let segment = self.empty_segment();
        self.segments_out.push_back(segment);
    }

    /// Sequence space sent but not yet acknowledged, SYN and FIN included.
    pub fn bytes_in_flight(&self) -> u64 {
        self.next_seqno - self.next_ackno
    }

    pub fn consecutive_retransmissions(&self) -> u32 {
        self.consecutive_retransmissions
    }

    /// Current retransmission timeout in milliseconds.
    pub fn rto(&self) -> u64 {
        self.outstanding.front().map_or(self.rto, |entry| entry.rto)
    }

    pub fn segments_out(&mut self) -> &mut VecDeque<Segment> {
        &mut self.segments_out
    }

    pub fn isn(&self) -> WrappingInt32 {
        self.isn
    }

    pub fn next_seqno_absolute(&self) -> u64 {
        self.next_seqno
    }

    pub fn next_seqno(&self) -> WrappingInt32 {
        WrappingInt32::wrap(self.next_seqno, self.isn)
    }

    pub fn state(&self) -> SenderState {
        if self.stream.error() {
            SenderState::Error
        } else if self.next_seqno == 0 {
            SenderState::Closed
        } else if self.next_seqno == self.bytes_in_flight() {
            SenderState::SynSent
        } else if !self.fin_sent() {
            SenderState::SynAcked
        } else if self.bytes_in_flight() > 0 {
            SenderState::FinSent
        } else {
            SenderState::FinAcked
        }
    }

    fn fin_sent(&self) -> bool {
        self.stream.eof() && self.next_seqno == self.stream.bytes_written() + 2
    }

    fn send_segment(&mut self, flags: Flags, payload: Vec<u8>) {
        let segment = Segment {
            flags,
            seqno: self.next_seqno(),
            payload,
            ..Default::default()
        };
        let len = segment.length_in_sequence_space();
        trace!("sending {:?} seqno {} len {}", flags, segment.seqno, len);

        self.outstanding.push_back(Outstanding {
            segment: segment.clone(),
            ack_end: self.next_seqno + len,
            deadline: self.clock + self.rto,
            rto: self.rto,
            probe: self.zero_window,
        });
        self.segments_out.push_back(segment);
        self.next_seqno += len;
        self.window = self.window.saturating_sub(len);
    }
}
