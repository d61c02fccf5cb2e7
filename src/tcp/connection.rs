use std::collections::VecDeque;

use log::{debug, trace, warn};

use super::byte_stream::ByteStream;
use super::config::TcpConfig;
use super::receiver::Receiver;
use super::segment::{Flags, Segment};
use super::sender::Sender;
use super::state::{SenderState, State};

/// How many initial RTOs a lingering connection waits after the last segment
/// before it considers the peer done with it.
const LINGER_RTO_MULTIPLE: u64 = 10;

/// A full-duplex TCP endpoint: one `Sender`, one `Receiver`, and the glue
/// that runs the handshake and teardown between them.
///
/// It never touches a clock or a socket. The driver feeds it segments and
/// ticks, and drains `segments_out` onto the wire.
#[derive(Debug)]
pub struct Connection {
    config: TcpConfig,
    sender: Sender,
    receiver: Receiver,
    segments_out: VecDeque<Segment>,
    /// Wait out TIME-WAIT after both streams finish. Cleared when the peer
    /// closes first.
    linger_after_streams_finish: bool,
    active: bool,
    time_since_last_segment_received: u64,
}

impl Connection {
    pub fn new(config: TcpConfig) -> Self {
        Self {
            sender: Sender::new(&config),
            receiver: Receiver::new(config.recv_capacity),
            config,
            segments_out: VecDeque::new(),
            linger_after_streams_finish: true,
            active: true,
            time_since_last_segment_received: 0,
        }
    }

    /// Active open: send the SYN.
    pub fn connect(&mut self) {
        if self.sender.state() != SenderState::Closed {
            return;
        }
        debug!("connecting, isn {}", self.sender.isn());
        self.sender.fill_window();
        self.flush();
    }

    /// Queue application data and send what the window allows. Returns the
    /// number of bytes accepted.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n = self.sender.stream_in_mut().write(data);
        self.push_outbound();
        n
    }

    /// No more application data will be written.
    pub fn end_input_stream(&mut self) {
        self.sender.stream_in_mut().end_input();
        self.push_outbound();
    }

    pub fn remaining_outbound_capacity(&self) -> usize {
        self.sender.stream_in().remaining_capacity()
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.sender.bytes_in_flight()
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.receiver.unassembled_bytes()
    }

    pub fn time_since_last_segment_received(&self) -> u64 {
        self.time_since_last_segment_received
    }

    /// Whether the connection still needs servicing.
    pub fn active(&self) -> bool {
        self.active
    }

    pub fn state(&self) -> State {
        State::derive(
            self.sender.state(),
            self.receiver.state(),
            self.active,
            self.linger_after_streams_finish,
        )
    }

    pub fn inbound_stream(&self) -> &ByteStream {
        self.receiver.stream_out()
    }

    pub fn inbound_stream_mut(&mut self) -> &mut ByteStream {
        self.receiver.stream_out_mut()
    }

    pub fn outbound_stream(&self) -> &ByteStream {
        self.sender.stream_in()
    }

    /// Segments ready for the wire, already stamped with ackno and window.
    pub fn segments_out(&mut self) -> &mut VecDeque<Segment> {
        &mut self.segments_out
    }

    pub fn segment_received(&mut self, seg: &Segment) {
        if !self.active {
            return;
        }
        self.time_since_last_segment_received = 0;

        let state = self.state();
        trace!(
            "{:?} received {:?} seqno {} ackno {} win {} len {}",
            state,
            seg.flags,
            seg.seqno,
            seg.ackno,
            seg.window,
            seg.payload.len()
        );

        if seg.rst() {
            debug!("connection reset by peer in {:?}", state);
            self.set_reset();
            return;
        }
        if matches!(state, State::Listen | State::SynSent) && !seg.syn() {
            return;
        }

        let fin_sent_before = matches!(
            self.sender.state(),
            SenderState::FinSent | SenderState::FinAcked
        );
        if !matches!(state, State::TimeWait | State::CloseWait) {
            self.receiver.segment_received(seg);
        }
        if seg.ack() && self.sender.next_seqno_absolute() > 0 {
            self.sender.ack_received(seg.ackno, seg.window);
        }
        if seg.syn() && self.sender.state() == SenderState::Closed {
            // Passive open: our SYN goes out carrying the ACK of theirs.
            self.sender.fill_window();
        }

        // The peer finished before our FIN went out: we are the passive closer.
        if self.receiver.stream_out().input_ended() && !fin_sent_before {
            self.linger_after_streams_finish = false;
        }

        let keep_alive = seg.length_in_sequence_space() == 0
            && self.receiver.ackno().map_or(false, |ackno| seg.seqno == ackno - 1);
        let occupies_space = seg.length_in_sequence_space() > 0;
        if (occupies_space || keep_alive) && self.sender.segments_out().is_empty() {
            self.sender.send_empty_segment();
        }

        self.flush();

        let next = self.state();
        if next != state {
            debug!("{:?} -> {:?}", state, next);
        }
    }

    /// Advance time by `ms_since_last_tick` milliseconds.
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        if !self.active {
            return;
        }
        self.time_since_last_segment_received += ms_since_last_tick;
        self.sender.tick(ms_since_last_tick);

        if self.sender.consecutive_retransmissions() > self.config.max_retx_attempts {
            warn!(
                "giving up after {} retransmissions",
                self.sender.consecutive_retransmissions()
            );
            self.sender.segments_out().clear();
            self.send_rst();
            return;
        }
        self.flush();
    }

    /// Tear the connection down now, telling the peer with a RST.
    pub fn abort(&mut self) {
        if self.active {
            self.send_rst();
        }
    }

    fn push_outbound(&mut self) {
        // Before the handshake starts there is nothing to push to.
        if self.sender.state() == SenderState::Closed {
            return;
        }
        self.sender.fill_window();
        self.flush();
    }

    fn send_rst(&mut self) {
        let mut rst = self.sender.empty_segment();
        rst.flags |= Flags::RST;
        self.sender.segments_out().push_back(rst);
        self.flush();
        self.set_reset();
    }

    fn set_reset(&mut self) {
        self.sender.stream_in_mut().set_error();
        self.receiver.stream_out_mut().set_error();
        self.linger_after_streams_finish = false;
        self.active = false;
    }

    /// Move the sender's segments to our queue, stamping ackno and window.
    fn flush(&mut self) {
        let window = u16::try_from(self.receiver.window_size()).unwrap_or(u16::MAX);
        while let Some(mut seg) = self.sender.segments_out().pop_front() {
            if let Some(ackno) = self.receiver.ackno() {
                seg.flags |= Flags::ACK;
                seg.ackno = ackno;
            }
            seg.window = window;
            self.segments_out.push_back(seg);
        }
        self.check_clean_shutdown();
    }

    fn check_clean_shutdown(&mut self) {
        let inbound_done =
            self.receiver.stream_out().input_ended() && self.receiver.unassembled_bytes() == 0;
        let outbound_done = self.sender.state() == SenderState::FinAcked;
        if !(self.active && inbound_done && outbound_done) {
            return;
        }
        if !self.linger_after_streams_finish {
            debug!("closed without lingering");
            self.active = false;
        } else if self.time_since_last_segment_received
            >= LINGER_RTO_MULTIPLE * self.config.rt_timeout
        {
            debug!("linger finished");
            self.active = false;
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.active {
            warn!("unclean shutdown of connection in {:?}", self.state());
        }
    }
}
