use bitflags::bitflags;

bitflags! {
    /// What the application can do on a connection without waiting.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Available: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
    }
}

/// Progress of the sending half, read off the sender's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Nothing sent yet.
    Closed,
    /// SYN sent and not acknowledged.
    SynSent,
    /// SYN acknowledged, FIN not yet sent.
    SynAcked,
    /// FIN sent and not fully acknowledged.
    FinSent,
    /// Everything up to and including FIN acknowledged.
    FinAcked,
    /// Outbound stream errored.
    Error,
}

/// Progress of the receiving half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// No SYN seen.
    Listen,
    /// SYN seen, stream still open.
    SynReceived,
    /// FIN assembled in order; the inbound stream is complete.
    FinReceived,
    /// Inbound stream errored.
    Error,
}

/// A connection progresses through a series of states during its lifetime.
/// Briefly, the meanings of the states are:
///
/// - `Listen`: Represents waiting for a connection request from any remote
///   TCP and port.
///
/// - `SynSent`: Represents waiting for a matching connection request
///   after having sent a connection request.
///
/// - `SynReceived`: Represents waiting for a confirming connection
///   request acknowledgment after having both received and sent a
///   connection request.
///
/// - `Established`: Represents an open connection, data received can be
///   delivered to the user. The normal state for the data transfer phase
///   of the connection.
///
/// - `FinWait1`: Represents waiting for a connection termination request
///   from the remote TCP, or an acknowledgment of the connection
///   termination request previously sent.
///
/// - `FinWait2`: Represents waiting for a connection termination request
///   from the remote TCP.
///
/// - `CloseWait`: Represents waiting for a connection termination request
///   from the local user.
///
/// - `Closing`: Represents waiting for a connection termination request
///   acknowledgment from the remote TCP.
///
/// - `LastAck`: Represents waiting for an acknowledgment of the
///   connection termination request previously sent to the remote TCP
///   (which includes an acknowledgment of its connection termination
///   request).
///
/// - `TimeWait`: Represents waiting for enough time to pass to be sure
///   the remote TCP received the acknowledgment of its connection
///   termination request.
///
/// - `Closed`: Represents no connection state at all.
///
/// - `Reset`: The connection was torn down by a RST, sent or received.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum State {
    #[default]
    Closed,
    Listen,
    SynSent,
    SynReceived,
    Established,
    FinWait1,
    FinWait2,
    Closing,
    TimeWait,
    CloseWait,
    LastAck,
    Reset,
}

impl State {
    /// The connection state implied by the progress of both halves.
    ///
    /// `linger` is whether the connection still has to wait out TIME-WAIT
    /// after both streams finish; it is dropped when the peer closed first.
    pub fn derive(
        sender: SenderState,
        receiver: ReceiverState,
        active: bool,
        linger: bool,
    ) -> State {
        use ReceiverState as R;
        use SenderState as S;

        if sender == S::Error || receiver == R::Error {
            return State::Reset;
        }
        if !active {
            return State::Closed;
        }
        match (receiver, sender) {
            (R::Listen, S::Closed) => State::Listen,
            (R::Listen, _) => State::SynSent,
            (R::SynReceived, S::Closed | S::SynSent) => State::SynReceived,
            (R::SynReceived, S::SynAcked) => State::Established,
            (R::SynReceived, S::FinSent) => State::FinWait1,
            (R::SynReceived, S::FinAcked) => State::FinWait2,
            (R::FinReceived, S::Closed | S::SynSent) => State::SynReceived,
            (R::FinReceived, S::SynAcked) => State::CloseWait,
            (R::FinReceived, S::FinSent) if linger => State::Closing,
            (R::FinReceived, S::FinSent) => State::LastAck,
            (R::FinReceived, S::FinAcked) if linger => State::TimeWait,
            (R::FinReceived, S::FinAcked) => State::Closed,
            (_, S::Error) | (R::Error, _) => State::Reset,
        }
    }
}
