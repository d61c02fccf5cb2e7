use super::sequence::WrappingInt32;

pub const DEFAULT_CAPACITY: usize = 64000;
pub const MAX_PAYLOAD_SIZE: usize = 1000;
pub const TIMEOUT_DFLT: u64 = 1000;
pub const MAX_RETX_ATTEMPTS: u32 = 8;

/// Knobs for one connection.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Receive buffer size, which is also the largest window ever advertised.
    pub recv_capacity: usize,
    /// Outbound buffer size; `write` truncates once it is full.
    pub send_capacity: usize,
    /// Initial retransmission timeout, in milliseconds.
    pub rt_timeout: u64,
    /// Consecutive retransmissions tolerated before the connection resets.
    pub max_retx_attempts: u32,
    /// Largest payload put in a single segment.
    pub max_payload_size: usize,
    /// Initial sequence number to use instead of a generated one.
    pub fixed_isn: Option<WrappingInt32>,
    /// Also back off when a zero-window probe goes unanswered.
    pub backoff_zero_window: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            recv_capacity: DEFAULT_CAPACITY,
            send_capacity: DEFAULT_CAPACITY,
            rt_timeout: TIMEOUT_DFLT,
            max_retx_attempts: MAX_RETX_ATTEMPTS,
            max_payload_size: MAX_PAYLOAD_SIZE,
            fixed_isn: None,
            backoff_zero_window: false,
        }
    }
}
