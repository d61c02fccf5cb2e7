use std::net::Ipv4Addr;

pub mod byte_stream;
pub mod config;
pub mod connection;
pub mod isn;
pub mod reassembler;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod sequence;
pub mod state;

/// Addresses and ports of a segment, as seen on the wire.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct Tcp4Tuple {
    pub src: (Ipv4Addr, u16),
    pub dst: (Ipv4Addr, u16),
}

impl Tcp4Tuple {
    /// The same connection seen from the other end.
    pub fn reversed(&self) -> Self {
        Self {
            src: self.dst,
            dst: self.src,
        }
    }
}
