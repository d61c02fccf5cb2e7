//! IPv4 + TCP framing for segments, on top of `etherparse`.
use std::io::{self, Write};

use etherparse::{IpNumber, Ipv4Header, Ipv4HeaderSlice, TcpHeader, TcpHeaderSlice};
use thiserror::Error;

use crate::tcp::segment::{Flags, Segment};
use crate::tcp::sequence::WrappingInt32;
use crate::tcp::Tcp4Tuple;

const TTL: u8 = 64;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed ipv4 header: {0}")]
    Ip(String),
    #[error("malformed tcp header: {0}")]
    Tcp(String),
    #[error("not a tcp datagram")]
    NotTcp,
    #[error("bad tcp checksum")]
    Checksum,
    #[error("datagram too large: {0}")]
    TooLarge(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<WireError> for io::Error {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Io(err) => err,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// A parsed TCP datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub quad: Tcp4Tuple,
    pub segment: Segment,
}

/// Parse an IPv4 datagram carrying TCP.
pub fn parse(buf: &[u8]) -> Result<Datagram, WireError> {
    let ip = Ipv4HeaderSlice::from_slice(buf).map_err(|e| WireError::Ip(e.to_string()))?;
    if ip.protocol() != IpNumber::TCP {
        return Err(WireError::NotTcp);
    }
    let ip_len = ip.slice().len();
    let end = std::cmp::min(buf.len(), usize::from(ip.total_len()));
    if end < ip_len {
        return Err(WireError::Ip("total length shorter than header".into()));
    }

    let tcp = TcpHeaderSlice::from_slice(&buf[ip_len..end])
        .map_err(|e| WireError::Tcp(e.to_string()))?;
    let data = &buf[ip_len + tcp.slice().len()..end];

    let header = tcp.to_header();
    let expected = header
        .calc_checksum_ipv4(&ip.to_header(), data)
        .map_err(|e| WireError::TooLarge(e.to_string()))?;
    if expected != tcp.checksum() {
        return Err(WireError::Checksum);
    }

    let mut flags = Flags::empty();
    flags.set(Flags::SYN, tcp.syn());
    flags.set(Flags::ACK, tcp.ack());
    flags.set(Flags::FIN, tcp.fin());
    flags.set(Flags::RST, tcp.rst());

    Ok(Datagram {
        quad: Tcp4Tuple {
            src: (ip.source_addr(), tcp.source_port()),
            dst: (ip.destination_addr(), tcp.destination_port()),
        },
        segment: Segment {
            flags,
            seqno: WrappingInt32::new(tcp.sequence_number()),
            ackno: WrappingInt32::new(tcp.acknowledgment_number()),
            window: tcp.window_size(),
            payload: data.to_vec(),
        },
    })
}

/// Build the IPv4 datagram for `seg` travelling from `quad.src` to
/// `quad.dst`.
pub fn serialize(quad: &Tcp4Tuple, seg: &Segment) -> Result<Vec<u8>, WireError> {
    let mut tcp = TcpHeader::new(quad.src.1, quad.dst.1, seg.seqno.raw_value(), seg.window);
    tcp.syn = seg.syn();
    tcp.ack = seg.ack();
    tcp.fin = seg.fin();
    tcp.rst = seg.rst();
    tcp.acknowledgment_number = seg.ackno.raw_value();

    let payload_len = tcp.header_len() as usize + seg.payload.len();
    let ip = Ipv4Header::new(
        u16::try_from(payload_len).map_err(|e| WireError::TooLarge(e.to_string()))?,
        TTL,
        IpNumber::TCP,
        quad.src.0.octets(),
        quad.dst.0.octets(),
    )
    .map_err(|e| WireError::TooLarge(e.to_string()))?;

    tcp.checksum = tcp
        .calc_checksum_ipv4(&ip, &seg.payload)
        .map_err(|e| WireError::TooLarge(e.to_string()))?;

    let mut buf = Vec::with_capacity(ip.header_len() as usize + payload_len);
    ip.write(&mut buf)?;
    tcp.write(&mut buf)?;
    buf.write_all(&seg.payload)?;
    Ok(buf)
}
