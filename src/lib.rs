use std::io;
use std::net::SocketAddrV4;
use std::time::{Duration, Instant};

use log::{debug, info, trace};

pub mod device;
pub mod tcp;
pub mod wire;

pub use device::Device;
pub use tcp::{
    byte_stream::ByteStream,
    config::TcpConfig,
    connection::Connection,
    isn::IsnGenerator,
    segment::{Flags, Segment},
    sequence::WrappingInt32,
    state::{Available, State},
    Tcp4Tuple,
};

const BUFFER_SIZE: usize = 1504;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Drives a single connection over a `Device`.
///
/// All protocol work happens inside `Connection`; this only moves datagrams
/// between it and the device and turns wall-clock time into ticks. Reads and
/// writes block by running the same loop until they can make progress.
pub struct Interface<D: Device> {
    dev: D,
    /// Local end in `src`, peer in `dst`.
    quad: Tcp4Tuple,
    conn: Connection,
    last_tick: Instant,
    buf: Vec<u8>,
}

impl<D: Device> Interface<D> {
    /// Open a connection to `remote`.
    pub fn connect(
        dev: D,
        mut config: TcpConfig,
        local: SocketAddrV4,
        remote: SocketAddrV4,
    ) -> io::Result<Self> {
        let quad = Tcp4Tuple {
            src: (*local.ip(), local.port()),
            dst: (*remote.ip(), remote.port()),
        };
        config
            .fixed_isn
            .get_or_insert_with(|| IsnGenerator::new().isn(&quad));

        let mut iface = Self::new(dev, quad, Connection::new(config));
        info!("connecting {}:{} -> {}", local.ip(), local.port(), remote);
        iface.conn.connect();
        iface.transmit()?;
        Ok(iface)
    }

    /// Wait for a SYN addressed to `local` and answer it.
    pub fn accept(mut dev: D, mut config: TcpConfig, local: SocketAddrV4) -> io::Result<Self> {
        let mut buf = vec![0u8; BUFFER_SIZE];
        loop {
            if !dev.poll_readable(POLL_INTERVAL)? {
                continue;
            }
            let nbytes = dev.recv(&mut buf)?;
            let datagram = match wire::parse(&buf[..nbytes]) {
                Ok(datagram) => datagram,
                Err(e) => {
                    debug!("ignoring datagram. len:{} err: {}", nbytes, e);
                    continue;
                }
            };
            let seg = &datagram.segment;
            if datagram.quad.dst != (*local.ip(), local.port()) || !seg.syn() || seg.ack() {
                trace!("not a connection request: {:?}", datagram.quad);
                continue;
            }

            let quad = datagram.quad.reversed();
            config
                .fixed_isn
                .get_or_insert_with(|| IsnGenerator::new().isn(&quad));
            info!(
                "accepted {}:{} -> {}:{}",
                quad.dst.0, quad.dst.1, quad.src.0, quad.src.1
            );

            let mut iface = Self::new(dev, quad, Connection::new(config));
            iface.conn.segment_received(seg);
            iface.transmit()?;
            return Ok(iface);
        }
    }

    fn new(dev: D, quad: Tcp4Tuple, conn: Connection) -> Self {
        Self {
            dev,
            quad,
            conn,
            last_tick: Instant::now(),
            buf: vec![0u8; BUFFER_SIZE],
        }
    }

    /// Run one round of the event loop: wait up to `timeout` for input,
    /// process everything that arrived, advance time and send what is due.
    pub fn poll(&mut self, timeout: Duration) -> io::Result<Available> {
        let mut wait = timeout;
        while self.dev.poll_readable(wait)? {
            let nbytes = self.dev.recv(&mut self.buf)?;
            self.on_datagram(nbytes);
            wait = Duration::ZERO;
        }

        let elapsed = self.last_tick.elapsed().as_millis() as u64;
        if elapsed > 0 {
            self.last_tick += Duration::from_millis(elapsed);
            self.conn.tick(elapsed);
        }

        self.transmit()?;
        Ok(self.availability())
    }

    /// Stop sending; the peer sees FIN once everything written is out.
    pub fn shutdown(&mut self) -> io::Result<()> {
        self.conn.end_input_stream();
        self.transmit()
    }

    /// Keep polling until the connection is fully closed or reset.
    pub fn wait_closed(&mut self) -> io::Result<()> {
        while self.conn.active() {
            self.poll(POLL_INTERVAL)?;
        }
        Ok(())
    }

    pub fn availability(&self) -> Available {
        let mut avail = Available::empty();
        let inbound = self.conn.inbound_stream();
        if !inbound.buffer_empty() || inbound.eof() || inbound.error() {
            avail |= Available::READ;
        }
        let outbound = self.conn.outbound_stream();
        if self.conn.active() && !outbound.input_ended() && outbound.remaining_capacity() > 0 {
            avail |= Available::WRITE;
        }
        avail
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn quad(&self) -> &Tcp4Tuple {
        &self.quad
    }

    pub fn is_active(&self) -> bool {
        self.conn.active()
    }

    fn on_datagram(&mut self, nbytes: usize) {
        match wire::parse(&self.buf[..nbytes]) {
            Ok(datagram) if datagram.quad == self.quad.reversed() => {
                self.conn.segment_received(&datagram.segment);
            }
            Ok(datagram) => debug!("not our connection: {:?}", datagram.quad),
            Err(e) => debug!("ignoring datagram. len:{} err: {}", nbytes, e),
        }
    }

    fn transmit(&mut self) -> io::Result<()> {
        while let Some(seg) = self.conn.segments_out().pop_front() {
            let bytes = wire::serialize(&self.quad, &seg)?;
            self.dev.send(&bytes)?;
        }
        Ok(())
    }
}

impl<D: Device> io::Read for Interface<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let inbound = self.conn.inbound_stream_mut();
            if inbound.error() {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "Connection reset",
                ));
            }
            if !inbound.buffer_empty() {
                let data = inbound.read(buf.len());
                buf[..data.len()].copy_from_slice(&data);
                return Ok(data.len());
            }
            if inbound.eof() || !self.conn.active() {
                return Ok(0);
            }
            self.poll(POLL_INTERVAL)?;
        }
    }
}

impl<D: Device> io::Write for Interface<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            let outbound = self.conn.outbound_stream();
            if !self.conn.active() || outbound.error() || outbound.input_ended() {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "Connection closed",
                ));
            }
            if buf.is_empty() {
                return Ok(0);
            }
            let nwrite = self.conn.write(buf);
            if nwrite > 0 {
                self.transmit()?;
                return Ok(nwrite);
            }
            self.poll(POLL_INTERVAL)?;
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        loop {
            let outbound = self.conn.outbound_stream();
            if outbound.error() {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "Connection closed",
                ));
            }
            if outbound.buffer_empty() && self.conn.bytes_in_flight() == 0 {
                return Ok(());
            }
            if !self.conn.active() {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "Connection closed",
                ));
            }
            self.poll(POLL_INTERVAL)?;
        }
    }
}

impl<D: Device> Drop for Interface<D> {
    fn drop(&mut self) {
        if self.conn.active() {
            info!("aborting {:?} connection", self.conn.state());
            self.conn.abort();
            if let Err(e) = self.transmit() {
                debug!("failed to send RST: {}", e);
            }
        }
    }
}
