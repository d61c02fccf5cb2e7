//! The driver over an in-memory device pair.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddrV4;
use std::rc::Rc;
use std::time::Duration;

use tcpcore::{
    wire, Available, Device, Flags, Interface, Segment, State, Tcp4Tuple, TcpConfig, WrappingInt32,
};

type Queue = Rc<RefCell<VecDeque<Vec<u8>>>>;

/// One end of a point-to-point link.
struct Pipe {
    rx: Queue,
    tx: Queue,
}

fn link() -> (Pipe, Pipe) {
    let ab = Queue::default();
    let ba = Queue::default();
    (
        Pipe {
            rx: ba.clone(),
            tx: ab.clone(),
        },
        Pipe { rx: ab, tx: ba },
    )
}

impl Device for Pipe {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let datagram = self
            .rx
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::WouldBlock, "empty"))?;
        buf[..datagram.len()].copy_from_slice(&datagram);
        Ok(datagram.len())
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx.borrow_mut().push_back(buf.to_vec());
        Ok(buf.len())
    }

    fn poll_readable(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(!self.rx.borrow().is_empty())
    }
}

fn client_addr() -> SocketAddrV4 {
    "192.168.0.1:40000".parse().unwrap()
}

fn server_addr() -> SocketAddrV4 {
    "192.168.0.2:6000".parse().unwrap()
}

fn config(isn: u32) -> TcpConfig {
    TcpConfig {
        fixed_isn: Some(WrappingInt32::new(isn)),
        ..Default::default()
    }
}

fn pump(a: &mut Interface<Pipe>, b: &mut Interface<Pipe>) {
    for _ in 0..4 {
        a.poll(Duration::ZERO).unwrap();
        b.poll(Duration::ZERO).unwrap();
    }
}

fn connected() -> (Interface<Pipe>, Interface<Pipe>) {
    let (client_end, server_end) = link();
    let mut client =
        Interface::connect(client_end, config(1), client_addr(), server_addr()).unwrap();
    let mut server = Interface::accept(server_end, config(2), server_addr()).unwrap();
    pump(&mut client, &mut server);
    (client, server)
}

#[test]
fn handshake_over_the_wire() {
    let (client, server) = connected();
    assert_eq!(client.connection().state(), State::Established);
    assert_eq!(server.connection().state(), State::Established);
    assert_eq!(server.quad().dst, (*client_addr().ip(), client_addr().port()));
}

#[test]
fn echo_and_close() {
    let (mut client, mut server) = connected();

    assert_eq!(client.write(b"hello").unwrap(), 5);
    pump(&mut client, &mut server);
    assert!(server.availability().contains(Available::READ));

    let mut buf = [0u8; 16];
    let n = server.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"hello");

    server.write_all(&buf[..n]).unwrap();
    server.shutdown().unwrap();
    pump(&mut client, &mut server);

    let mut echoed = Vec::new();
    client.read_to_end(&mut echoed).unwrap();
    assert_eq!(echoed, b"hello");

    // The server closed first, so it is the one left lingering.
    client.shutdown().unwrap();
    pump(&mut client, &mut server);
    assert!(!client.is_active());
    assert!(!client.availability().contains(Available::WRITE));
    assert_eq!(server.connection().state(), State::TimeWait);
}

#[test]
fn write_after_shutdown_is_broken_pipe() {
    let (mut client, mut server) = connected();
    client.shutdown().unwrap();
    pump(&mut client, &mut server);
    let err = client.write(b"late").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
}

#[test]
fn dropping_an_active_interface_resets_the_peer() {
    let (client_end, server_end) = link();
    let tap = server_end.rx.clone();
    let mut client =
        Interface::connect(client_end, config(1), client_addr(), server_addr()).unwrap();
    let mut server = Interface::accept(server_end, config(2), server_addr()).unwrap();
    pump(&mut client, &mut server);

    drop(client);
    let rst = wire::parse(tap.borrow().back().unwrap()).unwrap();
    assert!(rst.segment.rst());

    server.poll(Duration::ZERO).unwrap();
    assert!(!server.is_active());
    let mut buf = [0u8; 4];
    let err = server.read(&mut buf).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
}

#[test]
fn datagrams_for_other_connections_are_ignored() {
    let (client_end, server_end) = link();
    let inbox = server_end.rx.clone();
    let mut client =
        Interface::connect(client_end, config(1), client_addr(), server_addr()).unwrap();
    let mut server = Interface::accept(server_end, config(2), server_addr()).unwrap();
    pump(&mut client, &mut server);

    let stranger = Tcp4Tuple {
        src: ("10.9.9.9".parse().unwrap(), 1234),
        dst: (*server_addr().ip(), server_addr().port()),
    };
    let rst = Segment {
        flags: Flags::RST,
        ..Default::default()
    };
    inbox
        .borrow_mut()
        .push_back(wire::serialize(&stranger, &rst).unwrap());
    inbox.borrow_mut().push_back(b"not an ip datagram".to_vec());
    client.write_all(b"x").unwrap();
    pump(&mut client, &mut server);

    assert!(server.is_active());
    let mut buf = [0u8; 1];
    assert_eq!(server.read(&mut buf).unwrap(), 1);
    assert_eq!(&buf, b"x");
}
