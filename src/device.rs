use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

/// Where raw IPv4 datagrams come from and go to.
pub trait Device {
    /// Receive one datagram into `buf`, returning its length.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Send one datagram.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Wait up to `timeout` for a datagram to become available.
    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool>;
}

impl Device for tun_tap::Iface {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        tun_tap::Iface::recv(self, buf)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        tun_tap::Iface::send(self, buf)
    }

    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        // SAFETY: the descriptor belongs to `self`, which outlives this call.
        let fd = unsafe { BorrowedFd::borrow_raw(self.as_raw_fd()) };
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let ready = poll(&mut fds, PollTimeout::from(millis))?;
        Ok(ready > 0
            && fds[0]
                .revents()
                .map_or(false, |events| events.contains(PollFlags::POLLIN)))
    }
}
