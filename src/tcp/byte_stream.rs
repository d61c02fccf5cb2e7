use std::collections::VecDeque;

/// A bounded, single-writer single-reader byte FIFO.
///
/// Nothing here ever blocks. A write that does not fit is truncated and the
/// caller learns how much was taken from the returned count; that count and
/// `remaining_capacity` are the only backpressure signals.
#[derive(Debug, Clone)]
pub struct ByteStream {
    capacity: usize,
    buffer: VecDeque<u8>,
    input_ended: bool,
    error: bool,
    bytes_written: u64,
    bytes_read: u64,
}

impl ByteStream {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity),
            input_ended: false,
            error: false,
            bytes_written: 0,
            bytes_read: 0,
        }
    }

    /// Append as much of `data` as fits and return how many bytes were taken.
    ///
    /// Writing after `end_input` or after an error is itself an error: the
    /// stream is marked errored and nothing is accepted.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if self.input_ended || self.error {
            self.error = true;
            return 0;
        }
        let n = std::cmp::min(data.len(), self.remaining_capacity());
        self.buffer.extend(&data[..n]);
        self.bytes_written += n as u64;
        n
    }

    /// Copy up to `len` bytes from the front of the buffer.
    pub fn peek_output(&self, len: usize) -> Vec<u8> {
        let len = std::cmp::min(len, self.buffer.len());
        let (head, tail) = self.buffer.as_slices();
        let hlen = std::cmp::min(len, head.len());
        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(&head[..hlen]);
        out.extend_from_slice(&tail[..len - hlen]);
        out
    }

    /// Discard up to `len` bytes from the front of the buffer.
    pub fn pop_output(&mut self, len: usize) {
        let len = std::cmp::min(len, self.buffer.len());
        self.buffer.drain(..len);
        self.bytes_read += len as u64;
    }

    /// Peek then pop.
    pub fn read(&mut self, len: usize) -> Vec<u8> {
        let out = self.peek_output(len);
        self.pop_output(out.len());
        out
    }

    pub fn end_input(&mut self) {
        self.input_ended = true;
    }

    pub fn set_error(&mut self) {
        self.error = true;
    }

    pub fn input_ended(&self) -> bool {
        self.input_ended
    }

    pub fn error(&self) -> bool {
        self.error
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The writer is done and the reader has drained everything.
    pub fn eof(&self) -> bool {
        self.input_ended && self.buffer.is_empty()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_in_order() {
        let mut bs = ByteStream::new(15);
        assert_eq!(bs.write(b"cat"), 3);
        assert_eq!(bs.write(b"dog"), 3);
        assert_eq!(bs.buffer_size(), 6);
        assert_eq!(bs.remaining_capacity(), 9);
        assert_eq!(bs.read(4), b"catd");
        assert_eq!(bs.read(100), b"og");
        assert_eq!(bs.bytes_written(), bs.bytes_read());
        assert!(bs.buffer_empty());
        assert!(!bs.eof());
    }

    #[test]
    fn full_stream_truncates_writes() {
        let mut bs = ByteStream::new(2);
        assert_eq!(bs.write(b"cat"), 2);
        assert_eq!(bs.remaining_capacity(), 0);
        assert_eq!(bs.write(b"t"), 0);
        assert_eq!(bs.peek_output(2), b"ca");
        bs.pop_output(1);
        assert_eq!(bs.write(b"tt"), 1);
        assert_eq!(bs.read(2), b"at");
        assert_eq!(bs.bytes_written(), 3);
        assert!(!bs.error());
    }

    #[test]
    fn peek_across_ring_boundary() {
        let mut bs = ByteStream::new(4);
        bs.write(b"abcd");
        bs.pop_output(3);
        bs.write(b"efg");
        assert_eq!(bs.peek_output(10), b"defg");
        assert_eq!(bs.buffer_size(), 4);
    }

    #[test]
    fn eof_needs_end_and_drain() {
        let mut bs = ByteStream::new(8);
        bs.write(b"hi");
        bs.end_input();
        assert!(bs.input_ended());
        assert!(!bs.eof());
        bs.pop_output(2);
        assert!(bs.eof());
    }

    #[test]
    fn write_after_end_is_an_error() {
        let mut bs = ByteStream::new(8);
        bs.end_input();
        assert_eq!(bs.write(b"late"), 0);
        assert!(bs.error());
        assert_eq!(bs.bytes_written(), 0);
    }

    #[test]
    fn errored_stream_refuses_writes() {
        let mut bs = ByteStream::new(8);
        bs.set_error();
        assert_eq!(bs.write(b"x"), 0);
        assert!(bs.error());
    }
}
