use std::cmp::{max, min};
use std::collections::BTreeMap;

use log::trace;

use super::byte_stream::ByteStream;

/// Puts possibly overlapping, possibly out-of-order substrings back into a
/// contiguous stream.
///
/// Fragments that cannot be delivered yet are kept in `fragments`, keyed by
/// their absolute stream index. After every insertion the map holds no two
/// entries that overlap or touch. Bytes held here plus bytes delivered but
/// not yet read never exceed `capacity`; anything over is cut from the
/// highest indices first.
#[derive(Debug)]
pub struct StreamReassembler {
    output: ByteStream,
    capacity: usize,
    fragments: BTreeMap<u64, Vec<u8>>,
    unassembled: usize,
    eof_index: Option<u64>,
}

impl StreamReassembler {
    pub fn new(capacity: usize) -> Self {
        Self {
            output: ByteStream::new(capacity),
            capacity,
            fragments: BTreeMap::new(),
            unassembled: 0,
            eof_index: None,
        }
    }

    /// Accept `data` found at stream position `index`.
    ///
    /// `is_last` marks `data` as the final piece: the stream ends right after
    /// it, even when `data` is empty.
    pub fn insert(&mut self, data: &[u8], index: u64, is_last: bool) {
        let end = index + data.len() as u64;
        if is_last && self.eof_index.is_none() {
            self.eof_index = Some(end);
            self.trim_beyond(end);
        }

        let next = self.first_unassembled();
        let (mut start, mut data) = (index, data);
        if end <= next {
            data = &[];
        } else if start < next {
            data = &data[(next - start) as usize..];
            start = next;
        }
        if let Some(eof) = self.eof_index {
            let keep = min(eof.saturating_sub(start), data.len() as u64);
            data = &data[..keep as usize];
        }

        if !data.is_empty() {
            self.merge(start, data);
            self.enforce_capacity();
        }
        self.deliver();
    }

    /// Stream index of the next byte the output is waiting for.
    pub fn first_unassembled(&self) -> u64 {
        self.output.bytes_written()
    }

    /// Bytes held out of order.
    pub fn unassembled_bytes(&self) -> usize {
        self.unassembled
    }

    pub fn empty(&self) -> bool {
        self.unassembled == 0 && self.output.buffer_empty()
    }

    pub fn stream_out(&self) -> &ByteStream {
        &self.output
    }

    pub fn stream_out_mut(&mut self) -> &mut ByteStream {
        &mut self.output
    }

    fn merge(&mut self, start: u64, data: &[u8]) {
        let end = start + data.len() as u64;
        let touching: Vec<u64> = self
            .fragments
            .range(..=end)
            .rev()
            .take_while(|&(&key, frag)| key + frag.len() as u64 >= start)
            .map(|(&key, _)| key)
            .collect();

        let lo = touching.last().map_or(start, |&key| min(key, start));
        let hi = touching.first().map_or(end, |&key| {
            let len = self.fragments.get(&key).map_or(0, Vec::len);
            max(key + len as u64, end)
        });

        let mut merged = vec![0u8; (hi - lo) as usize];
        for key in touching {
            if let Some(frag) = self.fragments.remove(&key) {
                let at = (key - lo) as usize;
                merged[at..at + frag.len()].copy_from_slice(&frag);
                self.unassembled -= frag.len();
            }
        }
        let at = (start - lo) as usize;
        merged[at..at + data.len()].copy_from_slice(data);

        trace!("reassembler holds [{}, {})", lo, hi);
        self.unassembled += merged.len();
        self.fragments.insert(lo, merged);
    }

    fn enforce_capacity(&mut self) {
        let held = self.unassembled + self.output.buffer_size();
        let mut excess = held.saturating_sub(self.capacity);
        while excess > 0 {
            let Some(mut last) = self.fragments.last_entry() else {
                break;
            };
            let len = last.get().len();
            if len <= excess {
                last.remove();
                self.unassembled -= len;
                excess -= len;
            } else {
                last.get_mut().truncate(len - excess);
                self.unassembled -= excess;
                excess = 0;
            }
        }
    }

    fn trim_beyond(&mut self, limit: u64) {
        while let Some(mut last) = self.fragments.last_entry() {
            let start = *last.key();
            let len = last.get().len();
            if start + len as u64 <= limit {
                break;
            }
            if start >= limit {
                last.remove();
                self.unassembled -= len;
            } else {
                let keep = (limit - start) as usize;
                last.get_mut().truncate(keep);
                self.unassembled -= len - keep;
                break;
            }
        }
    }

    // Coalescing leaves at most one fragment that can start at the delivery
    // point, so a single step is enough.
    fn deliver(&mut self) {
        let next = self.first_unassembled();
        if let Some(first) = self.fragments.first_entry() {
            if *first.key() == next {
                let frag = first.remove();
                self.unassembled -= frag.len();
                let written = self.output.write(&frag);
                if written < frag.len() {
                    let rest = frag[written..].to_vec();
                    self.unassembled += rest.len();
                    self.fragments.insert(next + written as u64, rest);
                }
            }
        }

        if let Some(eof) = self.eof_index {
            if self.first_unassembled() >= eof && !self.output.input_ended() {
                self.output.end_input();
            }
        }
    }
}
