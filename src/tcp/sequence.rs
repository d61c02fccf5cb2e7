use std::fmt;
use std::ops::{Add, Sub};

const SPAN: u64 = 1 << 32;
const HALF_SPAN: u64 = 1 << 31;

/// A 32-bit sequence number as it appears on the wire.
///
/// It is essential to remember that the actual sequence number space is
/// finite, though very large.  This space ranges from 0 to 2**32 - 1.
/// Since the space is finite, all arithmetic dealing with sequence
/// numbers must be performed modulo 2**32.
///
/// Each direction of a connection counts from its own initial sequence
/// number (ISN). Internally both ends work with *absolute* 64-bit sequence
/// numbers that start at 0 for the SYN and never wrap; `wrap` and `unwrap`
/// convert between the two.
#[derive(Debug, Default, Clone, Copy, Hash, Eq, PartialEq)]
pub struct WrappingInt32(u32);

impl WrappingInt32 {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw_value(self) -> u32 {
        self.0
    }

    /// Absolute sequence number `n` as seen on the wire of a stream that
    /// started at `isn`.
    pub fn wrap(n: u64, isn: WrappingInt32) -> Self {
        Self(isn.0.wrapping_add(n as u32))
    }

    /// The absolute sequence number that wraps to `self` and lies closest to
    /// `checkpoint`.
    ///
    /// Three candidates are congruent modulo 2**32 near the checkpoint; the
    /// one in the checkpoint's own 2**32 block wins a tie.
    pub fn unwrap(self, isn: WrappingInt32, checkpoint: u64) -> u64 {
        let offset = u64::from(self.0.wrapping_sub(isn.0));
        let center = (checkpoint & !(SPAN - 1)) | offset;

        if center < checkpoint && checkpoint - center > HALF_SPAN {
            if let Some(right) = center.checked_add(SPAN) {
                return right;
            }
        } else if center > checkpoint && center - checkpoint > HALF_SPAN && center >= SPAN {
            return center - SPAN;
        }
        center
    }
}

impl Add<u32> for WrappingInt32 {
    type Output = WrappingInt32;

    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0.wrapping_add(rhs))
    }
}

impl Sub<u32> for WrappingInt32 {
    type Output = WrappingInt32;

    fn sub(self, rhs: u32) -> Self::Output {
        Self(self.0.wrapping_sub(rhs))
    }
}

/// Signed distance between two sequence numbers, valid while they are less
/// than 2**31 apart.
impl Sub for WrappingInt32 {
    type Output = i32;

    fn sub(self, rhs: WrappingInt32) -> Self::Output {
        self.0.wrapping_sub(rhs.0) as i32
    }
}

impl fmt::Display for WrappingInt32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(raw: u32) -> WrappingInt32 {
        WrappingInt32::new(raw)
    }

    #[test]
    fn wrap_adds_isn_modulo() {
        assert_eq!(WrappingInt32::wrap(3 * SPAN, w(0)), w(0));
        assert_eq!(WrappingInt32::wrap(3 * SPAN + 17, w(15)), w(32));
        assert_eq!(WrappingInt32::wrap(7 * SPAN - 2, w(15)), w(13));
    }

    #[test]
    fn unwrap_first_block() {
        assert_eq!(w(1).unwrap(w(0), 0), 1);
        assert_eq!(w(u32::MAX).unwrap(w(0), 0), u64::from(u32::MAX));
        assert_eq!(w(16).unwrap(w(16), 0), 0);
        assert_eq!(w(15).unwrap(w(16), 0), u64::from(u32::MAX));
    }

    #[test]
    fn unwrap_picks_closest_to_checkpoint() {
        assert_eq!(w(0).unwrap(w(0), u64::from(u32::MAX)), SPAN);
        assert_eq!(w(u32::MAX).unwrap(w(0), 3 * SPAN), 3 * SPAN - 1);
        assert_eq!(w(u32::MAX - 1).unwrap(w(0), 3 * SPAN), 3 * SPAN - 2);
        assert_eq!(w(10).unwrap(w(0), 3 * SPAN - 5), 3 * SPAN + 10);
        assert_eq!(w(u32::MAX).unwrap(w(10), 3 * SPAN), 3 * SPAN - 11);
    }

    #[test]
    fn unwrap_tie_stays_in_checkpoint_block() {
        assert_eq!(w(0).unwrap(w(0), HALF_SPAN), 0);
        assert_eq!(w(1 << 31).unwrap(w(0), SPAN), SPAN + HALF_SPAN);
    }

    #[test]
    fn unwrap_near_u64_limits() {
        assert_eq!(w(0).unwrap(w(0), u64::MAX), u64::MAX - u64::from(u32::MAX));
        assert_eq!(w(u32::MAX).unwrap(w(0), u64::MAX), u64::MAX);
    }

    #[test]
    fn round_trip_with_exact_checkpoint() {
        for &isn in &[0u32, 1, 0x8000_0000, u32::MAX] {
            for &n in &[0u64, 1, SPAN - 1, SPAN, SPAN + 1, 5 * SPAN + 12345, u64::MAX >> 1] {
                let isn = w(isn);
                assert_eq!(WrappingInt32::wrap(n, isn).unwrap(isn, n), n);
            }
        }
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(w(u32::MAX) + 2, w(1));
        assert_eq!(w(0) - 1, w(u32::MAX));
        assert_eq!(w(3) - w(u32::MAX), 4);
        assert_eq!(w(u32::MAX) - w(3), -4);
    }
}
