//! Initial sequence number generation, after RFC 6528.
//!
//! `ISN = M + F(4-tuple, secret)` where `M` ticks every 4 microseconds and `F`
//! hashes the secret together with the four-tuple.
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use super::sequence::WrappingInt32;
use super::Tcp4Tuple;

#[derive(Debug)]
pub struct IsnGenerator {
    secret: [u64; 2],
}

impl IsnGenerator {
    /// A generator with a fresh random secret.
    pub fn new() -> Self {
        Self {
            secret: rand::rng().random(),
        }
    }

    /// ISN for the connection identified by `quad`.
    pub fn isn(&self, quad: &Tcp4Tuple) -> WrappingInt32 {
        let mut hasher = DefaultHasher::new();
        self.secret.hash(&mut hasher);
        quad.hash(&mut hasher);
        WrappingInt32::new(clock().wrapping_add(hasher.finish() as u32))
    }

    /// ISN for a connection whose four-tuple is not known.
    pub fn random() -> WrappingInt32 {
        WrappingInt32::new(rand::rng().random())
    }
}

impl Default for IsnGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn clock() -> u32 {
    let since = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (since.as_micros() / 4) as u32
}
