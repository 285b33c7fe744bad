//! Bit-serial checksum accumulated over every payload word.

/// Initial accumulator value for a fresh session.
pub const CHECKSUM_SEED: u32 = 0x0000_C387;

/// Feedback constant XORed in whenever the low bits disagree.
pub const CHECKSUM_POLY: u32 = 0x0000_C37B;

/// Fold one 32-bit word into the accumulator, least-significant bit first.
///
/// Pure: the same `(acc, word)` pair always yields the same result.
#[inline]
pub fn update_checksum(acc: u32, word: u32) -> u32 {
    let mut acc = acc;
    let mut bits = word;
    for _ in 0..32 {
        if (acc ^ bits) & 1 != 0 {
            acc = (acc >> 1) ^ CHECKSUM_POLY;
        } else {
            acc >>= 1;
        }
        bits >>= 1;
    }
    acc
}

/// Running checksum for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum {
    value: u32,
}

impl Checksum {
    pub fn new() -> Self {
        Self {
            value: CHECKSUM_SEED,
        }
    }

    /// Fold `word` into the running value.
    pub fn fold(&mut self, word: u32) {
        self.value = update_checksum(self.value, word);
    }

    pub fn value(&self) -> u32 {
        self.value
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}
