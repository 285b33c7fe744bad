//! Keystream generator and per-word payload mask.
//!
//! The cipher is a fixed XOR mask built from three parts: the two's-complement
//! negation of the word's position in the image (offset from `0x02000000`), the
//! current LCG state, and a constant. It is not cryptographically secure and is
//! its own inverse for a given `(offset, key)` pair.

/// LCG multiplier (`"odes"` in ASCII).
pub const LCG_MULTIPLIER: u32 = 0x6F64_6573;

/// Constant folded into every mask (`"C //"` in ASCII).
pub const KEY_XOR: u32 = 0x4320_2F2F;

/// Base address the byte offset is measured from when masking.
pub const OFFSET_BASE: u32 = 0x0200_0000;

/// Advance the generator: `state * 0x6F646573 + 1 (mod 2^32)`.
#[inline]
pub fn lcg_next(state: u32) -> u32 {
    state.wrapping_mul(LCG_MULTIPLIER).wrapping_add(1)
}

/// Two's-complement negation, `!v + 1`.
#[inline]
pub fn negate(value: u32) -> u32 {
    (!value).wrapping_add(1)
}

/// XOR mask for the word at byte `offset` under keystream word `key`.
#[inline]
pub fn mask(offset: u32, key: u32) -> u32 {
    negate(OFFSET_BASE.wrapping_add(offset)) ^ key ^ KEY_XOR
}

/// Encrypt (or decrypt) one word.
#[inline]
pub fn encrypt_word(word: u32, offset: u32, key: u32) -> u32 {
    word ^ mask(offset, key)
}

/// Stateful keystream seeded during key exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keystream {
    state: u32,
}

impl Keystream {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Step the generator and return the new state.
    pub fn advance(&mut self) -> u32 {
        self.state = lcg_next(self.state);
        self.state
    }

    pub fn state(&self) -> u32 {
        self.state
    }
}

impl Iterator for Keystream {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        Some(self.advance())
    }
}
