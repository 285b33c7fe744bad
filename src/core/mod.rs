//! # Core Protocol Components
//!
//! Pure arithmetic and data handling for the multiboot transfer.
//!
//! Nothing in this module touches the link. Every function here is a
//! deterministic function of its inputs, so the session engine and the
//! emulated peer share exactly the same maths.
//!
//! ## Components
//! - **Checksum**: bit-serial CRC-style accumulator over 32-bit words
//! - **Keystream**: linear congruential generator and the per-word XOR mask
//! - **Image**: size validation, 16-byte rounding and a zero-padding byte cursor
//!
//! ## Arithmetic
//! All values are `u32` and every addition and multiplication wraps modulo 2^32.
//! The protocol depends on that wraparound.

pub mod checksum;
pub mod image;
pub mod keystream;
