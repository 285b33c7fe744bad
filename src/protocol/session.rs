//! Per-session state and the values derived from the peer during the handshake.
//!
//! State lives in one owned [`SessionState`] passed by reference through the
//! phases. It is created at discovery and dropped at the end of the attempt;
//! nothing survives into the next session.

use crate::core::checksum::Checksum;
use crate::core::keystream::Keystream;

/// Low half of the keystream seed; the key byte lands in bits 8..16.
pub const KEYSTREAM_SEED_BASE: u32 = 0xFFFF_00D1;

/// Offset added to the key byte to form the handshake data.
pub const HANDSHAKE_DATA_OFFSET: u32 = 0xF;

/// Command prefix of the handshake word.
pub const HANDSHAKE_COMMAND: u32 = 0x0000_6400;

/// Bits forced on in the checksum finalizer.
pub const FINALIZER_MASK: u32 = 0xFFFF_0000;

#[inline]
fn response_byte(response: u32) -> u32 {
    (response >> 16) & 0xFF
}

/// Values derived from the second key-exchange response `0x73kk....`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Byte `kk` taken from bits 16..24 of the response
    pub key_byte: u8,
    /// Initial keystream state
    pub keystream_seed: u32,
    /// `kk + 0xF`, kept unmasked for the finalizer
    pub handshake_data: u32,
    /// Word sent back during the handshake phase
    pub handshake_word: u32,
}

impl KeyMaterial {
    pub fn from_response(response: u32) -> Self {
        let key = response_byte(response);
        Self {
            key_byte: key as u8,
            keystream_seed: (key << 8).wrapping_add(KEYSTREAM_SEED_BASE),
            handshake_data: key + HANDSHAKE_DATA_OFFSET,
            handshake_word: ((response >> 16).wrapping_add(HANDSHAKE_DATA_OFFSET) & 0xFF)
                | HANDSHAKE_COMMAND,
        }
    }
}

/// Finalizer seed from the length-negotiation response `0x..cc....`.
#[inline]
pub fn derive_finalizer(length_response: u32, handshake_data: u32) -> u32 {
    ((response_byte(length_response) << 8).wrapping_add(handshake_data)) | FINALIZER_MASK
}

/// Mutable scalars carried across phases.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub(crate) keystream: Keystream,
    pub(crate) checksum: Checksum,
    pub(crate) finalizer: u32,
    pub(crate) payload_offset: u32,
    pub(crate) header_units: usize,
    pub(crate) payload_words: usize,
    pub(crate) finalized: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            keystream: Keystream::new(0),
            checksum: Checksum::new(),
            finalizer: 0,
            payload_offset: 0,
            header_units: 0,
            payload_words: 0,
            finalized: false,
        }
    }

    /// Seed the keystream from the key exchange.
    pub fn key(&mut self, material: &KeyMaterial) {
        self.keystream = Keystream::new(material.keystream_seed);
    }

    pub fn set_finalizer(&mut self, finalizer: u32) {
        self.finalizer = finalizer;
    }

    /// Account for one raw 2-byte header unit.
    pub fn advance_header(&mut self) {
        self.payload_offset = self.payload_offset.wrapping_add(2);
        self.header_units += 1;
    }

    pub fn keystream_state(&self) -> u32 {
        self.keystream.state()
    }

    pub fn checksum(&self) -> u32 {
        self.checksum.value()
    }

    pub fn finalizer(&self) -> u32 {
        self.finalizer
    }

    /// Running byte offset into the image.
    pub fn payload_offset(&self) -> u32 {
        self.payload_offset
    }

    pub fn header_units(&self) -> usize {
        self.header_units
    }

    pub fn payload_words(&self) -> usize {
        self.payload_words
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
