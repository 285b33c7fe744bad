//! Multiboot image validation and sequential reading.
//!
//! An image is an immutable byte buffer. The protocol always transfers a whole
//! number of 16-byte blocks, so reads past the end of the real data return zero
//! bytes rather than failing. The same cursor serves the raw header phase
//! (2 bytes per unit) and the encrypted payload phase (4 bytes per word).

use crate::error::{constants, ProtocolError, Result};
use bytes::Bytes;
use std::path::Path;
use tracing::{debug, instrument};

/// Largest transfer the peer accepts (256 KiB).
pub const MAX_IMAGE_SIZE: usize = 0x40000;

/// Transfers are rounded up to this many bytes.
pub const IMAGE_ALIGNMENT: usize = 16;

/// Number of 2-byte units sent unencrypted before key exchange.
pub const HEADER_UNITS: usize = 0x5F;

/// Bytes consumed by the header phase.
pub const HEADER_BYTES: usize = HEADER_UNITS * 2;

/// Bias subtracted from the transfer size in the length word.
pub const LENGTH_BIAS: i64 = 0x190;

/// Round a byte length up to the transfer granularity.
#[inline]
pub fn transfer_size(len: usize) -> usize {
    (len + IMAGE_ALIGNMENT - 1) & !(IMAGE_ALIGNMENT - 1)
}

/// Length word sent during negotiation: `(size - 0x190) / 4`.
///
/// Computed in signed arithmetic and truncated to 32 bits, so transfers smaller
/// than 0x190 bytes produce a wrapped negative value.
#[inline]
pub fn length_word(transfer_size: usize) -> u32 {
    ((transfer_size as i64 - LENGTH_BIAS) / 4) as u32
}

/// Inverse of [`length_word`], as the receiving side sees it.
#[inline]
pub fn transfer_size_from_length_word(word: u32) -> i64 {
    i64::from(word as i32) * 4 + LENGTH_BIAS
}

/// Number of encrypted words sent for a transfer of `transfer_size` bytes.
///
/// The payload loop starts at byte [`HEADER_BYTES`] and runs while the offset is
/// below the transfer size, so a trailing partial word still counts.
#[inline]
pub fn payload_words(transfer_size: usize) -> usize {
    transfer_size.saturating_sub(HEADER_BYTES).div_ceil(4)
}

/// A validated multiboot image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    data: Bytes,
    transfer_size: usize,
}

impl Image {
    /// Wrap an in-memory image, rejecting anything that would exceed
    /// [`MAX_IMAGE_SIZE`] once rounded.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let transfer_size = transfer_size(data.len());
        if transfer_size > MAX_IMAGE_SIZE {
            return Err(ProtocolError::ImageTooLarge(transfer_size));
        }
        Ok(Self {
            data,
            transfer_size,
        })
    }

    /// Read and validate an image file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref()).map_err(|e| {
            ProtocolError::InvalidImage(format!(
                "{}: {}: {e}",
                constants::ERR_IMAGE_UNREADABLE,
                path.as_ref().display()
            ))
        })?;
        let image = Self::from_bytes(data)?;
        debug!(
            bytes = image.len(),
            transfer_size = image.transfer_size(),
            "Image loaded"
        );
        Ok(image)
    }

    /// Real length of the image data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Length rounded up to the transfer granularity.
    pub fn transfer_size(&self) -> usize {
        self.transfer_size
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn length_word(&self) -> u32 {
        length_word(self.transfer_size)
    }

    pub fn payload_words(&self) -> usize {
        payload_words(self.transfer_size)
    }

    /// A fresh cursor positioned at byte 0.
    pub fn cursor(&self) -> ImageCursor<'_> {
        ImageCursor::new(&self.data)
    }
}

/// Sequential reader over image bytes with zero padding past the end.
#[derive(Debug, Clone)]
pub struct ImageCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ImageCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    fn byte_at(&self, index: usize) -> u32 {
        self.data.get(index).copied().map_or(0, u32::from)
    }

    /// Read two bytes little-endian into the low half of a word.
    pub fn read_halfword(&mut self) -> u32 {
        let p = self.position;
        self.position += 2;
        self.byte_at(p) | self.byte_at(p + 1) << 8
    }

    /// Read four bytes little-endian.
    pub fn read_word(&mut self) -> u32 {
        let p = self.position;
        self.position += 4;
        self.byte_at(p)
            | self.byte_at(p + 1) << 8
            | self.byte_at(p + 2) << 16
            | self.byte_at(p + 3) << 24
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_transfer_size_rounding() {
        assert_eq!(transfer_size(0), 0);
        assert_eq!(transfer_size(1), 16);
        assert_eq!(transfer_size(16), 16);
        assert_eq!(transfer_size(206), 208);
        assert_eq!(transfer_size(MAX_IMAGE_SIZE), MAX_IMAGE_SIZE);
    }

    #[test]
    fn test_length_word_for_small_image_wraps_negative() {
        assert_eq!(length_word(0xC0), 0xFFFF_FFCC);
        assert_eq!(length_word(0), 0xFFFF_FF9C);
        assert_eq!(length_word(0x190), 0);
        assert_eq!(length_word(512), 0x1C);
    }

    #[test]
    fn test_length_word_inverse() {
        for size in [0usize, 0xC0, 0x190, 512, MAX_IMAGE_SIZE] {
            assert_eq!(transfer_size_from_length_word(length_word(size)), size as i64);
        }
    }

    #[test]
    fn test_payload_word_counts() {
        assert_eq!(payload_words(0), 0);
        assert_eq!(payload_words(HEADER_BYTES), 0);
        assert_eq!(payload_words(192), 1);
        assert_eq!(payload_words(208), 5);
        assert_eq!(payload_words(512), 81);
    }

    #[test]
    fn test_oversized_image_rejected_after_rounding() {
        let err = Image::from_bytes(vec![0u8; MAX_IMAGE_SIZE + 1]).unwrap_err();
        assert!(matches!(err, ProtocolError::ImageTooLarge(n) if n == MAX_IMAGE_SIZE + 16));
        assert_eq!(err.kind(), ErrorKind::InvalidImage);

        assert!(Image::from_bytes(vec![0u8; MAX_IMAGE_SIZE]).is_ok());
    }

    #[test]
    fn test_missing_file_is_invalid_image() {
        let err = Image::from_file("/nonexistent/definitely/not/here.gba").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidImage);
    }

    #[test]
    fn test_cursor_little_endian_and_zero_padding() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut cursor = ImageCursor::new(&data);
        assert_eq!(cursor.read_word(), 0x0403_0201);
        assert_eq!(cursor.read_word(), 0x0000_0005);
        assert_eq!(cursor.read_halfword(), 0);
        assert_eq!(cursor.position(), 10);
    }

    #[test]
    fn test_cursor_halfwords() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut cursor = ImageCursor::new(&data);
        assert_eq!(cursor.read_halfword(), 0xBBAA);
        assert_eq!(cursor.read_halfword(), 0x00CC);
        assert_eq!(cursor.position(), 4);
    }
}
