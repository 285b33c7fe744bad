//! # Error Types
//!
//! Error handling for the multiboot protocol.
//!
//! This module defines every error variant that can occur while preparing an image
//! or driving a multiboot session, from low-level I/O failures on the link to a
//! peer that never answers.
//!
//! ## Error Categories
//! - **Image Errors**: unreadable or oversized images, detected before any exchange
//! - **Peer Errors**: a polled response never matched the expected word
//! - **Transport Errors**: the word exchange itself failed
//! - **Configuration Errors**: invalid or unparsable settings
//!
//! None of these are recoverable within a session. A caller that wants to retry
//! must start a fresh session from discovery.
//!
//! ## Example Usage
//! ```rust
//! use multiboot_protocol::error::{ErrorKind, ProtocolError, Result};
//! use multiboot_protocol::core::image::Image;
//! use tracing::{error, info};
//!
//! fn load(path: &str) -> Result<Image> {
//!     Image::from_file(path)
//! }
//!
//! fn main() {
//!     match load("missing.gba") {
//!         Ok(image) => info!(bytes = image.len(), "Image loaded"),
//!         Err(e) => {
//!             assert_eq!(e.kind(), ErrorKind::InvalidImage);
//!             error!(error = %e, "Cannot multiboot");
//!         }
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Image validation errors
    pub const ERR_IMAGE_UNREADABLE: &str = "Failed to read image";

    /// Transport errors
    pub const ERR_LINK_KIND_UNSUPPORTED: &str = "Link kind is not available on this platform";

    /// Session control errors
    pub const ERR_SESSION_TASK: &str = "Session task terminated abnormally";
}

/// ProtocolError is the primary error type for all multiboot operations
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    Io(#[from] io::Error),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Image too large: {0} bytes (max 262144)")]
    ImageTooLarge(usize),

    #[error("Peer unresponsive: sent {sent:#010x}, expected {expected:#010x}, gave up after {attempts} attempts")]
    PeerUnresponsive {
        sent: u32,
        expected: u32,
        attempts: u32,
    },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Session cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse classification of a [`ProtocolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The image was rejected before the session started.
    InvalidImage,
    /// A polled exchange never produced the expected word.
    PeerUnresponsive,
    /// The link failed while exchanging a word.
    TransportFailure,
    /// The session was cancelled by its owner.
    Cancelled,
    /// Settings could not be loaded or are inconsistent.
    Config,
}

impl ProtocolError {
    /// Classify this error.
    ///
    /// I/O errors are treated as transport failures: image loading wraps its own
    /// I/O errors into [`ProtocolError::InvalidImage`] before they get here.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::InvalidImage(_) | ProtocolError::ImageTooLarge(_) => {
                ErrorKind::InvalidImage
            }
            ProtocolError::PeerUnresponsive { .. } => ErrorKind::PeerUnresponsive,
            ProtocolError::Io(_)
            | ProtocolError::TransportError(_)
            | ProtocolError::ConnectionClosed => ErrorKind::TransportFailure,
            ProtocolError::Cancelled => ErrorKind::Cancelled,
            ProtocolError::ConfigError(_) => ErrorKind::Config,
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
