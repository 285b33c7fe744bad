//! # Transport Layer
//!
//! Everything that moves a 32-bit word to the peer and brings one back.
//!
//! The session engine only needs [`Transport::exchange`]: one word out, one word
//! in, synchronously. On byte-oriented links the word travels big-endian (most
//! significant byte first) and the response is read the same way.
//!
//! ## Implementations
//! - [`stream::StreamTransport`]: any `Read + Write` byte stream (serial bridges,
//!   character devices, Unix sockets)
//! - [`local`]: Unix-socket client, plus an async server exposing an emulated peer
//! - [`emulated::EmulatedDevice`]: in-process model of the receiving device
//! - [`FnTransport`]: closure adapter for scripted peers

use crate::error::Result;

pub mod emulated;
#[cfg(unix)]
pub mod local;
pub mod stream;

/// Bytes per exchanged word on byte-oriented links.
pub const WORD_BYTES: usize = 4;

/// One synchronous word exchange with the peer.
pub trait Transport {
    /// Send `word` and return the word the peer sent in the same exchange.
    fn exchange(&mut self, word: u32) -> Result<u32>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, word: u32) -> Result<u32> {
        (**self).exchange(word)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&mut self, word: u32) -> Result<u32> {
        (**self).exchange(word)
    }
}

/// Adapts a closure into a [`Transport`].
pub struct FnTransport<F> {
    respond: F,
}

impl<F> FnTransport<F>
where
    F: FnMut(u32) -> Result<u32>,
{
    pub fn new(respond: F) -> Self {
        Self { respond }
    }
}

impl<F> Transport for FnTransport<F>
where
    F: FnMut(u32) -> Result<u32>,
{
    fn exchange(&mut self, word: u32) -> Result<u32> {
        (self.respond)(word)
    }
}
