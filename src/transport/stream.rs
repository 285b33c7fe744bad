//! Word exchange over a byte stream.
//!
//! Each exchange writes the word as 4 big-endian bytes, flushes, then blocks
//! until exactly 4 bytes come back. The bridge on the other end is expected to
//! clock the word out and return whatever it shifted in.

use crate::error::{ProtocolError, Result};
use crate::transport::{Transport, WORD_BYTES};
use bytes::{Buf, BufMut, BytesMut};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{info, instrument};

pub struct StreamTransport<S> {
    stream: S,
    buf: BytesMut,
}

impl<S: Read + Write> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(WORD_BYTES),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn exchange(&mut self, word: u32) -> Result<u32> {
        self.buf.clear();
        self.buf.put_u32(word);
        self.stream.write_all(&self.buf)?;
        self.stream.flush()?;

        let mut response = [0u8; WORD_BYTES];
        self.stream.read_exact(&mut response).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                ProtocolError::ConnectionClosed
            } else {
                ProtocolError::Io(e)
            }
        })?;
        Ok((&response[..]).get_u32())
    }
}

/// Open a character device (serial bridge) for read/write word exchange.
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn open_device<P: AsRef<Path>>(path: P) -> Result<StreamTransport<File>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path.as_ref())
        .map_err(|e| {
            ProtocolError::TransportError(format!(
                "Failed to open {}: {e}",
                path.as_ref().display()
            ))
        })?;
    info!("Opened link device");
    Ok(StreamTransport::new(file))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reads from a canned buffer, records everything written.
    struct Duplex {
        incoming: Cursor<Vec<u8>>,
        outgoing: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.incoming.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.outgoing.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_words_are_big_endian_both_ways() {
        let duplex = Duplex {
            incoming: Cursor::new(vec![0x72, 0x02, 0x62, 0x02]),
            outgoing: Vec::new(),
        };
        let mut transport = StreamTransport::new(duplex);

        assert_eq!(transport.exchange(0x0000_6202).unwrap(), 0x7202_6202);
        assert_eq!(transport.get_ref().outgoing, vec![0x00, 0x00, 0x62, 0x02]);
    }

    #[test]
    fn test_short_response_is_connection_closed() {
        let duplex = Duplex {
            incoming: Cursor::new(vec![0x72, 0x02]),
            outgoing: Vec::new(),
        };
        let mut transport = StreamTransport::new(duplex);

        assert!(matches!(
            transport.exchange(0x6202),
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[test]
    fn test_missing_device_is_transport_error() {
        let err = open_device("/nonexistent/multiboot-link").err().unwrap();
        assert!(matches!(err, ProtocolError::TransportError(_)));
    }
}
