//! Multiboot handshake state machine.
//!
//! Drives one session through a fixed sequence of phases:
//!
//! ```text
//! DISCOVERY -> RECOGNIZE -> HEADER -> HEADER_DONE -> KEY_EXCHANGE
//!           -> HANDSHAKE -> LENGTH -> PAYLOAD -> FINALIZE -> DONE
//! ```
//!
//! Session keys come from the peer: the second key-exchange response carries
//! the key byte, the length-negotiation response carries the finalizer byte.
//! A session is not resumable. Any error ends it, and the next attempt starts
//! again at discovery with fresh state.

use crate::core::image::{Image, HEADER_UNITS};
use crate::error::Result;
use crate::protocol::encoder::{finalize, send_payload};
use crate::protocol::exchanger::{Hex, WordExchanger};
use crate::protocol::session::{derive_finalizer, KeyMaterial, SessionState};
use crate::transport::Transport;
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::metrics::{global_metrics, Timer};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Discovery / recognition poll word.
pub const CMD_DISCOVER: u32 = 0x0000_6202;
/// Peer's answer once it is present.
pub const RESP_DISCOVERED: u32 = 0x7202_6202;
/// Recognition acknowledgement.
pub const CMD_RECOGNIZED: u32 = 0x0000_6102;
/// End of header transfer.
pub const CMD_HEADER_DONE: u32 = 0x0000_6200;
/// Palette command; the second response carries the key byte.
pub const CMD_PALETTE: u32 = 0x0000_63D1;
/// Checksum-ready poll word.
pub const CMD_CRC_POLL: u32 = 0x0000_0065;
/// Peer's answer once its checksum is ready.
pub const RESP_CRC_READY: u32 = 0x0075_0065;
/// Announces the checksum word.
pub const CMD_CRC_EXCHANGE: u32 = 0x0000_0066;

/// Handshake phases in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Discovery,
    Recognize,
    Header,
    HeaderDone,
    KeyExchange,
    Handshake,
    Length,
    Payload,
    Finalize,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Discovery => "DISCOVERY",
            Phase::Recognize => "RECOGNIZE",
            Phase::Header => "HEADER",
            Phase::HeaderDone => "HEADER_DONE",
            Phase::KeyExchange => "KEY_EXCHANGE",
            Phase::Handshake => "HANDSHAKE",
            Phase::Length => "LENGTH",
            Phase::Payload => "PAYLOAD",
            Phase::Finalize => "FINALIZE",
            Phase::Done => "DONE",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultibootReport {
    /// Image length rounded up to 16 bytes
    pub transfer_size: usize,
    /// Word sent during length negotiation
    pub length_word: u32,
    /// Word sent during the handshake phase
    pub handshake_word: u32,
    /// Key byte received from the peer
    pub key_byte: u8,
    /// Initial keystream state
    pub keystream_seed: u32,
    /// Finalizer folded into the checksum
    pub finalizer: u32,
    /// Raw 2-byte units sent during the header phase
    pub header_units: usize,
    /// Encrypted words sent during the payload phase
    pub payload_words: usize,
    /// Byte offset after the last payload word
    pub final_offset: u32,
    /// Checksum sent to the peer
    pub checksum: u32,
    /// Word the peer returned in the checksum exchange
    pub peer_checksum: u32,
    /// Total words exchanged, polling included
    pub exchanges: u64,
}

impl MultibootReport {
    /// Whether the peer echoed our checksum. Advisory only.
    pub fn checksum_matches(&self) -> bool {
        self.checksum == self.peer_checksum
    }
}

/// Host side of a multiboot session.
pub struct Multiboot<T, C = SystemClock> {
    exchanger: WordExchanger<T, C>,
    phase: Phase,
    visited: Vec<Phase>,
}

impl<T: Transport> Multiboot<T, SystemClock> {
    pub fn new(transport: T) -> Self {
        Self::with_exchanger(WordExchanger::new(transport))
    }
}

impl<T: Transport, C: Clock> Multiboot<T, C> {
    pub fn with_exchanger(exchanger: WordExchanger<T, C>) -> Self {
        Self {
            exchanger,
            phase: Phase::Discovery,
            visited: Vec::new(),
        }
    }

    /// Phase the last run reached (or failed in).
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Phases entered by the last run, in order.
    pub fn phases_visited(&self) -> &[Phase] {
        &self.visited
    }

    pub fn exchanger(&self) -> &WordExchanger<T, C> {
        &self.exchanger
    }

    pub fn exchanger_mut(&mut self) -> &mut WordExchanger<T, C> {
        &mut self.exchanger
    }

    pub fn into_transport(self) -> T {
        self.exchanger.into_transport()
    }

    fn enter(&mut self, phase: Phase) -> Result<()> {
        self.exchanger.cancel_token().check()?;
        self.mark(phase);
        Ok(())
    }

    fn mark(&mut self, phase: Phase) {
        info!(phase = %phase, "Entering phase");
        self.phase = phase;
        self.visited.push(phase);
    }

    /// Run a full session for `image`.
    ///
    /// The image was validated when it was constructed, so size problems never
    /// reach the link.
    #[instrument(skip_all, fields(bytes = image.len(), transfer_size = image.transfer_size()))]
    pub fn run(&mut self, image: &Image) -> Result<MultibootReport> {
        let _timer = Timer::start("multiboot_session");
        global_metrics().session_started();
        self.visited.clear();

        match self.drive(image) {
            Ok(report) => {
                global_metrics().session_succeeded();
                Ok(report)
            }
            Err(e) => {
                global_metrics().session_failed();
                warn!(phase = %self.phase, error = %e, "Multiboot session failed");
                Err(e)
            }
        }
    }

    fn drive(&mut self, image: &Image) -> Result<MultibootReport> {
        let mut session = SessionState::new();
        let mut cursor = image.cursor();
        let start_exchanges = self.exchanger.exchanges();

        self.enter(Phase::Discovery)?;
        self.exchanger.wait_until(CMD_DISCOVER, RESP_DISCOVERED)?;

        self.enter(Phase::Recognize)?;
        self.exchanger.announce(CMD_DISCOVER, "Found peer")?;
        self.exchanger.announce(CMD_RECOGNIZED, "Recognition OK")?;

        self.enter(Phase::Header)?;
        for _ in 0..HEADER_UNITS {
            let unit = cursor.read_halfword();
            session.advance_header();
            self.exchanger.exchange(unit)?;
        }

        self.enter(Phase::HeaderDone)?;
        self.exchanger
            .announce(CMD_HEADER_DONE, "Transfer of header data completed")?;
        self.exchanger
            .announce(CMD_DISCOVER, "Exchange master/slave info again")?;

        self.enter(Phase::KeyExchange)?;
        self.exchanger.announce(CMD_PALETTE, "Send palette data")?;
        let key_response = self
            .exchanger
            .announce(CMD_PALETTE, "Send palette data, receive key byte")?;
        let material = KeyMaterial::from_response(key_response);
        session.key(&material);
        debug!(
            key_byte = material.key_byte,
            seed = %Hex(material.keystream_seed),
            "Keystream seeded"
        );

        self.enter(Phase::Handshake)?;
        self.exchanger
            .announce(material.handshake_word, "Send handshake data")?;

        self.enter(Phase::Length)?;
        let length_word = image.length_word();
        let length_response = self
            .exchanger
            .announce(length_word, "Send length info, receive finalizer byte")?;
        session.set_finalizer(derive_finalizer(length_response, material.handshake_data));
        debug!(finalizer = %Hex(session.finalizer()), "Finalizer derived");

        self.enter(Phase::Payload)?;
        send_payload(
            &mut self.exchanger,
            &mut cursor,
            &mut session,
            image.transfer_size(),
        )?;

        self.enter(Phase::Finalize)?;
        let checksum = finalize(&mut session);
        self.exchanger.wait_until(CMD_CRC_POLL, RESP_CRC_READY)?;
        self.exchanger
            .announce(CMD_CRC_EXCHANGE, "Peer ready with checksum")?;
        let peer_checksum = self.exchanger.announce(checksum, "Exchange checksum")?;

        if peer_checksum != checksum {
            global_metrics().checksum_mismatch();
            warn!(
                ours = %Hex(checksum),
                theirs = %Hex(peer_checksum),
                "Peer returned a different checksum"
            );
        }

        self.mark(Phase::Done);
        info!(checksum = %Hex(checksum), "Multiboot done");

        Ok(MultibootReport {
            transfer_size: image.transfer_size(),
            length_word,
            handshake_word: material.handshake_word,
            key_byte: material.key_byte,
            keystream_seed: material.keystream_seed,
            finalizer: session.finalizer(),
            header_units: session.header_units(),
            payload_words: session.payload_words(),
            final_offset: session.payload_offset(),
            checksum,
            peer_checksum,
            exchanges: self.exchanger.exchanges() - start_exchanges,
        })
    }
}
