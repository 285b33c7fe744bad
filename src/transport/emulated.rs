//! In-process model of the receiving device.
//!
//! `EmulatedDevice` answers every word the way a cooperative peer would, and
//! independently rebuilds the image: it captures the raw header, derives the same
//! session keys from the bytes it handed out, decrypts each payload word and
//! keeps its own checksum. At the end it compares the host's checksum with its
//! own. Anything out of sequence moves it to [`DeviceState::Failed`], after which
//! it answers `0` forever.

use crate::core::checksum::Checksum;
use crate::core::image::{
    payload_words, transfer_size_from_length_word, HEADER_BYTES, HEADER_UNITS,
};
use crate::core::keystream::{encrypt_word, Keystream};
use crate::error::Result;
use crate::protocol::handshake::{
    CMD_CRC_EXCHANGE, CMD_CRC_POLL, CMD_DISCOVER, CMD_HEADER_DONE, CMD_PALETTE, CMD_RECOGNIZED,
    RESP_CRC_READY, RESP_DISCOVERED,
};
use crate::protocol::session::{derive_finalizer, KeyMaterial};
use crate::transport::Transport;
use tracing::{debug, warn};

/// Answer while the checksum is still being computed.
pub const RESP_CRC_BUSY: u32 = 0x0074_0065;

/// Prefix of peer responses that carry a data byte in bits 16..24.
const RESP_DATA_PREFIX: u32 = 0x7300_0000;

/// Where the device is in the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    Idle,
    Recognition,
    Header { units: usize },
    AwaitHeaderEnd,
    AwaitReexchange,
    Palette { seen: u8 },
    Handshake,
    Length,
    Payload { remaining: usize },
    AwaitCrc,
    CrcReady,
    CrcExchange,
    Done,
    Failed(String),
}

/// Tunables for the emulated peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSettings {
    /// Key byte returned in the second palette response
    pub key_byte: u8,
    /// Byte returned in the length response
    pub finalizer_byte: u8,
    /// Discovery polls answered with silence before the device shows up
    pub discovery_delay: u32,
    /// Checksum polls answered as busy before the device is ready
    pub crc_delay: u32,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            key_byte: 0xA5,
            finalizer_byte: 0xCC,
            discovery_delay: 3,
            crc_delay: 2,
        }
    }
}

pub struct EmulatedDevice {
    settings: DeviceSettings,
    state: DeviceState,
    polls: u32,
    received: Vec<u8>,
    material: Option<KeyMaterial>,
    keystream: Keystream,
    checksum: Checksum,
    offset: u32,
    transfer_size: usize,
    verdict: Option<bool>,
    exchanges: u64,
}

impl EmulatedDevice {
    pub fn new(settings: DeviceSettings) -> Self {
        Self {
            settings,
            state: DeviceState::Idle,
            polls: 0,
            received: Vec::new(),
            material: None,
            keystream: Keystream::new(0),
            checksum: Checksum::new(),
            offset: 0,
            transfer_size: 0,
            verdict: None,
            exchanges: 0,
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    /// Image bytes rebuilt from the header and decrypted payload, padding included.
    pub fn received_image(&self) -> &[u8] {
        &self.received
    }

    /// Transfer size decoded from the length word.
    pub fn transfer_size(&self) -> usize {
        self.transfer_size
    }

    /// The device's own checksum.
    pub fn checksum(&self) -> u32 {
        self.checksum.value()
    }

    /// `Some(true)` if the host's checksum matched, `None` before the exchange.
    pub fn verdict(&self) -> Option<bool> {
        self.verdict
    }

    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, DeviceState::Failed(_))
    }

    fn data_response(&self, byte: u8, low: u32) -> u32 {
        RESP_DATA_PREFIX | u32::from(byte) << 16 | (low & 0xFFFF)
    }

    fn fail(&mut self, reason: String) -> u32 {
        warn!(%reason, "Emulated device rejected the session");
        self.state = DeviceState::Failed(reason);
        0
    }

    fn unexpected(&mut self, word: u32) -> u32 {
        let reason = format!("unexpected word {word:#010x} in state {:?}", self.state);
        self.fail(reason)
    }

    fn start_payload(&mut self, length_word: u32) {
        let size = transfer_size_from_length_word(length_word).max(0) as usize;
        self.transfer_size = size;
        let remaining = payload_words(size);
        debug!(transfer_size = size, words = remaining, "Emulated device expecting payload");
        self.state = if remaining == 0 {
            self.finish_payload();
            DeviceState::AwaitCrc
        } else {
            DeviceState::Payload { remaining }
        };
    }

    fn finish_payload(&mut self) {
        if let Some(material) = self.material {
            let response = self.data_response(self.settings.finalizer_byte, 0);
            self.checksum
                .fold(derive_finalizer(response, material.handshake_data));
        }
        self.polls = 0;
    }

    /// Produce the response to one received word.
    pub fn respond(&mut self, word: u32) -> u32 {
        self.exchanges += 1;
        match self.state.clone() {
            DeviceState::Idle => {
                if word != CMD_DISCOVER {
                    return 0;
                }
                self.polls += 1;
                if self.polls > self.settings.discovery_delay {
                    self.state = DeviceState::Recognition;
                    RESP_DISCOVERED
                } else {
                    0
                }
            }
            DeviceState::Recognition => match word {
                CMD_DISCOVER => RESP_DISCOVERED,
                CMD_RECOGNIZED => {
                    self.state = DeviceState::Header { units: 0 };
                    0x7202_0000 | CMD_RECOGNIZED
                }
                other => self.unexpected(other),
            },
            DeviceState::Header { units } => {
                self.received.push(word as u8);
                self.received.push((word >> 8) as u8);
                let units = units + 1;
                self.state = if units == HEADER_UNITS {
                    self.offset = HEADER_BYTES as u32;
                    DeviceState::AwaitHeaderEnd
                } else {
                    DeviceState::Header { units }
                };
                0x7202_0000 | (units as u32 * 2)
            }
            DeviceState::AwaitHeaderEnd => match word {
                CMD_HEADER_DONE => {
                    self.state = DeviceState::AwaitReexchange;
                    0x7202_0000 | CMD_HEADER_DONE
                }
                other => self.unexpected(other),
            },
            DeviceState::AwaitReexchange => match word {
                CMD_DISCOVER => {
                    self.state = DeviceState::Palette { seen: 0 };
                    RESP_DISCOVERED
                }
                other => self.unexpected(other),
            },
            DeviceState::Palette { seen } => match word {
                CMD_PALETTE => {
                    let response = self.data_response(self.settings.key_byte, CMD_PALETTE);
                    if seen + 1 == 2 {
                        let material = KeyMaterial::from_response(response);
                        self.keystream = Keystream::new(material.keystream_seed);
                        self.material = Some(material);
                        self.state = DeviceState::Handshake;
                    } else {
                        self.state = DeviceState::Palette { seen: seen + 1 };
                    }
                    response
                }
                other => self.unexpected(other),
            },
            DeviceState::Handshake => {
                let expected = self.material.map(|m| m.handshake_word);
                if Some(word) == expected {
                    self.state = DeviceState::Length;
                    self.data_response(self.settings.key_byte, word)
                } else {
                    self.fail(format!("bad handshake word {word:#010x}"))
                }
            }
            DeviceState::Length => {
                let response = self.data_response(self.settings.finalizer_byte, 0);
                self.start_payload(word);
                response
            }
            DeviceState::Payload { remaining } => {
                let key = self.keystream.advance();
                let plain = encrypt_word(word, self.offset, key);
                self.checksum.fold(plain);
                self.received.extend_from_slice(&plain.to_le_bytes());
                self.offset = self.offset.wrapping_add(4);

                let remaining = remaining - 1;
                if remaining == 0 {
                    self.finish_payload();
                    self.state = DeviceState::AwaitCrc;
                } else {
                    self.state = DeviceState::Payload { remaining };
                }
                self.offset & 0xFFFF
            }
            DeviceState::AwaitCrc => match word {
                CMD_CRC_POLL => {
                    self.polls += 1;
                    if self.polls > self.settings.crc_delay {
                        self.state = DeviceState::CrcReady;
                        RESP_CRC_READY
                    } else {
                        RESP_CRC_BUSY
                    }
                }
                other => self.unexpected(other),
            },
            DeviceState::CrcReady => match word {
                CMD_CRC_POLL => RESP_CRC_READY,
                CMD_CRC_EXCHANGE => {
                    self.state = DeviceState::CrcExchange;
                    0x0075_0000 | CMD_CRC_EXCHANGE
                }
                other => self.unexpected(other),
            },
            DeviceState::CrcExchange => {
                let ours = self.checksum.value();
                self.verdict = Some(word == ours);
                self.state = DeviceState::Done;
                debug!(matched = word == ours, "Emulated device compared checksums");
                ours
            }
            DeviceState::Done | DeviceState::Failed(_) => 0,
        }
    }
}

impl Default for EmulatedDevice {
    fn default() -> Self {
        Self::new(DeviceSettings::default())
    }
}

impl Transport for EmulatedDevice {
    fn exchange(&mut self, word: u32) -> Result<u32> {
        Ok(self.respond(word))
    }
}
