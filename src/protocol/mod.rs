//! # Protocol Layer
//!
//! The multiboot session: word exchange, handshake phases, payload encoding and
//! checksum finalization.
//!
//! ## Components
//! - **Exchanger**: `exchange` / `wait_until` over any [`Transport`](crate::transport::Transport)
//! - **Session**: per-attempt state and key derivation from peer responses
//! - **Encoder**: payload encryption and checksum folding
//! - **Handshake**: the phase sequence from discovery to the checksum exchange
//!
//! ## Flow
//! ```text
//! Host                                   Peer
//!  | 0x6202 (repeat)        --->            |
//!  |                        <--- 0x72026202 |
//!  | 0x6202, 0x6102, 95 header units        |
//!  | 0x6200, 0x6202, 0x63D1 x2              |
//!  |                        <--- 0x73kk.... |
//!  | 0x64hh, length word                    |
//!  |                        <--- 0x..cc.... |
//!  | encrypted payload words                |
//!  | 0x65 (repeat)          --->            |
//!  |                        <--- 0x00750065 |
//!  | 0x66, checksum                         |
//! ```

pub mod encoder;
pub mod exchanger;
pub mod handshake;
pub mod session;
