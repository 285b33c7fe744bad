//! # multiboot-protocol
//!
//! Host side of the multiboot handshake: pushes a program image to a peer over a
//! synchronous 32-bit word link where every word sent yields exactly one word back.
//!
//! ## Layout
//! - [`core`]: checksum, keystream cipher and image framing
//! - [`protocol`]: word exchange, polling, session keys and the phase sequence
//! - [`transport`]: link implementations (character device, Unix socket, emulated peer)
//! - [`config`]: TOML / environment configuration
//! - [`utils`]: clock, cancellation, logging and metrics
//!
//! ## Example
//! ```no_run
//! use multiboot_protocol::{Image, Multiboot};
//! use multiboot_protocol::transport::emulated::EmulatedDevice;
//!
//! # fn main() -> multiboot_protocol::Result<()> {
//! let image = Image::from_file("game.mb")?;
//! let mut session = Multiboot::new(EmulatedDevice::default());
//! let report = session.run(&image)?;
//! println!("checksum {:#06x}", report.checksum);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::image::Image;
pub use crate::error::{ErrorKind, ProtocolError, Result};
pub use crate::protocol::exchanger::{PollPolicy, WordExchanger};
pub use crate::protocol::handshake::{Multiboot, MultibootReport, Phase};
pub use crate::transport::Transport;
pub use crate::utils::cancel::CancelToken;
