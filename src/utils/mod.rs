//! # Utility Modules
//!
//! Supporting utilities for timing, cancellation, logging and metrics.
//!
//! ## Components
//! - **Clock**: injectable time source and sleeper for polling loops
//! - **Cancel**: shared cancellation flag checked between attempts
//! - **Logging**: `tracing-subscriber` setup driven by [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: process-wide atomic counters for sessions and exchanges

pub mod cancel;
pub mod clock;
pub mod logging;
pub mod metrics;

pub use cancel::CancelToken;
pub use clock::{Clock, ManualClock, SystemClock};
