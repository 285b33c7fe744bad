//! Word exchanger: the engine's only view of the link.
//!
//! Wraps a [`Transport`] with logging, metrics, cancellation and the polling
//! helper used during discovery and checksum-ready signalling.

use crate::error::{ProtocolError, Result};
use crate::transport::Transport;
use crate::utils::cancel::CancelToken;
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::metrics::global_metrics;
use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

/// How `wait_until` polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between attempts
    pub interval: Duration,
    /// Wall-clock budget for one wait, `None` for no deadline
    pub timeout: Option<Duration>,
    /// Attempt budget for one wait, `None` for no limit
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    /// Poll forever at the default 10 ms interval.
    pub fn unbounded() -> Self {
        Self {
            interval: crate::config::DEFAULT_POLL_INTERVAL,
            timeout: None,
            max_attempts: None,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: crate::config::DEFAULT_POLL_INTERVAL,
            timeout: Some(crate::config::DEFAULT_POLL_TIMEOUT),
            max_attempts: None,
        }
    }
}

pub struct WordExchanger<T, C = SystemClock> {
    transport: T,
    clock: C,
    policy: PollPolicy,
    cancel: CancelToken,
    announce: bool,
    exchanges: u64,
}

impl<T: Transport> WordExchanger<T, SystemClock> {
    pub fn new(transport: T) -> Self {
        Self::with_clock(transport, SystemClock)
    }
}

impl<T: Transport, C: Clock> WordExchanger<T, C> {
    pub fn with_clock(transport: T, clock: C) -> Self {
        Self {
            transport,
            clock,
            policy: PollPolicy::default(),
            cancel: CancelToken::new(),
            announce: false,
            exchanges: 0,
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Log every word pair at `debug` instead of `trace`.
    pub fn announce_exchanges(mut self, announce: bool) -> Self {
        self.announce = announce;
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Words exchanged so far.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send one word and return the word received in the same exchange.
    pub fn exchange(&mut self, word: u32) -> Result<u32> {
        let received = self.transport.exchange(word).map_err(|e| {
            global_metrics().transport_error();
            e
        })?;
        self.exchanges += 1;
        global_metrics().word_exchanged();

        if self.announce {
            debug!(sent = %Hex(word), received = %Hex(received), "exchange");
        } else {
            trace!(sent = %Hex(word), received = %Hex(received), "exchange");
        }
        Ok(received)
    }

    /// Exchange and log the pair with a note describing the step.
    pub fn announce(&mut self, word: u32, note: &str) -> Result<u32> {
        let received = self.exchange(word)?;
        debug!(sent = %Hex(word), received = %Hex(received), "{note}");
        Ok(received)
    }

    /// Repeat `exchange(word)` until the response equals `expected`.
    ///
    /// Sleeps the policy interval between attempts and checks cancellation before
    /// each one. Returns the number of attempts it took.
    #[instrument(skip(self), fields(word = %Hex(word), expected = %Hex(expected)))]
    pub fn wait_until(&mut self, word: u32, expected: u32) -> Result<u32> {
        let deadline = self.policy.timeout.map(|t| self.clock.now() + t);
        let mut attempts: u32 = 0;

        loop {
            self.cancel.check()?;

            let received = self.exchange(word)?;
            attempts = attempts.saturating_add(1);
            global_metrics().poll_attempt();

            if received == expected {
                debug!(attempts, "Peer responded");
                return Ok(attempts);
            }

            let out_of_attempts = self.policy.max_attempts.is_some_and(|max| attempts >= max);
            let out_of_time = deadline.is_some_and(|d| self.clock.now() >= d);
            if out_of_attempts || out_of_time {
                global_metrics().peer_timeout();
                warn!(attempts, last = %Hex(received), "Peer never produced the expected word");
                return Err(ProtocolError::PeerUnresponsive {
                    sent: word,
                    expected,
                    attempts,
                });
            }

            self.clock.sleep(self.policy.interval);
        }
    }
}

/// Formats a word as `0x%08x` in log fields.
pub(crate) struct Hex(pub u32);

impl std::fmt::Display for Hex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
