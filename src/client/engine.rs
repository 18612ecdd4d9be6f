//! Retransmission engine
// (c) 2024 Ross Younger
//!
//! Sends one frame at a time and waits for its acknowledgement.
//!
//! Each attempt is given a fixed [`AttemptBudget`]. A reply that is not the
//! acknowledgement we want is discarded, and the wait carries on with whatever is
//! left of the same budget; it neither restarts the clock nor provokes a
//! retransmission. Only when the budget is spent do we transmit again, with a
//! fresh budget, up to the attempt limit.

use std::{io, time::Duration};

use human_repr::HumanDuration as _;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::budget::AttemptBudget;
use crate::{
    config::Configuration,
    protocol::{Frame, RECV_BUFFER_SIZE, SeqBit},
    transport::DatagramChannel,
};

/// Timing parameters for the [`Engine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetransmitPolicy {
    /// Time allowed for each attempt to be acknowledged
    pub budget: Duration,
    /// Maximum number of transmissions of any one frame
    pub attempts: u32,
}

impl Default for RetransmitPolicy {
    fn default() -> Self {
        Self {
            budget: Duration::from_millis(3000),
            attempts: 3,
        }
    }
}

impl From<&Configuration> for RetransmitPolicy {
    fn from(config: &Configuration) -> Self {
        Self {
            budget: config.timeout(),
            attempts: config.attempts,
        }
    }
}

/// Ways in which an exchange can fail
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The socket failed. This is not retried.
    #[error("transport error")]
    Transport(#[from] io::Error),
    /// No acknowledgement arrived in any attempt
    #[error("no acknowledgement after {attempts} attempts")]
    Timeout {
        /// How many times we transmitted
        attempts: u32,
    },
    /// The peer acknowledged with an error message. This is not retried.
    #[error("rejected by peer: {0}")]
    Rejected(String),
}

/// Counters kept by the [`Engine`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Datagrams sent, including retransmissions
    pub transmissions: u64,
    /// Datagrams sent because an earlier attempt went unacknowledged
    pub retransmissions: u64,
    /// Replies discarded because they were not the acknowledgement we were waiting for
    pub discarded: u64,
}

enum Verdict {
    Accepted,
    Rejected(String),
}

/// Stop-and-wait sender over a [`DatagramChannel`]
#[derive(Debug)]
pub struct Engine<C> {
    channel: C,
    policy: RetransmitPolicy,
    stats: EngineStats,
    buf: Box<[u8]>,
}

impl<C: DatagramChannel> Engine<C> {
    /// Constructor
    #[must_use]
    pub fn new(channel: C, policy: RetransmitPolicy) -> Self {
        Self {
            channel,
            policy,
            stats: EngineStats::default(),
            buf: vec![0u8; RECV_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Accessor
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Accessor
    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Sends `frame` and waits for an `ACK` carrying `expected`.
    ///
    /// Returns when that acknowledgement arrives. An acknowledgement carrying text is
    /// reported as [`EngineError::Rejected`].
    pub async fn send_and_wait_ack(
        &mut self,
        frame: &Frame,
        expected: SeqBit,
    ) -> Result<(), EngineError> {
        let wire = frame.encode();
        for attempt in 1..=self.policy.attempts {
            if attempt > 1 {
                self.stats.retransmissions += 1;
            }
            trace!("sending {frame} (attempt {attempt})");
            self.channel.send_datagram(&wire).await?;
            self.stats.transmissions += 1;

            let budget = AttemptBudget::start(self.policy.budget, Instant::now());
            match self.await_ack(expected, &budget).await? {
                Some(Verdict::Accepted) => return Ok(()),
                Some(Verdict::Rejected(reason)) => return Err(EngineError::Rejected(reason)),
                None => warn!(
                    "no ACK for {kind} seq {expected} within {budget} (attempt {attempt}/{max})",
                    kind = frame.kind(),
                    budget = self.policy.budget.human_duration(),
                    max = self.policy.attempts,
                ),
            }
        }
        Err(EngineError::Timeout {
            attempts: self.policy.attempts,
        })
    }

    /// Waits out one budget. None means it expired.
    async fn await_ack(
        &mut self,
        expected: SeqBit,
        budget: &AttemptBudget,
    ) -> io::Result<Option<Verdict>> {
        while let Some(remaining) = budget.remaining(Instant::now()) {
            let Ok(received) =
                tokio::time::timeout(remaining, self.channel.recv_datagram(&mut self.buf)).await
            else {
                break;
            };
            let len = match received {
                Ok(len) => len,
                // ICMP port unreachable, reported through the connected socket
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    debug!("peer unreachable, still waiting: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match Frame::decode(&self.buf[..len]) {
                Ok(reply) if reply.is_ack_for(expected) => {
                    trace!("received {reply}");
                    return Ok(Some(if reply.text().is_empty() {
                        Verdict::Accepted
                    } else {
                        Verdict::Rejected(reply.text_lossy().into_owned())
                    }));
                }
                Ok(reply) => {
                    self.stats.discarded += 1;
                    debug!("discarding {reply} while waiting for ACK seq {expected}");
                }
                Err(e) => {
                    self.stats.discarded += 1;
                    debug!("discarding bad reply: {e}");
                }
            }
        }
        Ok(None)
    }
}
