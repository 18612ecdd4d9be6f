//! Per-peer session state
// (c) 2024 Ross Younger

use std::fmt::{self, Debug};

use tokio::time::Instant;

use super::storage::ByteSink;
use crate::protocol::SeqBit;

/// Where a session has got to.
///
/// `Unauthenticated` → `Authenticated` → `Receiving`. A session that finishes is
/// removed from the table rather than being given a final state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Newly created; no valid credential seen yet
    Unauthenticated,
    /// HELLO accepted
    Authenticated,
    /// WRQ accepted, output sink open
    Receiving,
}

/// Server-side state for one peer
pub struct Session {
    pub(super) state: SessionState,
    pub(super) last_acked: SeqBit,
    pub(super) filename: Option<String>,
    pub(super) sink: Option<Box<dyn ByteSink>>,
    pub(super) bytes_written: u64,
    pub(super) last_activity: Instant,
}

impl Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("last_acked", &self.last_acked)
            .field("filename", &self.filename)
            .field("sink_open", &self.sink.is_some())
            .field("bytes_written", &self.bytes_written)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(super) fn new(now: Instant) -> Self {
        Self {
            state: SessionState::Unauthenticated,
            last_acked: SeqBit::Zero,
            filename: None,
            sink: None,
            bytes_written: 0,
            last_activity: now,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sequence bit of the last frame acknowledged
    #[must_use]
    pub fn last_acked(&self) -> SeqBit {
        self.last_acked
    }

    /// Whether a valid credential has been presented
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state != SessionState::Unauthenticated
    }

    /// Name of the file being received, if any
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Bytes appended to the output so far
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub(super) fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Closes the output, if there is one. Errors are logged, not returned: by the time
    /// this is called the session is going away regardless.
    pub(super) async fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.finish().await {
                tracing::warn!(
                    "failed to close {}: {e}",
                    self.filename.as_deref().unwrap_or("<unnamed>")
                );
            }
        }
    }
}
