//! Per-frame server logic
// (c) 2024 Ross Younger
//!
//! Each incoming frame is handled to completion before the next is looked at, so
//! nothing here needs locking.
//!
//! Failures come in two flavours and the difference matters:
//! * a bad credential, a bad filename or a file that cannot be opened is answered
//!   with a rejecting `ACK` that says what was wrong;
//! * a frame that arrives before its phase (e.g. `DATA` before `WRQ`) gets no reply
//!   at all, nor does a new peer when the session table is full.

use std::{fmt, net::SocketAddr, time::Duration};

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::{
    session::{Session, SessionState},
    storage::Storage,
    table::{Lookup, SessionTable},
};
use crate::{
    config::Configuration,
    protocol::{FILENAME_LENGTH, Frame, MessageType, SeqBit},
};

/// What became of a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A valid credential was presented
    Authenticated,
    /// The credential was wrong
    CredentialRejected,
    /// The output file was created
    WriteOpened(String),
    /// The requested filename was refused
    FilenameRejected(String),
    /// The output file could not be created
    OpenFailed(String),
    /// A new chunk was written, of this many bytes
    Appended(usize),
    /// A repeat of something already handled; re-acknowledged
    Duplicate,
    /// A DATA frame with an impossible sequence value; the last good state was re-acknowledged
    SequenceMismatch,
    /// A frame that was not valid in the session's current phase; dropped
    PreconditionViolation,
    /// The session table was full; dropped
    NoCapacity,
    /// Writing to the output failed; the transfer was abandoned
    WriteFailed(String),
    /// The transfer completed with this many bytes written
    Finished(u64),
    /// The session was idle for too long and has been removed
    Evicted,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Authenticated => f.write_str("authenticated"),
            Event::CredentialRejected => f.write_str("bad credential"),
            Event::WriteOpened(name) => write!(f, "receiving {name}"),
            Event::FilenameRejected(why) => write!(f, "filename refused: {why}"),
            Event::OpenFailed(why) => write!(f, "could not create file: {why}"),
            Event::Appended(len) => write!(f, "wrote {len} bytes"),
            Event::Duplicate => f.write_str("duplicate, re-acknowledged"),
            Event::SequenceMismatch => f.write_str("sequence mismatch, re-acknowledged"),
            Event::PreconditionViolation => f.write_str("out of phase, dropped"),
            Event::NoCapacity => f.write_str("session table full, dropped"),
            Event::WriteFailed(why) => write!(f, "write failed, transfer abandoned: {why}"),
            Event::Finished(bytes) => write!(f, "transfer complete, {bytes} bytes"),
            Event::Evicted => f.write_str("idle session evicted"),
        }
    }
}

impl Event {
    /// Logs the event at a level befitting its importance
    pub fn log(&self, peer: SocketAddr) {
        match self {
            Event::Appended(_) | Event::Duplicate => trace!("{peer}: {self}"),
            Event::Authenticated | Event::SequenceMismatch | Event::PreconditionViolation => {
                debug!("{peer}: {self}");
            }
            Event::WriteOpened(_) | Event::Finished(_) | Event::Evicted => info!("{peer}: {self}"),
            Event::CredentialRejected
            | Event::FilenameRejected(_)
            | Event::OpenFailed(_)
            | Event::NoCapacity
            | Event::WriteFailed(_) => warn!("{peer}: {self}"),
        }
    }
}

/// The outcome of [`Dispatcher::dispatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Frame to send back to the peer, if any
    pub reply: Option<Frame>,
    /// What happened
    pub event: Event,
}

impl Dispatch {
    fn reply(frame: Frame, event: Event) -> Self {
        Self {
            reply: Some(frame),
            event,
        }
    }

    fn silent(event: Event) -> Self {
        Self { reply: None, event }
    }
}

/// Server protocol state machine: owns the session table and decides how to answer each frame
#[derive(Debug)]
pub struct Dispatcher<S> {
    storage: S,
    table: SessionTable,
    credential: String,
    idle_timeout: Option<Duration>,
}

impl<S: Storage> Dispatcher<S> {
    /// Constructor
    #[must_use]
    pub fn new(storage: S, config: &Configuration) -> Self {
        Self {
            storage,
            table: SessionTable::new(config.max_sessions),
            credential: config.credential.clone(),
            idle_timeout: config.idle_timeout(),
        }
    }

    /// Read-only access to the sessions
    #[must_use]
    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    /// Handles one frame from `peer`
    pub async fn dispatch(&mut self, peer: SocketAddr, frame: &Frame, now: Instant) -> Dispatch {
        let _ = self.evict_idle(now).await;
        if let Some(session) = self.table.get_mut(&peer) {
            session.touch(now);
        }
        match frame.kind() {
            MessageType::Hello => self.on_hello(peer, frame, now),
            MessageType::Wrq => self.on_write_request(peer, frame).await,
            MessageType::Data => self.on_data(peer, frame).await,
            MessageType::Fin => self.on_fin(peer, frame).await,
            MessageType::Ack => Dispatch::silent(Event::PreconditionViolation),
        }
    }

    fn on_hello(&mut self, peer: SocketAddr, frame: &Frame, now: Instant) -> Dispatch {
        let accepted = frame.text() == self.credential.as_bytes();
        let created = match self.table.find_or_create(peer, now) {
            Lookup::Full => return Dispatch::silent(Event::NoCapacity),
            Lookup::Existing(session) => {
                if accepted {
                    if session.state != SessionState::Receiving {
                        session.state = SessionState::Authenticated;
                        session.last_acked = SeqBit::Zero;
                    }
                    return Dispatch::reply(Frame::ack(SeqBit::Zero), Event::Authenticated);
                }
                false
            }
            Lookup::Created(session) => {
                if accepted {
                    session.state = SessionState::Authenticated;
                    return Dispatch::reply(Frame::ack(SeqBit::Zero), Event::Authenticated);
                }
                true
            }
        };
        if created {
            // A failed first attempt must not tie up a slot
            let _ = self.table.remove(&peer);
        }
        Dispatch::reply(
            Frame::reject(SeqBit::Zero, "authentication failed"),
            Event::CredentialRejected,
        )
    }

    async fn on_write_request(&mut self, peer: SocketAddr, frame: &Frame) -> Dispatch {
        let Some(session) = self.table.get_mut(&peer) else {
            return Dispatch::silent(Event::PreconditionViolation);
        };
        if !session.is_authenticated() {
            return Dispatch::silent(Event::PreconditionViolation);
        }
        let name = match validate_filename(frame.text()) {
            Ok(name) => name,
            Err(why) => {
                return Dispatch::reply(
                    Frame::reject(SeqBit::One, &why),
                    Event::FilenameRejected(why),
                );
            }
        };
        if session.state == SessionState::Receiving {
            return if session.filename() == Some(name) {
                Dispatch::reply(Frame::ack(SeqBit::One), Event::Duplicate)
            } else {
                let why = "a transfer is already in progress".to_owned();
                Dispatch::reply(
                    Frame::reject(SeqBit::One, &why),
                    Event::FilenameRejected(why),
                )
            };
        }
        match self.storage.create(name).await {
            Ok(sink) => {
                session.sink = Some(sink);
                session.filename = Some(name.to_owned());
                session.state = SessionState::Receiving;
                session.last_acked = SeqBit::One;
                session.bytes_written = 0;
                Dispatch::reply(Frame::ack(SeqBit::One), Event::WriteOpened(name.to_owned()))
            }
            Err(e) => {
                let why = e.to_string();
                Dispatch::reply(Frame::reject(SeqBit::One, &why), Event::OpenFailed(why))
            }
        }
    }

    async fn on_data(&mut self, peer: SocketAddr, frame: &Frame) -> Dispatch {
        let Some(session) = self.table.get_mut(&peer) else {
            return Dispatch::silent(Event::PreconditionViolation);
        };
        if session.state != SessionState::Receiving {
            return Dispatch::silent(Event::PreconditionViolation);
        }
        let last = session.last_acked;
        match frame.seq_bit() {
            Some(seq) if seq == last.flip() => (),
            Some(_) => return Dispatch::reply(Frame::ack(last), Event::Duplicate),
            None => return Dispatch::reply(Frame::ack(last), Event::SequenceMismatch),
        }
        let Some(sink) = session.sink.as_mut() else {
            return Dispatch::silent(Event::PreconditionViolation);
        };
        let data = frame.payload();
        if let Err(e) = sink.append(data).await {
            let why = e.to_string();
            if let Some(mut session) = self.table.remove(&peer) {
                session.close().await;
            }
            return Dispatch::reply(Frame::reject(frame.seq(), &why), Event::WriteFailed(why));
        }
        session.last_acked = last.flip();
        session.bytes_written += data.len() as u64;
        Dispatch::reply(Frame::ack(session.last_acked), Event::Appended(data.len()))
    }

    async fn on_fin(&mut self, peer: SocketAddr, frame: &Frame) -> Dispatch {
        let reply = Frame::ack(frame.seq());
        match self.table.remove(&peer) {
            Some(mut session) => {
                session.close().await;
                Dispatch::reply(reply, Event::Finished(session.bytes_written))
            }
            // Most likely our previous ACK to this FIN was lost
            None => Dispatch::reply(reply, Event::Duplicate),
        }
    }

    /// Removes sessions that have been idle too long, closing their output.
    ///
    /// Does nothing if idle eviction is disabled. Returns the number of sessions evicted.
    pub async fn evict_idle(&mut self, now: Instant) -> usize {
        let Some(idle) = self.idle_timeout else {
            return 0;
        };
        let evicted = self.table.evict_idle(now, idle);
        let count = evicted.len();
        for (peer, session) in evicted {
            close_session(peer, session, &Event::Evicted).await;
        }
        count
    }

    /// Closes every session. Used at shutdown.
    pub async fn close_all(&mut self) {
        for (peer, mut session) in self.table.drain() {
            if session.state == SessionState::Receiving {
                info!(
                    "{peer}: closing incomplete {} ({} bytes) at shutdown",
                    session.filename().unwrap_or_default(),
                    session.bytes_written
                );
            }
            session.close().await;
        }
    }
}

async fn close_session(peer: SocketAddr, mut session: Session, event: &Event) {
    event.log(peer);
    session.close().await;
}

/// Checks a WRQ filename. The text is used verbatim, so it must be valid UTF-8.
fn validate_filename(text: &[u8]) -> Result<&str, String> {
    if !FILENAME_LENGTH.contains(&text.len()) {
        return Err(format!(
            "filename must be {min} to {max} bytes long (got {len})",
            min = FILENAME_LENGTH.start(),
            max = FILENAME_LENGTH.end(),
            len = text.len()
        ));
    }
    std::str::from_utf8(text).map_err(|_| "filename is not valid UTF-8".to_owned())
}
