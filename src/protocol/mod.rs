//! swcp wire protocol definitions
// (c) 2024 Ross Younger
//!
//! Every message is a single datagram carrying one [`Frame`]:
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 1 | [`MessageType`] |
//! | 1 | 1 | sequence bit (0 or 1) |
//! | 2 | 0..=[`MAX_PAYLOAD`] | payload |
//!
//! There is no length field and no checksum; the payload length is whatever
//! is left of the datagram after the header.
//!
//! An upload is a strict stop-and-wait exchange, one outstanding frame at a time:
//!
//! * C ➡️ S: `HELLO` seq 0, credential text. S ➡️ C: `ACK` seq 0.
//! * C ➡️ S: `WRQ` seq 1, destination filename text. S ➡️ C: `ACK` seq 1.
//! * C ➡️ S: `DATA` seq 0, 1, 0, ... one chunk each. S ➡️ C: `ACK` with the same seq.
//! * C ➡️ S: `FIN`, seq the complement of the last acknowledged seq. S ➡️ C: `ACK`.
//!
//! An `ACK` whose payload carries text is a rejection; the text explains why.
//! Text payloads are NUL-terminated.

use std::ops::RangeInclusive;

use static_assertions::const_assert;

mod frame;
pub use frame::{Frame, FrameError, MessageType, SeqBit};

/// Size of the fixed frame header
pub const HEADER_SIZE: usize = 2;

/// Largest payload a single frame may carry
pub const MAX_PAYLOAD: usize = 1470;

/// Largest datagram a valid frame may occupy
pub const MAX_FRAME: usize = HEADER_SIZE + MAX_PAYLOAD;

/// Buffer size to use when receiving.
///
/// This is one byte more than [`MAX_FRAME`] so that an oversized datagram is noticed
/// instead of being silently truncated to something that looks valid.
pub const RECV_BUFFER_SIZE: usize = MAX_FRAME + 1;

// A frame must fit in a single unfragmented IPv4 datagram on a 1500 byte MTU path.
const_assert!(MAX_FRAME <= 1500 - 20 - 8);

/// Well-known server port
pub const DEFAULT_PORT: u16 = 20252;

/// Shared secret presented by the client in its `HELLO`
pub const DEFAULT_CREDENTIAL: &str = "g23-889d";

/// Permitted length of a destination filename, in bytes
pub const FILENAME_LENGTH: RangeInclusive<usize> = 4..=10;
