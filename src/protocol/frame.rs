//! Frame codec
// (c) 2024 Ross Younger

use std::{borrow::Cow, fmt::Display};

use bytes::{BufMut as _, Bytes, BytesMut};

use super::{HEADER_SIZE, MAX_FRAME, MAX_PAYLOAD};

/// The type of a [`Frame`], which is its first byte on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::FromRepr)]
#[strum(serialize_all = "UPPERCASE")]
#[repr(u8)]
pub enum MessageType {
    /// Client authenticates. Payload is the credential text.
    Hello = 1,
    /// Client requests to write a file. Payload is the filename text.
    Wrq = 2,
    /// One chunk of file content
    Data = 3,
    /// Acknowledgement. An empty payload is success; text is a rejection reason.
    Ack = 4,
    /// End of transfer
    Fin = 5,
}

/// The alternating sequence bit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SeqBit {
    #[default]
    #[allow(missing_docs)]
    Zero,
    #[allow(missing_docs)]
    One,
}

impl SeqBit {
    /// Interprets a wire value. Anything other than 0 or 1 is not a valid sequence bit.
    #[must_use]
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Zero),
            1 => Some(Self::One),
            _ => None,
        }
    }

    /// The other value
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }
}

impl From<SeqBit> for u8 {
    fn from(value: SeqBit) -> Self {
        match value {
            SeqBit::Zero => 0,
            SeqBit::One => 1,
        }
    }
}

impl Display for SeqBit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Reasons a frame could not be encoded or decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The datagram does not contain a whole header
    #[error("datagram of {0} bytes is shorter than the frame header")]
    TooShort(usize),
    /// The datagram is larger than any valid frame
    #[error("datagram of {0} bytes exceeds the maximum frame size of {max}", max = MAX_FRAME)]
    TooLong(usize),
    /// The type byte is not one we know
    #[error("unknown message type {0}")]
    UnknownType(u8),
    /// The payload would not fit in a frame
    #[error("payload of {0} bytes exceeds the maximum of {max}", max = MAX_PAYLOAD)]
    PayloadTooLong(usize),
}

/// A single protocol message
///
/// The sequence number is held as it appeared on the wire, so a receiver can tell
/// a malformed sequence number apart from a valid one. Use [`Frame::seq_bit`] to interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: MessageType,
    seq: u8,
    payload: Bytes,
}

impl Frame {
    /// General constructor
    pub fn new(
        kind: MessageType,
        seq: impl Into<u8>,
        payload: impl Into<Bytes>,
    ) -> Result<Self, FrameError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLong(payload.len()));
        }
        Ok(Self {
            kind,
            seq: seq.into(),
            payload,
        })
    }

    /// Constructs a frame whose payload is NUL-terminated text
    pub fn with_text(
        kind: MessageType,
        seq: impl Into<u8>,
        text: &str,
    ) -> Result<Self, FrameError> {
        let mut buf = BytesMut::with_capacity(text.len() + 1);
        buf.put_slice(text.as_bytes());
        buf.put_u8(0);
        Self::new(kind, seq, buf.freeze())
    }

    /// `HELLO`: present a credential
    pub fn hello(credential: &str) -> Result<Self, FrameError> {
        Self::with_text(MessageType::Hello, SeqBit::Zero, credential)
    }

    /// `WRQ`: ask to write the named file
    pub fn write_request(filename: &str) -> Result<Self, FrameError> {
        Self::with_text(MessageType::Wrq, SeqBit::One, filename)
    }

    /// `DATA`: one chunk of file content
    pub fn data(seq: SeqBit, chunk: Bytes) -> Result<Self, FrameError> {
        Self::new(MessageType::Data, seq, chunk)
    }

    /// `FIN`: end of transfer
    #[must_use]
    pub fn fin(seq: SeqBit) -> Self {
        Self {
            kind: MessageType::Fin,
            seq: seq.into(),
            payload: Bytes::new(),
        }
    }

    /// A successful `ACK`
    #[must_use]
    pub fn ack(seq: impl Into<u8>) -> Self {
        Self {
            kind: MessageType::Ack,
            seq: seq.into(),
            payload: Bytes::new(),
        }
    }

    /// A rejecting `ACK`, carrying a reason.
    ///
    /// Overlong reasons are truncated to fit.
    #[must_use]
    pub fn reject(seq: impl Into<u8>, reason: &str) -> Self {
        let mut end = reason.len().min(MAX_PAYLOAD - 1);
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        let mut buf = BytesMut::with_capacity(end + 1);
        buf.put_slice(&reason.as_bytes()[..end]);
        buf.put_u8(0);
        Self {
            kind: MessageType::Ack,
            seq: seq.into(),
            payload: buf.freeze(),
        }
    }

    /// Accessor
    #[must_use]
    pub fn kind(&self) -> MessageType {
        self.kind
    }

    /// The raw sequence value
    #[must_use]
    pub fn seq(&self) -> u8 {
        self.seq
    }

    /// The sequence value, if valid
    #[must_use]
    pub fn seq_bit(&self) -> Option<SeqBit> {
        SeqBit::from_wire(self.seq)
    }

    /// Accessor
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The text portion of the payload: everything before the first NUL, or the whole
    /// payload if there is none
    #[must_use]
    pub fn text(&self) -> &[u8] {
        let end = self
            .payload
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.payload.len());
        &self.payload[..end]
    }

    /// Convenience wrapper for [`Frame::text`]
    #[must_use]
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.text())
    }

    /// Is this the acknowledgement we are waiting for?
    #[must_use]
    pub fn is_ack_for(&self, seq: SeqBit) -> bool {
        self.kind == MessageType::Ack && self.seq == u8::from(seq)
    }

    /// Serializes to a datagram
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_u8(self.kind as u8);
        buf.put_u8(self.seq);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Deserializes from a datagram.
    ///
    /// The payload is whatever follows the header; there is no length field.
    pub fn decode(datagram: &[u8]) -> Result<Self, FrameError> {
        if datagram.len() < HEADER_SIZE {
            return Err(FrameError::TooShort(datagram.len()));
        }
        if datagram.len() > MAX_FRAME {
            return Err(FrameError::TooLong(datagram.len()));
        }
        let kind =
            MessageType::from_repr(datagram[0]).ok_or(FrameError::UnknownType(datagram[0]))?;
        Ok(Self {
            kind,
            seq: datagram[1],
            payload: Bytes::copy_from_slice(&datagram[HEADER_SIZE..]),
        })
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} seq {} ({} bytes)",
            self.kind,
            self.seq,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{Frame, FrameError, MessageType, SeqBit};
    use crate::protocol::{HEADER_SIZE, MAX_FRAME, MAX_PAYLOAD};

    #[rstest]
    #[case(&[])]
    #[case(&[4])]
    fn short_datagram_rejected(#[case] datagram: &[u8]) {
        assert_eq!(
            Frame::decode(datagram),
            Err(FrameError::TooShort(datagram.len()))
        );
    }

    #[test]
    fn header_only_is_empty_payload() {
        let f = Frame::decode(&[4, 1]).unwrap();
        assert_eq!(f.kind(), MessageType::Ack);
        assert_eq!(f.seq_bit(), Some(SeqBit::One));
        assert!(f.payload().is_empty());
        assert!(f.text().is_empty());
    }

    #[test]
    fn payload_length_comes_from_datagram() {
        let mut datagram = vec![3, 0];
        datagram.extend_from_slice(&[0xAA; 17]);
        let f = Frame::decode(&datagram).unwrap();
        assert_eq!(f.payload().len(), 17);
        // an embedded NUL in binary data is just data
        datagram[5] = 0;
        let f = Frame::decode(&datagram).unwrap();
        assert_eq!(f.payload().len(), 17);
    }

    #[rstest]
    #[case(0)]
    #[case(6)]
    #[case(255)]
    fn unknown_type(#[case] code: u8) {
        assert_eq!(
            Frame::decode(&[code, 0, 1, 2]),
            Err(FrameError::UnknownType(code))
        );
    }

    #[test]
    fn oversize_datagram() {
        let datagram = vec![3u8; MAX_FRAME + 1];
        assert_eq!(
            Frame::decode(&datagram),
            Err(FrameError::TooLong(MAX_FRAME + 1))
        );
        let datagram = vec![3u8; MAX_FRAME];
        assert_eq!(
            Frame::decode(&datagram).unwrap().payload().len(),
            MAX_PAYLOAD
        );
    }

    #[test]
    fn raw_seq_is_preserved() {
        let f = Frame::decode(&[3, 7, 9]).unwrap();
        assert_eq!(f.seq(), 7);
        assert_eq!(f.seq_bit(), None);
    }

    #[test]
    fn hello_wire_format() {
        let f = Frame::hello("g23-889d").unwrap();
        assert_eq!(&f.encode()[..], b"\x01\x00g23-889d\x00");
        assert_eq!(f.text(), b"g23-889d");
    }

    #[test]
    fn write_request_wire_format() {
        let f = Frame::write_request("abcd").unwrap();
        assert_eq!(&f.encode()[..], b"\x02\x01abcd\x00");
    }

    #[test]
    fn text_without_terminator() {
        let f = Frame::decode(b"\x04\x00no nul").unwrap();
        assert_eq!(f.text_lossy(), "no nul");
    }

    #[test]
    fn nul_only_counts_as_empty_text() {
        let f = Frame::decode(&[4, 0, 0]).unwrap();
        assert_eq!(f.payload().len(), 1);
        assert!(f.text().is_empty());
    }

    #[test]
    fn text_too_long() {
        let long = "x".repeat(MAX_PAYLOAD);
        assert_eq!(
            Frame::hello(&long),
            Err(FrameError::PayloadTooLong(MAX_PAYLOAD + 1))
        );
        let fits = "x".repeat(MAX_PAYLOAD - 1);
        assert!(Frame::hello(&fits).is_ok());
    }

    #[test]
    fn data_too_long() {
        let chunk = Bytes::from(vec![0u8; MAX_PAYLOAD + 1]);
        assert_eq!(
            Frame::data(SeqBit::Zero, chunk),
            Err(FrameError::PayloadTooLong(MAX_PAYLOAD + 1))
        );
    }

    #[test]
    fn reject_is_truncated_on_char_boundary() {
        let reason = "é".repeat(MAX_PAYLOAD);
        let f = Frame::reject(SeqBit::One, &reason);
        assert!(f.payload().len() <= MAX_PAYLOAD);
        assert_eq!(f.payload().last(), Some(&0));
        let text = std::str::from_utf8(f.text()).unwrap();
        assert!(text.chars().all(|c| c == 'é'));
        assert_eq!(f.encode().len(), HEADER_SIZE + f.payload().len());
    }

    #[test]
    fn ack_matching() {
        let ack = Frame::ack(SeqBit::One);
        assert!(ack.is_ack_for(SeqBit::One));
        assert!(!ack.is_ack_for(SeqBit::Zero));
        let not_ack = Frame::fin(SeqBit::One);
        assert!(!not_ack.is_ack_for(SeqBit::One));
    }

    #[test]
    fn decode_of_encode() {
        let f = Frame::data(SeqBit::One, Bytes::from_static(b"CD")).unwrap();
        assert_eq!(Frame::decode(&f.encode()).unwrap(), f);
    }

    #[test]
    fn display() {
        let f = Frame::data(SeqBit::One, Bytes::from_static(b"CD")).unwrap();
        assert_eq!(f.to_string(), "DATA seq 1 (2 bytes)");
        assert_eq!(MessageType::Wrq.to_string(), "WRQ");
    }

    #[test]
    fn seq_flip() {
        assert_eq!(SeqBit::Zero.flip(), SeqBit::One);
        assert_eq!(SeqBit::One.flip().flip(), SeqBit::One);
        assert_eq!(SeqBit::from_wire(2), None);
    }
}
