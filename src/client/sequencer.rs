//! Upload phase sequencing
// (c) 2024 Ross Younger

use std::{io, time::Duration};

use bytes::Bytes;
use indicatif::ProgressBar;
use tokio::{
    io::{AsyncRead, AsyncReadExt as _},
    time::Instant,
};
use tracing::{debug, trace};

use super::engine::{Engine, EngineError, EngineStats};
use crate::{
    protocol::{Frame, FrameError, MAX_PAYLOAD, SeqBit},
    transport::DatagramChannel,
};

/// The phases of an upload, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Phase {
    /// Authentication
    #[strum(to_string = "HELLO")]
    Hello,
    /// Naming the destination file
    #[strum(to_string = "WRQ")]
    WriteRequest,
    /// File content
    #[strum(to_string = "DATA")]
    Data,
    /// Closing the transfer
    #[strum(to_string = "FIN")]
    Finish,
}

/// Reasons an upload did not complete
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// An exchange with the server failed
    #[error("{phase} phase failed")]
    Phase {
        /// Where it went wrong
        phase: Phase,
        /// What went wrong
        #[source]
        source: EngineError,
    },
    /// The local source could not be read
    #[error("failed to read source")]
    Source(#[source] io::Error),
    /// The credential or filename would not fit in a frame
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl UploadError {
    /// If the server explicitly refused us, the reason it gave
    #[must_use]
    pub fn rejection(&self) -> Option<&str> {
        match self {
            UploadError::Phase {
                source: EngineError::Rejected(reason),
                ..
            } => Some(reason),
            _ => None,
        }
    }
}

/// What happened during a successful upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// File bytes delivered
    pub payload_bytes: u64,
    /// DATA frames delivered
    pub chunks: u64,
    /// Wall time from HELLO to the final ACK
    pub elapsed: Duration,
    /// Engine counters
    pub engine: EngineStats,
}

async fn exchange<C: DatagramChannel>(
    engine: &mut Engine<C>,
    phase: Phase,
    frame: &Frame,
    expected: SeqBit,
) -> Result<(), UploadError> {
    engine
        .send_and_wait_ack(frame, expected)
        .await
        .map_err(|source| UploadError::Phase { phase, source })
}

/// Reads until `buf` is full or the source is exhausted
async fn fill_chunk<R: AsyncRead + Unpin>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Uploads the whole of `source` to the server as `remote_name`.
///
/// The phases run strictly in order and any failure abandons the transfer.
/// Progress is reported in bytes.
pub async fn upload<C, R>(
    engine: &mut Engine<C>,
    credential: &str,
    remote_name: &str,
    source: &mut R,
    progress: &ProgressBar,
) -> Result<UploadReport, UploadError>
where
    C: DatagramChannel,
    R: AsyncRead + Unpin,
{
    let start = Instant::now();
    let hello = Frame::hello(credential)?;
    let wrq = Frame::write_request(remote_name)?;

    exchange(engine, Phase::Hello, &hello, SeqBit::Zero).await?;
    debug!("authenticated");
    exchange(engine, Phase::WriteRequest, &wrq, SeqBit::One).await?;
    debug!("server accepted write request for {remote_name}");

    let mut report = UploadReport::default();
    let mut last_acked = SeqBit::One;
    let mut buf = vec![0u8; MAX_PAYLOAD];
    loop {
        let len = fill_chunk(source, &mut buf)
            .await
            .map_err(UploadError::Source)?;
        if len == 0 {
            break;
        }
        let seq = last_acked.flip();
        let frame = Frame::data(seq, Bytes::copy_from_slice(&buf[..len]))?;
        exchange(engine, Phase::Data, &frame, seq).await?;
        last_acked = seq;
        report.chunks += 1;
        report.payload_bytes += len as u64;
        progress.inc(len as u64);
        trace!("chunk {} acknowledged", report.chunks);
        if len < buf.len() {
            break;
        }
    }

    let fin = last_acked.flip();
    exchange(engine, Phase::Finish, &Frame::fin(fin), fin).await?;
    debug!("transfer closed");

    report.elapsed = start.elapsed();
    report.engine = engine.stats();
    Ok(report)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use indicatif::ProgressBar;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{Phase, UploadError, upload};
    use crate::{
        client::engine::{Engine, EngineError, RetransmitPolicy},
        protocol::{Frame, MAX_PAYLOAD, MessageType},
        util::test_channel::{ScriptedChannel, after},
    };

    fn engine(channel: ScriptedChannel) -> Engine<ScriptedChannel> {
        Engine::new(channel, RetransmitPolicy::default())
    }

    fn summary(frames: &[Frame]) -> Vec<(MessageType, u8, usize)> {
        frames
            .iter()
            .map(|f| (f.kind(), f.seq(), f.payload().len()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn small_file() {
        let mut engine = engine(ScriptedChannel::acking());
        let mut source: &[u8] = b"ABCD";
        let progress = ProgressBar::hidden();
        let report = upload(&mut engine, "g23-889d", "abcd", &mut source, &progress)
            .await
            .unwrap();

        let sent = engine.channel().sent_frames();
        assert_eq!(sent[0], Frame::hello("g23-889d").unwrap());
        assert_eq!(sent[1], Frame::write_request("abcd").unwrap());
        assert_eq!(&sent[2].payload()[..], b"ABCD");
        assert_eq!(
            summary(&sent),
            vec![
                (MessageType::Hello, 0, 9),
                (MessageType::Wrq, 1, 5),
                (MessageType::Data, 0, 4),
                (MessageType::Fin, 1, 0),
            ]
        );
        assert_eq!(report.payload_bytes, 4);
        assert_eq!(report.chunks, 1);
        assert_eq!(report.engine.transmissions, 4);
        assert_eq!(progress.position(), 4);
    }

    #[rstest]
    #[case::partial_last_chunk(3000, &[(0, 1470), (1, 1470), (0, 60)], 1)]
    #[case::exact_multiple(2 * MAX_PAYLOAD, &[(0, 1470), (1, 1470)], 0)]
    #[case::empty(0, &[], 0)]
    #[tokio::test(start_paused = true)]
    async fn chunking_and_sequence_bits(
        #[case] size: usize,
        #[case] chunks: &[(u8, usize)],
        #[case] fin_seq: u8,
    ) {
        let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let mut source = &content[..];
        let mut engine = engine(ScriptedChannel::acking());
        let report = upload(
            &mut engine,
            "g23-889d",
            "file",
            &mut source,
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        let sent = engine.channel().sent_frames();
        let data: Vec<_> = sent
            .iter()
            .filter(|f| f.kind() == MessageType::Data)
            .map(|f| (f.seq(), f.payload().len()))
            .collect();
        assert_eq!(data, chunks);
        let reassembled: Vec<u8> = sent
            .iter()
            .filter(|f| f.kind() == MessageType::Data)
            .flat_map(|f| f.payload().to_vec())
            .collect();
        assert_eq!(reassembled, content);
        let last = sent.last().unwrap();
        assert_eq!((last.kind(), last.seq()), (MessageType::Fin, fin_seq));
        assert_eq!(report.payload_bytes, size as u64);
    }

    #[tokio::test(start_paused = true)]
    async fn bad_credential_stops_at_hello() {
        let channel = ScriptedChannel::new(|_, f| {
            vec![after(1, Frame::reject(f.seq(), "Credencial invalida").encode().to_vec())]
        });
        let mut engine = engine(channel);
        let mut source: &[u8] = b"ABCD";
        let err = upload(&mut engine, "wrong", "abcd", &mut source, &ProgressBar::hidden())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadError::Phase {
                phase: Phase::Hello,
                ..
            }
        ));
        assert_eq!(err.rejection(), Some("Credencial invalida"));
        assert_eq!(engine.channel().sent_frames().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn data_timeout_abandons_transfer() {
        let channel = ScriptedChannel::new(|_, f| {
            if f.kind() == MessageType::Data {
                vec![]
            } else {
                vec![after(1, Frame::ack(f.seq()).encode().to_vec())]
            }
        });
        let mut engine = engine(channel);
        let mut source: &[u8] = b"ABCD";
        let err = upload(&mut engine, "g23-889d", "abcd", &mut source, &ProgressBar::hidden())
            .await
            .unwrap_err();
        let UploadError::Phase { phase, source } = &err else {
            panic!("unexpected {err:?}");
        };
        assert_eq!(*phase, Phase::Data);
        assert!(matches!(source, EngineError::Timeout { attempts: 3 }));
        assert_eq!(err.rejection(), None);
        let sent = engine.channel().sent_frames();
        assert!(sent.iter().all(|f| f.kind() != MessageType::Fin));
    }

    #[tokio::test(start_paused = true)]
    async fn one_frame_outstanding_at_a_time() {
        let delay = 100;
        let channel = ScriptedChannel::new(move |_, f| {
            vec![after(delay, Frame::ack(f.seq()).encode().to_vec())]
        });
        let mut engine = engine(channel);
        let content = vec![7u8; 5 * MAX_PAYLOAD];
        let mut source = &content[..];
        let _ = upload(&mut engine, "g23-889d", "file", &mut source, &ProgressBar::hidden())
            .await
            .unwrap();
        let sent = engine.channel().sent();
        assert_eq!(sent.len(), 8);
        for pair in sent.windows(2) {
            assert!(pair[1].0.duration_since(pair[0].0) >= Duration::from_millis(delay));
        }
    }

    #[tokio::test]
    async fn source_read_failure() {
        let mut source = tokio_test::io::Builder::new()
            .read(b"AB")
            .read_error(std::io::Error::other("disk on fire"))
            .build();
        let mut engine = engine(ScriptedChannel::acking());
        let err = upload(&mut engine, "g23-889d", "abcd", &mut source, &ProgressBar::hidden())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Source(_)));
    }

    #[tokio::test]
    async fn filename_too_long_for_frame() {
        let name = "n".repeat(MAX_PAYLOAD);
        let mut engine = engine(ScriptedChannel::acking());
        let mut source: &[u8] = b"";
        let err = upload(&mut engine, "g23-889d", &name, &mut source, &ProgressBar::hidden())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Frame(_)));
        assert!(engine.channel().sent_frames().is_empty());
    }

    #[test]
    fn phase_names() {
        assert_eq!(Phase::WriteRequest.to_string(), "WRQ");
        assert_eq!(Phase::Finish.to_string(), "FIN");
    }
}
