//! Scripted datagram channel for client tests
// (c) 2024 Ross Younger

use std::{io, sync::Mutex, time::Duration};

use async_trait::async_trait;
use tokio::{sync::mpsc, time::Instant};

use crate::{protocol::Frame, transport::DatagramChannel};

/// A reply to deliver some time after the frame that provoked it was sent
pub(crate) type Scheduled = (Duration, Vec<u8>);

/// Convenience constructor for [`Scheduled`]
pub(crate) fn after(millis: u64, datagram: Vec<u8>) -> Scheduled {
    (Duration::from_millis(millis), datagram)
}

type Responder = Box<dyn FnMut(usize, &Frame) -> Vec<Scheduled> + Send>;

/// A [`DatagramChannel`] whose peer is a closure.
///
/// Every datagram sent is decoded and passed to the closure along with its index
/// (0 for the first datagram sent). The closure returns the replies to deliver, each
/// with a delay measured from the moment of sending. Delays use tokio time, so tests
/// may pause the clock.
pub(crate) struct ScriptedChannel {
    responder: Mutex<Responder>,
    sent: Mutex<Vec<(Instant, Frame)>>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl std::fmt::Debug for ScriptedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedChannel").finish_non_exhaustive()
    }
}

impl ScriptedChannel {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: FnMut(usize, &Frame) -> Vec<Scheduled> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            responder: Mutex::new(Box::new(responder)),
            sent: Mutex::new(Vec::new()),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// A peer that promptly acknowledges everything
    pub(crate) fn acking() -> Self {
        Self::new(|_, f| vec![(Duration::ZERO, Frame::ack(f.seq()).encode().to_vec())])
    }

    /// Everything sent so far, with the time it was sent
    pub(crate) fn sent(&self) -> Vec<(Instant, Frame)> {
        self.sent.lock().unwrap().clone()
    }

    /// Just the frames sent so far
    pub(crate) fn sent_frames(&self) -> Vec<Frame> {
        self.sent().into_iter().map(|(_, f)| f).collect()
    }
}

#[async_trait]
impl DatagramChannel for ScriptedChannel {
    async fn send_datagram(&self, datagram: &[u8]) -> io::Result<()> {
        let frame = Frame::decode(datagram)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let replies = {
            let mut sent = self.sent.lock().unwrap();
            let index = sent.len();
            sent.push((Instant::now(), frame.clone()));
            (self.responder.lock().unwrap())(index, &frame)
        };
        for (delay, reply) in replies {
            if delay.is_zero() {
                let _ = self.tx.send(reply);
            } else {
                let tx = self.tx.clone();
                let _ = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(reply);
                });
            }
        }
        Ok(())
    }

    async fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut rx = self.rx.lock().await;
        let datagram = rx
            .recv()
            .await
            .ok_or_else(|| io::Error::from(io::ErrorKind::BrokenPipe))?;
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(len)
    }
}
