//! Datagram transport abstractions
// (c) 2024 Ross Younger
//!
//! The protocol needs only two things from its transport: message boundaries are
//! preserved, and a receive can be abandoned part way through (by a timeout) without
//! losing a datagram. `tokio::net::UdpSocket` provides both.
//!
//! Tests substitute their own implementations to inject loss, duplication and delay.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use tokio::net::UdpSocket;

/// A datagram channel to a single, fixed peer (the client's view)
#[async_trait]
pub trait DatagramChannel: Send + Sync {
    /// Sends one datagram to the peer
    async fn send_datagram(&self, datagram: &[u8]) -> io::Result<()>;
    /// Waits for the next datagram from the peer.
    ///
    /// Must be cancel safe: dropping the future before completion must not lose a datagram.
    async fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// A datagram endpoint shared by many peers (the server's view)
#[async_trait]
pub trait DatagramEndpoint: Send + Sync {
    /// Sends one datagram to the given peer
    async fn send_datagram_to(&self, datagram: &[u8], peer: SocketAddr) -> io::Result<()>;
    /// Waits for the next datagram from any peer
    async fn recv_datagram_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

/// A connected socket. [`UdpSocket::connect`] must have been called.
#[async_trait]
impl DatagramChannel for UdpSocket {
    async fn send_datagram(&self, datagram: &[u8]) -> io::Result<()> {
        let _ = self.send(datagram).await?;
        Ok(())
    }

    async fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf).await
    }
}

#[async_trait]
impl DatagramEndpoint for UdpSocket {
    async fn send_datagram_to(&self, datagram: &[u8], peer: SocketAddr) -> io::Result<()> {
        let _ = self.send_to(datagram, peer).await?;
        Ok(())
    }

    async fn recv_datagram_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.recv_from(buf).await
    }
}
