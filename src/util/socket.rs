//! Socket wrangling
// (c) 2024 Ross Younger

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use anyhow::Context as _;
use tokio::net::UdpSocket;
use tracing::debug;

/// Looks up `host` and returns the first address found, combined with `port`.
///
/// IP address literals are accepted as-is.
pub(crate) async fn resolve(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    let found = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("host name lookup for {host} failed"))?
        .next();
    found.ok_or_else(|| anyhow::anyhow!("host {host} has no addresses"))
}

/// Creates a UDP socket connected to `peer`, bound to an ephemeral port of the same address family
pub(crate) async fn connect_to(peer: SocketAddr) -> anyhow::Result<UdpSocket> {
    let unspecified = match peer {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0))
        .await
        .context("failed to bind local socket")?;
    socket
        .connect(peer)
        .await
        .with_context(|| format!("failed to connect socket to {peer}"))?;
    debug!("local socket {} connected to {peer}", socket.local_addr()?);
    Ok(socket)
}

/// Binds the server's listening socket
pub(crate) async fn bind_listener(address: IpAddr, port: u16) -> anyhow::Result<UdpSocket> {
    let addr = SocketAddr::new(address, port);
    UdpSocket::bind(addr)
        .await
        .with_context(|| format!("failed to bind UDP socket to {addr}"))
}
