//! server-side _(receiver)_ event loop
// (c) 2024 Ross Younger
//!
//! One socket serves every client. Sessions are keyed by the peer's address and
//! port, and frames are processed strictly one at a time.

mod dispatcher;
mod session;
mod storage;
mod table;

use std::{future::Future, io::IsTerminal as _};

use tokio::time::Instant;
use tracing::{debug, info, trace, trace_span, warn};

pub use dispatcher::{Dispatch, Dispatcher, Event};
pub use session::{Session, SessionState};
pub use storage::{ByteSink, DirectoryStorage, Storage};
pub use table::{Lookup, SessionTable};

use crate::{
    client::Parameters,
    config::Configuration,
    protocol::{Frame, RECV_BUFFER_SIZE},
    transport::DatagramEndpoint,
    util::{self, ConsoleTraceType, TraceOptions, socket},
};

/// The receive loop: reads datagrams, dispatches them, sends any replies
#[derive(Debug)]
pub struct Server<E, S> {
    endpoint: E,
    dispatcher: Dispatcher<S>,
}

impl<E: DatagramEndpoint, S: Storage> Server<E, S> {
    /// Constructor
    #[must_use]
    pub fn new(endpoint: E, storage: S, config: &Configuration) -> Self {
        Self {
            endpoint,
            dispatcher: Dispatcher::new(storage, config),
        }
    }

    /// Serves until `shutdown` completes, then closes every open file.
    ///
    /// Socket errors are logged and do not stop the loop.
    pub async fn run<F>(mut self, shutdown: F) -> Dispatcher<S>
    where
        F: Future<Output = ()>,
    {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        tokio::pin!(shutdown);
        loop {
            let (len, peer) = tokio::select! {
                () = &mut shutdown => break,
                received = self.endpoint.recv_datagram_from(&mut buf) => match received {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("receive failed: {e}");
                        continue;
                    }
                },
            };
            let frame = match Frame::decode(&buf[..len]) {
                Ok(f) => f,
                Err(e) => {
                    debug!("{peer}: dropping malformed datagram: {e}");
                    continue;
                }
            };
            trace!("{peer}: received {frame}");
            let dispatch = self.dispatcher.dispatch(peer, &frame, Instant::now()).await;
            dispatch.event.log(peer);
            if let Some(reply) = dispatch.reply {
                trace!("{peer}: sending {reply}");
                if let Err(e) = self.endpoint.send_datagram_to(&reply.encode(), peer).await {
                    warn!("{peer}: send failed: {e}");
                }
            }
        }
        info!("shutting down");
        self.dispatcher.close_all().await;
        self.dispatcher
    }
}

fn setup_tracing(parameters: &Parameters, config: &Configuration) -> anyhow::Result<()> {
    util::setup_tracing(TraceOptions {
        level: util::trace_level(parameters),
        console: ConsoleTraceType::Standard,
        log_file: parameters.log_file.as_deref(),
        time_format: config.time_format,
        ansi: std::io::stderr().is_terminal(),
    })
}

/// Server main entrypoint
///
/// Binds the listening socket and serves until interrupted.
/// Only the output options in `parameters` apply to the server.
#[allow(clippy::module_name_repetitions)]
pub async fn server_main(config: &Configuration, parameters: &Parameters) -> anyhow::Result<()> {
    serve(config, parameters, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("could not listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await
}

async fn serve<F>(
    config: &Configuration,
    parameters: &Parameters,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    setup_tracing(parameters, config)?;
    let _span = trace_span!("SERVER").entered();

    let socket = socket::bind_listener(config.bind_address, config.port).await?;
    let local = socket.local_addr()?;
    let server = Server::new(socket, DirectoryStorage::new(&config.directory), config);
    info!(
        "listening on {local}, writing into {}, at most {} sessions",
        config.directory.display(),
        server.dispatcher.table().capacity(),
    );
    let _ = server.run(shutdown).await;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::{
        net::{IpAddr, Ipv4Addr},
        path::Path,
        time::Duration,
    };

    use assertables::{assert_contains, assert_not_contains};
    use pretty_assertions::assert_eq;
    use rusty_fork::rusty_fork_test;
    use tokio::{net::UdpSocket, sync::oneshot};

    use super::{Server, serve, storage::memory::MemoryStorage};
    use crate::{
        client::Parameters,
        config::Configuration,
        protocol::{Frame, RECV_BUFFER_SIZE, SeqBit},
    };

    /// Starts and immediately stops a server, logging to a file; returns the log
    fn serve_briefly(dir: &Path, parameters: Parameters) -> String {
        let log = dir.join("server.log");
        let config = Configuration {
            port: 0,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            directory: dir.to_path_buf(),
            ..Configuration::system_default().clone()
        };
        let parameters = Parameters {
            log_file: Some(log.to_string_lossy().into_owned()),
            ..parameters
        };
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(serve(&config, &parameters, async {}))
            .unwrap();
        std::fs::read_to_string(log).unwrap()
    }

    // tracing setup is process-global
    rusty_fork_test! {
        #[test]
        fn logs_to_file() {
            let dir = tempfile::tempdir().unwrap();
            let log = serve_briefly(dir.path(), Parameters::default());
            assert_contains!(log, "listening on 127.0.0.1:");
            assert_contains!(log, "at most 10 sessions");
            assert_contains!(log, "shutting down");
        }

        #[test]
        fn quiet_server_logs_only_errors() {
            let dir = tempfile::tempdir().unwrap();
            let log = serve_briefly(dir.path(), Parameters {
                quiet: true,
                ..Parameters::default()
            });
            assert_not_contains!(log, "listening");
        }
    }

    async fn exchange(client: &UdpSocket, frame: &Frame) -> Frame {
        let _ = client.send(&frame.encode()).await.unwrap();
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let len = tokio::time::timeout(Duration::from_secs(5), client.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        Frame::decode(&buf[..len]).unwrap()
    }

    #[tokio::test]
    async fn serves_over_udp() -> anyhow::Result<()> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        let storage = MemoryStorage::default();
        let server = Server::new(socket, storage.clone(), Configuration::system_default());
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run(async {
            let _ = stopped.await;
        }));

        let client = UdpSocket::bind("127.0.0.1:0").await?;
        client.connect(addr).await?;
        // garbage is ignored
        let _ = client.send(&[9]).await?;
        assert_eq!(
            exchange(&client, &Frame::hello("g23-889d")?).await,
            Frame::ack(SeqBit::Zero)
        );
        assert_eq!(
            exchange(&client, &Frame::write_request("abcd")?).await,
            Frame::ack(SeqBit::One)
        );
        // leave the transfer unfinished: shutdown must close it
        assert_eq!(
            exchange(&client, &Frame::data(SeqBit::Zero, "AB".into())?).await,
            Frame::ack(SeqBit::Zero)
        );

        stop.send(()).unwrap();
        let dispatcher = task.await?;
        assert!(dispatcher.table().is_empty());
        assert_eq!(storage.file("abcd").unwrap(), b"AB");
        assert_eq!(storage.finished(), vec!["abcd".to_string()]);
        Ok(())
    }
}
