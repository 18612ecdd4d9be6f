// (c) 2024 Ross Younger

#![allow(clippy::doc_markdown)]
//! The Stop-and-Wait Copier (`swcp`) uploads a single file to a server over UDP.
//!
//! Reliability comes from the simplest scheme there is: one frame is in flight at a
//! time, each is acknowledged, and anything unacknowledged is sent again.
//!
//! ## 📖 Documentation
//!
//! * [About the protocol](protocol)
//! * [Configuring swcp](config)
//! * [Troubleshooting](doc::troubleshooting)
//!
//! ## 🧰 Getting Started
//!
//! * Run the server where you want the files to land: `swcp --server -C /srv/uploads`
//! * Upload: `swcp report.bin some-server:reportbin`
//!
//! The destination name must be 4 to 10 bytes long. Client and server must agree on
//! the `credential`; the built-in default is only suitable for testing.
//!
//! ## How it works
//!
//! 1. The client authenticates with `HELLO`.
//! 1. It names the destination file with `WRQ`.
//! 1. It sends the file in `DATA` frames of up to 1470 bytes, alternating the sequence bit.
//! 1. It closes the transfer with `FIN`.
//!
//! Every step is acknowledged by the server before the next begins. If an
//! acknowledgement does not arrive in time the frame is retransmitted, a limited
//! number of times; after that the upload is abandoned. There is no resumption.
//!
//! The server handles many clients at once, keyed by their address and port, up to a
//! configurable limit.
//!
//! ## What swcp is not
//!
//! * Fast (each chunk costs a round trip)
//! * Secure (the credential and the data travel in the clear)

pub(crate) mod cli;
pub use cli::cli as main;
pub use cli::styles;

pub mod client;
pub use client::{Parameters, client_main};

pub mod config;
pub use config::Configuration;

pub mod doc;
pub mod protocol;
pub mod server;
pub use server::server_main;
pub mod transport;
pub mod util;
