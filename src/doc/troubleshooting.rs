// (c) 2024 Ross Younger

//! ## 🕵️ Troubleshooting
//!
//! The `--debug` option reports information that may help you diagnose issues.
//!
//! This program also understands the `RUST_LOG` environment variable which might let you probe deeper.
//! Some possible settings for this variable are:
//!
//! * `swcp=trace` outputs every frame sent and received
//! * `swcp::server=debug` on the server shows dropped and out-of-phase frames
//!
//! ### "no response"
//!
//! The client sent a frame `attempts` times and never saw the acknowledgement it wanted.
//!
//! * Is the server running, and listening on the port you are sending to (`--port`)?
//! * Is a firewall dropping UDP? Both directions must be open.
//! * The server gives no reply at all when its session table is full (`max_sessions`),
//!   or when a frame arrives out of phase. Its log shows which.
//!
//! On a slow or lossy path, try a longer `--timeout` or more `--attempts`.
//!
//! ### "server rejected the request"
//!
//! The server received the frame but refused it, and said why:
//!
//! * `authentication failed`: the client and server `credential` settings differ.
//! * `filename must be 4 to 10 bytes long`: choose a different destination name.
//! * Any other message usually means the server could not create or write the file
//!   in its `directory`.
//!
//! ### It's slow
//!
//! Each 1470-byte chunk waits for its acknowledgement before the next is sent, so
//! throughput is bounded by the round trip time. Use `--stats` to see how often
//! frames were retransmitted.
