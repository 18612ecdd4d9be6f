//! General utility code that didn't fit anywhere else
//!
//! Note that most of this module is not exported.
// (c) 2024 Ross Younger

pub(crate) mod socket;
pub(crate) mod stats;

mod tracing;
pub use tracing::TimeFormat;
pub(crate) use tracing::{
    ConsoleTraceType, TraceOptions, is_initialized as tracing_is_initialised,
    setup as setup_tracing, trace_level,
};

#[cfg(test)]
pub(crate) mod test_channel;
