//! Additional documentation
// (c) 2024 Ross Younger

pub mod troubleshooting;
