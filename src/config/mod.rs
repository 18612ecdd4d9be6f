// (c) 2024 Ross Younger
//! # 📖 Configuration management
//!
//! swcp obtains run-time configuration from the following sources, highest priority first:
//! 1. Command-line options
//! 2. Environment variables, named `SWCP_` followed by the field name in upper case (e.g. `SWCP_PORT`)
//! 3. A configuration file named with `--config`
//! 4. The user's configuration file, `swcp/swcp.toml` in the platform configuration directory
//!    (on Linux, `~/.config/swcp/swcp.toml`)
//! 5. The system-wide configuration file, `/etc/swcp.toml`
//! 6. Hard-wired defaults
//!
//! Run `swcp --config-files` for a list of which files we read.
//!
//! ## File format
//!
//! Configuration files are [TOML](https://toml.io/). Field names are those of
//! [Configuration], in snake case:
//!
//! ```toml
//! port = 20252
//! credential = "g23-889d"
//! timeout = 3000
//! attempts = 3
//! max_sessions = 10
//! idle_timeout = 0
//! directory = "/srv/uploads"
//! time_format = "utc"
//! ```
//!
//! `swcp --show-config` outputs the current value of every field and where it came from.

mod manager;
mod structure;
mod sysdefault;

pub use manager::{DisplayAdapter, ENV_PREFIX, Manager, system_config_path, user_config_path};
pub use structure::{Configuration, ConfigurationArgs};
use sysdefault::SystemDefault;
