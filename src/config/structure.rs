//! Configuration structure
// (c) 2024 Ross Younger

use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    sync::LazyLock,
    time::Duration,
};

use anyhow::Result;
use figment::{
    Metadata, Profile, Provider,
    providers::Serialized,
    value::{Dict, Map},
};
use serde::{Deserialize, Serialize};

use crate::{
    cli::styles::{INFO, RESET},
    protocol::{DEFAULT_CREDENTIAL, DEFAULT_PORT, MAX_PAYLOAD},
    util::TimeFormat,
};

/// The set of configurable options supported by swcp.
///
/// Client and server read the same structure. Some fields are only meaningful to one
/// side; the others ignore them.
///
/// There is no `default()`. The hard-wired defaults are available through
/// [`Configuration::system_default()`].
///
/// [More details about the configuration mechanism](crate::config).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Configuration {
    /// UDP port the server listens on, and the client sends to
    pub port: u16,
    /// Address the server listens on
    pub bind_address: IpAddr,
    /// Shared secret. The client presents it; the server demands it.
    pub credential: String,
    /// Time allowed for each transmission to be acknowledged, in milliseconds
    pub timeout: u64,
    /// Maximum number of times any one frame is transmitted
    pub attempts: u32,
    /// Maximum number of concurrent sessions the server holds
    pub max_sessions: usize,
    /// Seconds of silence after which the server evicts a session; 0 means never
    pub idle_timeout: u64,
    /// Directory the server writes received files into
    pub directory: PathBuf,
    /// Format of timestamps in log output
    pub time_format: TimeFormat,
}

static SYSTEM_DEFAULT_CONFIG: LazyLock<Configuration> = LazyLock::new(|| Configuration {
    port: DEFAULT_PORT,
    bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    credential: DEFAULT_CREDENTIAL.into(),
    timeout: 3000,
    attempts: 3,
    max_sessions: 10,
    idle_timeout: 0,
    directory: PathBuf::from("."),
    time_format: TimeFormat::Local,
});

impl Configuration {
    /// Field names, in display order
    pub const FIELDS: &[&str] = &[
        "port",
        "bind_address",
        "credential",
        "timeout",
        "attempts",
        "max_sessions",
        "idle_timeout",
        "directory",
        "time_format",
    ];

    /// Hard-wired configuration defaults
    #[must_use]
    pub fn system_default() -> &'static Self {
        &SYSTEM_DEFAULT_CONFIG
    }

    /// Per-attempt acknowledgement budget
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Idle eviction threshold, if enabled
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout > 0).then(|| Duration::from_secs(self.idle_timeout))
    }

    /// Checks the values make sense
    pub fn try_validate(&self) -> Result<()> {
        if self.attempts == 0 {
            anyhow::bail!("{INFO}attempts{RESET} must be at least 1");
        }
        if self.timeout == 0 {
            anyhow::bail!("{INFO}timeout{RESET} must be greater than 0ms");
        }
        if self.max_sessions == 0 {
            anyhow::bail!("{INFO}max_sessions{RESET} must be at least 1");
        }
        // The credential travels NUL-terminated in a single frame.
        if self.credential.len() >= MAX_PAYLOAD {
            anyhow::bail!(
                "{INFO}credential{RESET} is too long ({len} bytes; the limit is {max})",
                len = self.credential.len(),
                max = MAX_PAYLOAD - 1
            );
        }
        if self.credential.contains('\0') {
            anyhow::bail!("{INFO}credential{RESET} may not contain NUL characters");
        }
        Ok(())
    }

    /// Validates, consuming self
    pub fn validate(self) -> Result<Self> {
        self.try_validate()?;
        Ok(self)
    }
}

/// Configuration options that may be given on the command line.
///
/// Everything is optional; wherever the user does not provide a value, values from lower
/// priority sources (environment, configuration files, system defaults) obtain.
#[derive(Debug, Clone, Default, PartialEq, Eq, clap::Args, Serialize)]
pub struct ConfigurationArgs {
    /// UDP port the server listens on, and the client sends to [default: 20252]
    #[arg(short = 'P', long, help_heading("Network"), value_name("PORT"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Address the server listens on [default: 0.0.0.0]
    #[arg(long, help_heading("Server"), value_name("ADDRESS"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<IpAddr>,

    /// Shared secret presented to (or required by) the server
    #[arg(long, help_heading("Network"), value_name("SECRET"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,

    /// Time allowed for each transmission to be acknowledged, in milliseconds [default: 3000]
    #[arg(short = 't', long, help_heading("Network"), value_name("ms"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Maximum number of transmissions of any one frame [default: 3]
    #[arg(long, help_heading("Network"), value_name("N"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,

    /// Maximum number of concurrent sessions [default: 10]
    #[arg(long, help_heading("Server"), value_name("N"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,

    /// Evict sessions idle for this many seconds; 0 disables eviction [default: 0]
    #[arg(long, help_heading("Server"), value_name("SECONDS"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<u64>,

    /// Directory to write received files into [default: .]
    #[arg(short = 'C', long, help_heading("Server"), value_name("DIR"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Format of timestamps in log output [default: local]
    #[arg(long, help_heading("Output"), value_name("FORMAT"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_format: Option<TimeFormat>,
}

impl Provider for ConfigurationArgs {
    fn metadata(&self) -> Metadata {
        Metadata::named("command line")
    }

    fn data(&self) -> std::result::Result<Map<Profile, Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}
