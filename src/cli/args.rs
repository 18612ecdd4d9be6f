//! Command line argument definitions
// (c) 2024 Ross Younger

use std::{ffi::OsString, path::PathBuf};

use clap::Parser;

use super::styles::CLAP_STYLES;
use crate::{client::Parameters, config::ConfigurationArgs};

/// Options that switch the utility into modes other than a plain upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MainMode {
    Server,
    Client,
    ShowConfig,
    ShowConfigFiles,
}

/// Full command line interface
#[derive(Debug, Parser, Clone)]
#[command(
    author,
    version,
    about,
    before_help = "e.g.   swcp report.bin server:reportbin",
    infer_long_args(true),
    styles(CLAP_STYLES)
)]
#[command(help_template(
    "\
{name} version {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
"
))]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct CliArgs {
    // MODE SELECTION ======================================================================
    /// Run as the receiving server, writing incoming files into the configured directory
    #[arg(
        long,
        help_heading("Modes"),
        conflicts_with_all(["show_config", "config_files", "source", "destination"])
    )]
    pub(crate) server: bool,

    /// Outputs the configuration, then exits
    #[arg(long, help_heading("Configuration"))]
    pub(crate) show_config: bool,

    /// Outputs the paths to the configuration files we read, then exits
    #[arg(long, help_heading("Configuration"))]
    pub(crate) config_files: bool,

    /// Reads an additional configuration file. This takes priority over the system and user files.
    #[arg(long, value_name("FILE"), help_heading("Configuration"))]
    pub(crate) config: Option<PathBuf>,

    // CONFIGURABLE OPTIONS ================================================================
    #[command(flatten)]
    /// The set of options which may be set in a config file or via command-line.
    pub(crate) config_args: ConfigurationArgs,

    // CLIENT-ONLY OPTIONS =================================================================
    #[command(flatten)]
    /// Client-side options which may be provided on the command line, but are not persistent configuration options.
    pub(crate) client_params: Parameters,
}

impl CliArgs {
    /// Parses the given arguments
    pub(crate) fn custom_parse<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args)
    }

    pub(crate) fn mode(&self) -> MainMode {
        if self.server {
            MainMode::Server
        } else if self.show_config {
            MainMode::ShowConfig
        } else if self.config_files {
            MainMode::ShowConfigFiles
        } else {
            MainMode::Client
        }
    }
}
