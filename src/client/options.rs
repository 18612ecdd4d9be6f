//! Options specific to swcp client-mode
// (c) 2024 Ross Younger

use std::path::PathBuf;

use super::FileSpec;

#[derive(Debug, clap::Parser, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
/// Client-side options which may be provided on the command line, but are not persistent configuration options.
pub struct Parameters {
    /// Enable detailed debug output
    ///
    /// This has the same effect as setting `RUST_LOG=swcp=debug` in the environment.
    /// If present, `RUST_LOG` overrides this option.
    #[arg(short, long, action, help_heading("Debug"), display_order(0))]
    pub debug: bool,

    /// Log to a file
    ///
    /// By default the log receives everything printed to stderr.
    /// To override this behaviour, set the environment variable `RUST_LOG_FILE_DETAIL` (same semantics as `RUST_LOG`).
    #[arg(
        short('l'),
        long,
        action,
        value_name("FILE"),
        help_heading("Output"),
        next_line_help(true),
        display_order(0)
    )]
    pub log_file: Option<String>,

    /// Quiet mode
    ///
    /// Switches off progress display and statistics; reports only errors
    #[arg(short, long, action, conflicts_with("debug"), help_heading("Output"))]
    pub quiet: bool,

    /// Show retransmission statistics after the upload
    #[arg(
        short = 's',
        long,
        alias("stats"),
        action,
        conflicts_with("quiet"),
        help_heading("Output"),
        display_order(0)
    )]
    pub statistics: bool,

    // JOB SPECIFICATION ===================================================================
    // (POSITIONAL ARGUMENTS!)
    /// The local file to upload
    #[arg(value_name = "SOURCE")]
    pub source: Option<PathBuf>,

    /// Where to upload it, as HOST:NAME.
    ///
    /// NAME must be 4 to 10 bytes long. If it is empty (`HOST:`), the source file name is used.
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<FileSpec>,
}
