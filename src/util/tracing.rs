//! Tracing helpers
// (c) 2024 Ross Younger

use std::{
    fs::File,
    io::Write,
    sync::atomic::{AtomicBool, Ordering},
    sync::{Arc, Mutex},
};

use anyhow::Context;
use indicatif::MultiProgress;
use serde::{Deserialize, Serialize, de};
use strum::VariantNames as _;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{
        MakeWriter,
        time::{ChronoLocal, ChronoUtc},
    },
    prelude::*,
};

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

const FRIENDLY_FORMAT_LOCAL: &str = "%Y-%m-%d %H:%M:%SL";
const FRIENDLY_FORMAT_UTC: &str = "%Y-%m-%d %H:%M:%SZ";

/// Environment variable that controls what gets logged to stderr
const STANDARD_ENV_VAR: &str = "RUST_LOG";
/// Environment variable that controls what gets logged to file
const LOG_FILE_DETAIL_ENV_VAR: &str = "RUST_LOG_FILE_DETAIL";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Computes the trace level for a given set of [`crate::client::Parameters`]
pub(crate) fn trace_level(args: &crate::client::Parameters) -> &'static str {
    if args.debug {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "info"
    }
}

/// Selects the format of time stamps in output messages
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
    clap::ValueEnum,
    Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "kebab-case")]
pub enum TimeFormat {
    /// Local time, as "year-month-day HH:MM:SS"
    #[default]
    Local,
    /// UTC time, as "year-month-day HH:MM:SS"
    Utc,
    /// Local time, in the format described in [RFC 3339](https://datatracker.ietf.org/doc/html/rfc3339).
    Rfc3339,
}

impl<'de> Deserialize<'de> for TimeFormat {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        std::str::FromStr::from_str(&s.to_ascii_lowercase())
            .map_err(|_| de::Error::unknown_variant(&s, TimeFormat::VARIANTS))
    }
}

/// Where console trace output goes
#[derive(Debug)]
pub(crate) enum ConsoleTraceType {
    /// Directly to stderr
    Standard,
    /// Via an indicatif `MultiProgress`, so as not to disturb progress bars
    Indicatif(MultiProgress),
    /// Nowhere
    #[allow(dead_code)] // used by tests
    None,
}

/// Everything [`setup`] needs to know
#[derive(Debug)]
pub(crate) struct TraceOptions<'a> {
    /// Level applied to our own events, unless `RUST_LOG` says otherwise
    pub(crate) level: &'a str,
    pub(crate) console: ConsoleTraceType,
    pub(crate) log_file: Option<&'a str>,
    pub(crate) time_format: TimeFormat,
    pub(crate) ansi: bool,
}

/// Result type for `filter_for()`
struct FilterResult {
    filter: EnvFilter,
    /// Did the filter come from the environment?
    from_env: bool,
}

/// Uses the given environment variable if set; otherwise logs only swcp events at `level`.
fn filter_for(level: &str, key: &str) -> anyhow::Result<FilterResult> {
    match EnvFilter::try_from_env(key) {
        Ok(filter) => Ok(FilterResult {
            filter,
            from_env: true,
        }),
        Err(e) if std::env::var(key).is_ok() => {
            anyhow::bail!("{key} (set in environment) was not understood: {e}")
        }
        Err(_) => Ok(FilterResult {
            filter: EnvFilter::try_new(format!("swcp={level}"))?,
            from_env: false,
        }),
    }
}

fn make_layer<W>(writer: W, filter: FilterResult, time_format: TimeFormat, ansi: bool) -> BoxedLayer
where
    W: for<'writer> MakeWriter<'writer> + 'static + Sync + Send,
{
    // When we only log our own events, the target adds nothing.
    let layer = tracing_subscriber::fmt::layer::<Registry>()
        .compact()
        .with_target(filter.from_env)
        .with_ansi(ansi);

    // The timer has to go on before the writer and filter, so each arm repeats them.
    match time_format {
        TimeFormat::Local => layer
            .with_timer(ChronoLocal::new(FRIENDLY_FORMAT_LOCAL.into()))
            .with_writer(writer)
            .with_filter(filter.filter)
            .boxed(),
        TimeFormat::Utc => layer
            .with_timer(ChronoUtc::new(FRIENDLY_FORMAT_UTC.into()))
            .with_writer(writer)
            .with_filter(filter.filter)
            .boxed(),
        TimeFormat::Rfc3339 => layer
            .with_timer(ChronoLocal::rfc_3339())
            .with_writer(writer)
            .with_filter(filter.filter)
            .boxed(),
    }
}

fn build_layers(options: TraceOptions<'_>) -> anyhow::Result<Vec<BoxedLayer>> {
    let mut layers = Vec::new();

    let console_filter = filter_for(options.level, STANDARD_ENV_VAR)?;
    match options.console {
        ConsoleTraceType::None => (),
        ConsoleTraceType::Standard => layers.push(make_layer(
            std::io::stderr,
            console_filter,
            options.time_format,
            options.ansi,
        )),
        ConsoleTraceType::Indicatif(mp) => layers.push(make_layer(
            ProgressWriter::wrap(mp),
            console_filter,
            options.time_format,
            options.ansi,
        )),
    }

    if let Some(filename) = options.log_file {
        let out_file = Arc::new(File::create(filename).context("Failed to open log file")?);
        let filter = if std::env::var(LOG_FILE_DETAIL_ENV_VAR).is_ok() {
            FilterResult {
                filter: EnvFilter::try_from_env(LOG_FILE_DETAIL_ENV_VAR)?,
                from_env: true,
            }
        } else {
            filter_for(options.level, STANDARD_ENV_VAR)?
        };
        layers.push(make_layer(out_file, filter, options.time_format, false));
    }
    Ok(layers)
}

/// Sets up tracing to the console and, optionally, a log file.
///
/// By default we log only our own events at the requested level.
/// `RUST_LOG` overrides this; see the
/// [tracing-subscriber documentation](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/fmt/index.html#filtering-events-with-environment-variables).
///
/// **CAUTION:** If this function fails, tracing won't be set up; callers must take extra care to report the error.
///
/// This only takes effect once per process. Subsequent calls are ignored.
pub(crate) fn setup(options: TraceOptions<'_>) -> anyhow::Result<()> {
    if TRACING_INITIALIZED.swap(true, Ordering::Relaxed) {
        tracing::warn!("tracing::setup called a second time (ignoring)");
        return Ok(());
    }
    match build_layers(options) {
        Ok(layers) => {
            tracing_subscriber::registry().with(layers).init();
            Ok(())
        }
        Err(e) => {
            TRACING_INITIALIZED.store(false, Ordering::Relaxed);
            Err(e)
        }
    }
}

/// Returns whether tracing has been initialized
pub(crate) fn is_initialized() -> bool {
    TRACING_INITIALIZED.load(Ordering::Relaxed)
}

/// A wrapper type so tracing can output in a way that doesn't mess up `MultiProgress`
struct ProgressWriter(MultiProgress);

impl ProgressWriter {
    fn wrap(display: MultiProgress) -> Mutex<Self> {
        Mutex::new(Self(display))
    }
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = std::str::from_utf8(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let msg = msg.trim_end_matches('\n');
        if self.0.is_hidden() {
            eprintln!("{msg}");
        } else {
            self.0.println(msg)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
