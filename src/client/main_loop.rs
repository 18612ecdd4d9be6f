//! Main client mode event loop
// (c) 2024 Ross Younger

use std::{io::IsTerminal as _, path::Path};

use anyhow::Context as _;
use indicatif::{MultiProgress, ProgressBar};
use tokio::fs::File;
use tracing::{debug, error, info, trace_span};

use super::{
    Parameters, UploadJob,
    engine::{Engine, EngineError, RetransmitPolicy},
    progress::upload_bar,
    sequencer::{UploadError, upload},
};
use crate::{
    config::Configuration,
    util::{self, ConsoleTraceType, TraceOptions, socket, stats::process_statistics},
};

fn setup_tracing(
    display: &MultiProgress,
    parameters: &Parameters,
    config: &Configuration,
) -> anyhow::Result<()> {
    util::setup_tracing(TraceOptions {
        level: util::trace_level(parameters),
        console: ConsoleTraceType::Indicatif(display.clone()),
        log_file: parameters.log_file.as_deref(),
        time_format: config.time_format,
        ansi: std::io::stderr().is_terminal(),
    })
}

/// Opens the source file and returns it with its length
async fn open_source(path: &Path) -> anyhow::Result<(File, u64)> {
    let file = File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let meta = file.metadata().await?;
    if meta.is_dir() {
        anyhow::bail!("{} is a directory", path.display());
    }
    if !meta.is_file() {
        anyhow::bail!("{} is not a regular file", path.display());
    }
    Ok((file, meta.len()))
}

/// Main client mode event loop
///
/// Uploads the file named in `parameters` to the server it names.
///
/// # Return value
/// `true` if the upload succeeded. A transfer that was refused by the server or given
/// up for lack of response is `false`; the reason has already been logged.
//
// Caution: As we are using ProgressBar, anything to be printed to console should go via tracing.
#[allow(clippy::module_name_repetitions)]
pub async fn client_main(
    config: &Configuration,
    display: &MultiProgress,
    parameters: &Parameters,
) -> anyhow::Result<bool> {
    setup_tracing(display, parameters, config)?;
    let _guard = trace_span!("CLIENT").entered();

    let job = UploadJob::try_from(parameters)?;
    let (mut file, size) = open_source(&job.source).await?;
    let peer = socket::resolve(&job.host, config.port).await?;
    let socket = socket::connect_to(peer).await?;
    let mut engine = Engine::new(socket, RetransmitPolicy::from(config));
    debug!(
        "uploading {} ({size} bytes) to {peer} as {}",
        job.source.display(),
        job.remote_name
    );

    let progress = if parameters.quiet {
        ProgressBar::hidden()
    } else {
        upload_bar(display, &job.remote_name, size)?
    };

    let result = upload(
        &mut engine,
        &config.credential,
        &job.remote_name,
        &mut file,
        &progress,
    )
    .await;
    progress.finish_and_clear();

    match result {
        Ok(report) => {
            if !parameters.quiet {
                process_statistics(&report, parameters.statistics);
            }
            info!("{} uploaded to {}:{}", job.source.display(), job.host, job.remote_name);
            Ok(true)
        }
        Err(e) => {
            if let Some(reason) = e.rejection() {
                error!("{e}: server rejected the request: {reason}");
                Ok(false)
            } else if matches!(
                e,
                UploadError::Phase {
                    source: EngineError::Timeout { .. },
                    ..
                }
            ) {
                error!("{e}: no response from {peer}");
                Ok(false)
            } else {
                Err(e.into())
            }
        }
    }
}
