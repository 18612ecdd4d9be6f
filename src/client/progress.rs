//! Progress bar styling
// (c) 2024 Ross Younger

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Maximum update frequency we will use for the progress display
pub(crate) const MAX_UPDATE_FPS: u8 = 20;

/// A single-line style format for Indicatif.
///
/// ```text
/// reportbin [==========================            ] 2m30s @ 12.3kB/s [70%/1.24MB]
/// ```
///
/// Stop-and-wait transfers are slow enough that the rate readout matters more than
/// the bar itself.
const PROGRESS_STYLE: &str =
    "{msg:.dim} {wide_bar:.cyan} {eta} @ {decimal_bytes_per_sec} [{percent}%/{decimal_total_bytes:.dim}]";

/// Creates and attaches a byte-count progress bar for an upload of `total` bytes
pub(crate) fn upload_bar(
    display: &MultiProgress,
    name: &str,
    total: u64,
) -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new(total)
        .with_style(ProgressStyle::with_template(PROGRESS_STYLE)?)
        .with_message(name.to_owned());
    Ok(display.add(bar))
}
