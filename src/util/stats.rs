//! Statistics processing and output
// (c) 2024 Ross Younger

use std::{fmt::Display, time::Duration};

use human_repr::{HumanCount as _, HumanDuration as _, HumanThroughput as _};
use tracing::{info, warn};

use crate::client::UploadReport;

/// Human friendly output helper
#[derive(Debug, Clone, Copy)]
pub(crate) struct DataRate {
    /// Bytes per second; if None, we were unable to compute a rate.
    rate: Option<f64>,
}

impl DataRate {
    /// Standard constructor
    #[must_use]
    pub(crate) fn new(bytes: u64, time: Duration) -> Self {
        if time.is_zero() {
            // divide by zero is not meaningful
            Self { rate: None }
        } else {
            Self {
                #[allow(clippy::cast_precision_loss)]
                rate: Some((bytes as f64) / time.as_secs_f64()),
            }
        }
    }
    /// Accessor
    #[must_use]
    pub(crate) fn byte_rate(&self) -> Option<f64> {
        self.rate
    }
}

impl Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.byte_rate() {
            None => f.write_str("unknown"),
            Some(rate) => rate.human_throughput_bytes().fmt(f),
        }
    }
}

/// Outputs the end-of-transfer summary
pub(crate) fn process_statistics(report: &UploadReport, show_statistics: bool) {
    let rate = DataRate::new(report.payload_bytes, report.elapsed);
    info!(
        "Transferred {size} in {time}; average {rate}",
        size = report.payload_bytes.human_count_bytes(),
        time = report.elapsed.human_duration(),
    );
    let engine = &report.engine;
    if show_statistics {
        info!(
            "{chunks} chunks; {sent} datagrams sent; {discarded} unexpected replies discarded",
            chunks = report.chunks,
            sent = engine.transmissions,
            discarded = engine.discarded,
        );
    }
    if engine.retransmissions > 0 {
        #[allow(clippy::cast_precision_loss)]
        let pct = 100. * engine.retransmissions as f64 / engine.transmissions as f64;
        warn!(
            "Retransmissions: {count}/{total} ({pct:.2}%)",
            count = engine.retransmissions.human_count_bare(),
            total = engine.transmissions.human_count_bare(),
        );
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use assertables::assert_contains;
    use pretty_assertions::assert_eq;

    use super::{DataRate, process_statistics};
    use crate::client::{EngineStats, UploadReport};

    #[test]
    fn rate() {
        let r = DataRate::new(3000, Duration::from_secs(2));
        assert_eq!(r.byte_rate(), Some(1500.));
        assert_contains!(r.to_string(), "kB/s");
    }

    #[test]
    fn zero_time() {
        let r = DataRate::new(3000, Duration::ZERO);
        assert_eq!(r.byte_rate(), None);
        assert_eq!(r.to_string(), "unknown");
    }

    #[test]
    fn summary_does_not_panic() {
        let report = UploadReport {
            payload_bytes: 4,
            chunks: 1,
            elapsed: Duration::ZERO,
            engine: EngineStats {
                transmissions: 5,
                retransmissions: 1,
                discarded: 2,
            },
        };
        process_statistics(&report, true);
        process_statistics(&UploadReport::default(), false);
    }
}
