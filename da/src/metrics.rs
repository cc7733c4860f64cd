//! Remote call latency tracking
//!
//! Every attempt made against the remote endpoint (retries included) appends
//! one elapsed-time sample. The log only ever grows within a session; it feeds
//! the call-count and average-latency figures shown by the front ends.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

/// Ordered per-attempt latency samples
#[derive(Debug, Clone, Default)]
pub struct LatencyLog {
    samples: Vec<Duration>,
}

impl LatencyLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one attempt's elapsed time
    pub fn record(&mut self, elapsed: Duration) {
        debug!(elapsed_ms = elapsed.as_millis() as u64, "LatencyLog::record: called");
        self.samples.push(elapsed);
    }

    /// Number of attempts recorded
    pub fn call_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// All samples in recording order
    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    /// Sum of all samples
    pub fn total(&self) -> Duration {
        self.samples.iter().sum()
    }

    /// Average latency in seconds, 0.0 when nothing was recorded
    pub fn average_secs(&self) -> f64 {
        if self.samples.is_empty() {
            debug!("LatencyLog::average_secs: no samples");
            return 0.0;
        }
        let avg = self.total().as_secs_f64() / self.samples.len() as f64;
        debug!(avg, "LatencyLog::average_secs: calculated");
        avg
    }

    /// Snapshot suitable for display or JSON output
    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            calls: self.call_count(),
            average_secs: self.average_secs(),
            total_secs: self.total().as_secs_f64(),
        }
    }
}

/// Aggregate view of a [`LatencyLog`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub calls: usize,
    pub average_secs: f64,
    pub total_secs: f64,
}
