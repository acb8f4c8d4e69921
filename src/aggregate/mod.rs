pub mod client;
pub mod cluster;
pub mod histogram;
pub mod lb;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::Config;
use crate::descriptor::ExperimentDescriptor;
use crate::record::RecordDecodeError;

pub use self::client::{fold_client, ClientAccumulator, ClientSummary};
pub use self::cluster::{fold_cluster, ClusterSummary, NodeIdle, NodeSummary};
pub use self::lb::{fold_lb, LbAccumulator, LbCondition, LbSummary};

/// Errors that invalidate a whole file's summary.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error(transparent)]
    Decode(#[from] RecordDecodeError),

    #[error("node {node_id}: timestamp {timestamp} precedes previous timestamp {previous}")]
    OutOfOrder {
        node_id: u32,
        previous: i64,
        timestamp: i64,
    },

    #[error("node {node_id}: negative idle time {idle_time}ns")]
    NegativeIdleTime { node_id: u32, idle_time: i64 },

    #[error("node {node_id}: durations overflow the nanosecond range")]
    Overflow { node_id: u32 },
}

/// Why a file produced no numeric summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Every record was an error record (or there were none).
    NoValidRecords { records: u64 },
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoValidRecords { records: 0 } => f.write_str("file had no records"),
            Self::NoValidRecords { records } => {
                write!(f, "all {records} records were error records")
            }
        }
    }
}

/// Result of folding one file: a real summary or the ERROR sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<S> {
    Summary(S),
    Sentinel(Sentinel),
}

impl<S> Outcome<S> {
    pub fn summary(self) -> Option<S> {
        match self {
            Self::Summary(s) => Some(s),
            Self::Sentinel(_) => None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Sentinel(_))
    }
}

/// A summary tied to the experiment that produced it.
pub trait Described {
    fn descriptor(&self) -> &ExperimentDescriptor;

    fn request_rate(&self) -> u32 {
        self.descriptor().request_rate
    }
}

/// A human-readable message about one log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.message)
    }
}

/// Per-run aggregation state.
#[derive(Debug)]
pub struct AggregationContext {
    cluster_size: usize,
    histogram_bins: usize,
    files_folded: u64,
    records_folded: u64,
    diagnostics: Vec<Diagnostic>,
}

impl AggregationContext {
    pub fn new(cluster_size: usize, histogram_bins: usize) -> Self {
        Self {
            cluster_size,
            histogram_bins,
            files_folded: 0,
            records_folded: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.cluster_size, cfg.histogram_bins)
    }

    /// Expected length of load-balancer queue snapshots.
    pub fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    /// Bucket count for service-time distributions.
    pub fn histogram_bins(&self) -> usize {
        self.histogram_bins
    }

    pub fn files_folded(&self) -> u64 {
        self.files_folded
    }

    pub fn records_folded(&self) -> u64 {
        self.records_folded
    }

    fn count_record(&mut self) {
        self.records_folded += 1;
    }

    fn count_file(&mut self) {
        self.files_folded += 1;
    }

    /// Record a diagnostic for `file` and log it.
    pub fn note(&mut self, file: &Path, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(file = %file.display(), "{message}");
        self.diagnostics.push(Diagnostic {
            file: file.to_path_buf(),
            message,
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drain collected diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

impl Default for AggregationContext {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_collects_diagnostics() {
        let mut ctx = AggregationContext::new(4, 10);
        ctx.note(Path::new("a.csv"), "first");
        ctx.note(Path::new("b.csv"), String::from("second"));

        assert_eq!(ctx.diagnostics().len(), 2);
        assert_eq!(ctx.diagnostics()[1].to_string(), "b.csv: second");

        let drained = ctx.take_diagnostics();
        assert_eq!(drained.len(), 2);
        assert!(ctx.diagnostics().is_empty());
    }

    #[test]
    fn test_sentinel_display() {
        assert_eq!(
            Sentinel::NoValidRecords { records: 0 }.to_string(),
            "file had no records"
        );
        assert_eq!(
            Sentinel::NoValidRecords { records: 3 }.to_string(),
            "all 3 records were error records"
        );
    }

    #[test]
    fn test_outcome_accessors() {
        let ok: Outcome<u32> = Outcome::Summary(7);
        assert!(!ok.is_sentinel());
        assert_eq!(ok.summary(), Some(7));

        let sentinel: Outcome<u32> = Outcome::Sentinel(Sentinel::NoValidRecords { records: 1 });
        assert!(sentinel.is_sentinel());
        assert_eq!(sentinel.summary(), None);
    }
}
