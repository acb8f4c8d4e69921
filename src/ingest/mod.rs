use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::aggregate::{
    fold_client, fold_cluster, fold_lb, AggregateError, AggregationContext, ClientSummary,
    ClusterSummary, Diagnostic, LbSummary, Outcome, Sentinel,
};
use crate::descriptor::{decode_file_name, ExperimentDescriptor, LogKind};
use crate::record::{ClientDecoder, ClusterDecoder, LbDecoder, Records};

/// Fatal ingestion errors.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("log directory {} not found", path.display())]
    MissingDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to open log file {}", path.display())]
    Unopenable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A folded summary of any log kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    Client(ClientSummary),
    Lb(LbSummary),
    Cluster(ClusterSummary),
}

impl Summary {
    pub fn descriptor(&self) -> &ExperimentDescriptor {
        match self {
            Self::Client(s) => &s.descriptor,
            Self::Lb(s) => &s.descriptor,
            Self::Cluster(s) => &s.descriptor,
        }
    }
}

/// A file that folded to the ERROR sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelFile {
    pub path: PathBuf,
    pub descriptor: ExperimentDescriptor,
    pub sentinel: Sentinel,
}

/// Everything one directory ingestion produced.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub kind: LogKind,
    /// Numeric summaries in file name order.
    pub summaries: Vec<Summary>,
    pub sentinels: Vec<SentinelFile>,
    pub diagnostics: Vec<Diagnostic>,
    /// Files whose name did not decode or named another log kind.
    pub skipped: usize,
    /// Files whose body failed to decode or aggregate.
    pub failed: usize,
}

impl IngestReport {
    fn new(kind: LogKind) -> Self {
        Self {
            kind,
            summaries: Vec::new(),
            sentinels: Vec::new(),
            diagnostics: Vec::new(),
            skipped: 0,
            failed: 0,
        }
    }

    pub fn clients(&self) -> impl Iterator<Item = &ClientSummary> {
        self.summaries.iter().filter_map(|s| match s {
            Summary::Client(c) => Some(c),
            _ => None,
        })
    }

    pub fn lbs(&self) -> impl Iterator<Item = &LbSummary> {
        self.summaries.iter().filter_map(|s| match s {
            Summary::Lb(l) => Some(l),
            _ => None,
        })
    }

    pub fn clusters(&self) -> impl Iterator<Item = &ClusterSummary> {
        self.summaries.iter().filter_map(|s| match s {
            Summary::Cluster(c) => Some(c),
            _ => None,
        })
    }
}

/// Ingest every `kind` log in `dir`.
pub fn ingest(
    dir: &Path,
    kind: LogKind,
    ctx: &mut AggregationContext,
) -> Result<IngestReport, IngestError> {
    let files = log_files(dir)?;
    let mut report = IngestReport::new(kind);

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let descriptor = match decode_file_name(&name) {
            Ok((found, descriptor)) if found == kind => descriptor,
            Ok((found, _)) => {
                ctx.note(&path, format!("skipping {found} log, expected {kind} logs"));
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                ctx.note(&path, format!("unable to match file name: {e}"));
                report.skipped += 1;
                continue;
            }
        };

        let file = File::open(&path).map_err(|source| IngestError::Unopenable {
            path: path.clone(),
            source,
        })?;

        match fold_file(ctx, &path, kind, descriptor, BufReader::new(file)) {
            Ok(Outcome::Summary(summary)) => {
                debug!(file = %path.display(), "folded log file");
                report.summaries.push(summary);
            }
            Ok(Outcome::Sentinel(sentinel)) => {
                ctx.note(&path, format!("{sentinel}, summary reported as ERROR"));
                report.sentinels.push(SentinelFile {
                    path,
                    descriptor,
                    sentinel,
                });
            }
            Err(e) => {
                ctx.note(&path, format!("discarding file: {e}"));
                report.failed += 1;
            }
        }
    }

    report.diagnostics = ctx.take_diagnostics();

    info!(
        dir = %dir.display(),
        kind = %kind,
        summaries = report.summaries.len(),
        sentinels = report.sentinels.len(),
        skipped = report.skipped,
        failed = report.failed,
        files_folded = ctx.files_folded(),
        records_folded = ctx.records_folded(),
        "ingested log directory"
    );

    Ok(report)
}

/// Fold one opened log stream of a known kind.
pub fn fold_file<R: Read>(
    ctx: &mut AggregationContext,
    path: &Path,
    kind: LogKind,
    descriptor: ExperimentDescriptor,
    reader: R,
) -> Result<Outcome<Summary>, AggregateError> {
    match kind {
        LogKind::Client => {
            let records = Records::new(reader, ClientDecoder);
            Ok(match fold_client(ctx, descriptor, records)? {
                Outcome::Summary(s) => Outcome::Summary(Summary::Client(s)),
                Outcome::Sentinel(s) => Outcome::Sentinel(s),
            })
        }
        LogKind::LoadBalancer => {
            let records = Records::new(reader, LbDecoder::new(ctx.cluster_size()));
            let summary = fold_lb(ctx, descriptor, records)?;
            if let Some(condition) = summary.condition {
                ctx.note(path, condition.message());
            }
            Ok(Outcome::Summary(Summary::Lb(summary)))
        }
        LogKind::Cluster => {
            let summary = fold_cluster(ctx, descriptor, Records::new(reader, ClusterDecoder))?;
            for node_id in summary.silent_nodes() {
                ctx.note(
                    path,
                    format!("node {node_id} never communicated with the load balancer, no idle time"),
                );
            }
            Ok(Outcome::Summary(Summary::Cluster(summary)))
        }
    }
}

/// Regular files in `dir`, sorted by name.
fn log_files(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let missing = |source| IngestError::MissingDirectory {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(missing)? {
        let entry = entry.map_err(missing)?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}
