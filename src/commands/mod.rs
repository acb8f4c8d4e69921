use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::aggregate::histogram::Histogram;
use crate::aggregate::AggregationContext;
use crate::config::Config;
use crate::descriptor::{LogKind, EXTENSION};
use crate::ingest::{ingest, IngestReport};
use crate::investigate::{cluster_connections, filter_log, lb_queue_series, LogFilter};
use crate::report::{idle_tables, report, request_counts, Grouping, Metric, Table};

pub const CLIENT_SERVICE_TIMES_DIR: &str = "client-service-times";
pub const CLIENT_ERRORS_DIR: &str = "client-errors";
pub const CLIENT_DISTRIBUTIONS_DIR: &str = "client-distributions";
pub const LB_TABLES_DIR: &str = "lb-tables";
pub const NODE_REQUEST_COUNTS_DIR: &str = "node-request-counts";
pub const IDLE_TIMES_DIR: &str = "idle-times";
pub const INVESTIGATION_DIR: &str = "investigation";

/// What a command produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub written: Vec<PathBuf>,
    pub dropped_groups: usize,
    pub diagnostics: usize,
}

/// Client service-time and error tables plus per-file distributions.
pub fn run_user(cfg: &Config, source: &Path, output: &Path) -> Result<RunSummary> {
    let mut ctx = AggregationContext::from_config(cfg);
    let ingested = ingest(source, LogKind::Client, &mut ctx)?;
    let mut run = RunSummary {
        diagnostics: ingested.diagnostics.len(),
        ..Default::default()
    };

    let dist_dir = output.join(CLIENT_DISTRIBUTIONS_DIR);
    for client in ingested.clients() {
        let Some(hist) = Histogram::from_values(&client.service_times_s, ctx.histogram_bins())
        else {
            continue;
        };
        let name = format!("hist-{}.csv", client.descriptor.file_stem(LogKind::Client));
        let path = create_output(&dist_dir, &name)?;
        write_histogram(&hist, &path)?;
        run.written.push(path);
    }

    for grouping in Grouping::all() {
        for (metric, dir) in [
            (Metric::MeanServiceTime, CLIENT_SERVICE_TIMES_DIR),
            (Metric::ErrorFraction, CLIENT_ERRORS_DIR),
        ] {
            let outcome = report(ingested.clients(), grouping, &cfg.design, metric);
            // Both metrics see the same configurations.
            if metric == Metric::MeanServiceTime {
                run.dropped_groups += outcome.dropped_groups;
            }
            write_tables(&output.join(dir), &outcome.tables, &mut run)?;
        }
    }

    finish("user", &ingested, &run);
    Ok(run)
}

/// Load-balancer throughput tables.
pub fn run_lb(cfg: &Config, source: &Path, output: &Path) -> Result<RunSummary> {
    let mut ctx = AggregationContext::from_config(cfg);
    let ingested = ingest(source, LogKind::LoadBalancer, &mut ctx)?;
    let mut run = RunSummary {
        diagnostics: ingested.diagnostics.len(),
        ..Default::default()
    };

    let dir = output.join(LB_TABLES_DIR);
    for grouping in Grouping::all() {
        let outcome = report(ingested.lbs(), grouping, &cfg.design, Metric::RequestsPerSecond);
        run.dropped_groups += outcome.dropped_groups;
        write_tables(&dir, &outcome.tables, &mut run)?;
    }

    finish("lb", &ingested, &run);
    Ok(run)
}

/// Per-node request counts and idle-time tables.
pub fn run_cluster(cfg: &Config, source: &Path, output: &Path) -> Result<RunSummary> {
    let mut ctx = AggregationContext::from_config(cfg);
    let ingested = ingest(source, LogKind::Cluster, &mut ctx)?;
    let mut run = RunSummary {
        diagnostics: ingested.diagnostics.len(),
        ..Default::default()
    };

    let counts_dir = output.join(NODE_REQUEST_COUNTS_DIR);
    for cluster in ingested.clusters() {
        let table = request_counts(cluster);
        let path = create_output(&counts_dir, &table.file_name())?;
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        table
            .write_csv(BufWriter::new(file))
            .with_context(|| format!("writing {}", path.display()))?;
        run.written.push(path);
    }

    let (tables, dropped) = idle_tables(ingested.clusters(), &cfg.design);
    run.dropped_groups += dropped;
    write_tables(&output.join(IDLE_TIMES_DIR), &tables, &mut run)?;

    finish("cluster", &ingested, &run);
    Ok(run)
}

/// Connection queue depth over time for one load-balancer or cluster log.
pub fn run_queue(cfg: &Config, file: &Path, output: &Path) -> Result<PathBuf> {
    let (kind, stem) = classify(file)?;
    let reader = open(file)?;
    let dir = output.join(INVESTIGATION_DIR);

    let path = match kind {
        LogKind::LoadBalancer => {
            let series = lb_queue_series(reader, cfg.cluster_size)
                .with_context(|| format!("decoding {}", file.display()))?;
            let path = create_output(&dir, &format!("lb-queue-{stem}{EXTENSION}"))?;
            let out = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            series
                .write_csv(BufWriter::new(out))
                .with_context(|| format!("writing {}", path.display()))?;
            path
        }
        LogKind::Cluster => {
            let conns = cluster_connections(reader)
                .with_context(|| format!("decoding {}", file.display()))?;
            let path = create_output(&dir, &format!("cl-queue-{stem}{EXTENSION}"))?;
            let out = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            conns
                .write_csv(BufWriter::new(out))
                .with_context(|| format!("writing {}", path.display()))?;
            path
        }
        LogKind::Client => bail!("{} is a client log and has no queue data", file.display()),
    };

    info!(file = %path.display(), "queue series generated");
    Ok(path)
}

/// Copy the focus-event records of one log that pass `filter`.
pub fn run_filter(cfg: &Config, file: &Path, output: &Path, filter: LogFilter) -> Result<PathBuf> {
    let (kind, _) = classify(file)?;
    let reader = open(file)?;

    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // Nothing is written unless the whole input decodes.
    let mut filtered = Vec::new();
    let written = filter_log(reader, &mut filtered, kind, cfg.cluster_size, filter)
        .with_context(|| format!("filtering {}", file.display()))?;

    let path = create_output(&output.join(INVESTIGATION_DIR), &format!("filtered-{name}"))?;
    fs::write(&path, &filtered).with_context(|| format!("writing {}", path.display()))?;

    info!(file = %path.display(), records = written, "filtered log written");
    Ok(path)
}

// --- Helpers ---

/// Log kind and extension-less name of a single log file.
fn classify(file: &Path) -> Result<(LogKind, String)> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", file.display()))?;

    let Some(kind) = LogKind::detect(&name) else {
        bail!("cannot tell the log kind of {name}: expected a client-, lb- or cluster- prefix");
    };

    let stem = name.strip_suffix(EXTENSION).unwrap_or(&name).to_string();
    Ok((kind, stem))
}

fn open(file: &Path) -> Result<BufReader<File>> {
    let f = File::open(file).with_context(|| format!("unable to open file {}", file.display()))?;
    Ok(BufReader::new(f))
}

/// Create `dir` if needed and return the path of `name` inside it.
fn create_output(dir: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir.display()))?;
    Ok(dir.join(name))
}

fn write_tables(dir: &Path, tables: &[Table], run: &mut RunSummary) -> Result<()> {
    for table in tables {
        let path = create_output(dir, &table.file_name())?;
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        table
            .write_csv(BufWriter::new(file))
            .with_context(|| format!("writing {}", path.display()))?;
        info!(file = %path.display(), title = %table.title, "table generated");
        run.written.push(path);
    }
    Ok(())
}

fn write_histogram(hist: &Histogram, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = csv::Writer::from_writer(BufWriter::new(file));
    w.write_record(["bucket_start_s", "bucket_end_s", "count"])?;
    for b in hist.buckets() {
        w.write_record([b.start.to_string(), b.end.to_string(), b.count.to_string()])?;
    }
    w.flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn finish(command: &str, ingested: &IngestReport, run: &RunSummary) {
    info!(
        command,
        summaries = ingested.summaries.len(),
        sentinels = ingested.sentinels.len(),
        diagnostics = run.diagnostics,
        written = run.written.len(),
        dropped_groups = run.dropped_groups,
        "report complete"
    );
}
