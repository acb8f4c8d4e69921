use std::collections::BTreeSet;
use std::io;

use tracing::debug;

use crate::aggregate::ClusterSummary;
use crate::config::DesignConfig;
use crate::descriptor::{ExperimentDescriptor, LogKind};

use super::table::{Table, TableRow};

/// File-transfer count of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeCount {
    pub node_id: u32,
    pub count: u64,
    pub overhead_ns: i64,
}

/// Requests served per node in one cluster experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCountTable {
    pub title: String,
    /// Output name without extension.
    pub name: String,
    /// Ordered by overhead, then node id.
    pub rows: Vec<NodeCount>,
}

impl NodeCountTable {
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name)
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut w = csv::Writer::from_writer(writer);
        w.write_record(["node-id", "count", "overhead"])?;
        for row in &self.rows {
            w.write_record([
                row.node_id.to_string(),
                row.count.to_string(),
                row.overhead_ns.to_string(),
            ])?;
        }
        w.flush()?;
        Ok(())
    }
}

/// Count file transfers per node. Nodes without transfers are left out.
pub fn request_counts(summary: &ClusterSummary) -> NodeCountTable {
    let mut rows: Vec<NodeCount> = summary
        .nodes
        .iter()
        .filter(|n| n.transfer_count > 0)
        .filter_map(|n| {
            Some(NodeCount {
                node_id: n.node_id,
                count: n.transfer_count,
                overhead_ns: n.overhead_ns?,
            })
        })
        .collect();
    rows.sort_by_key(|r| (r.overhead_ns, r.node_id));

    NodeCountTable {
        title: format!("{}: Requests per Node", summary.descriptor.algorithm.label()),
        name: format!(
            "node-req-count-{}",
            summary.descriptor.file_stem(LogKind::Cluster)
        ),
        rows,
    }
}

/// Idle-time tables, one per configuration with every rate present.
///
/// Rows are `Node <id>`, columns the configured rates, cells idle time in
/// nanoseconds. Returns the tables and the number of configurations
/// dropped for missing rates.
pub fn idle_tables<'a>(
    summaries: impl IntoIterator<Item = &'a ClusterSummary>,
    design: &DesignConfig,
) -> (Vec<Table>, usize) {
    let summaries: Vec<&ClusterSummary> = summaries.into_iter().collect();
    let rates = design.sorted_rates();
    let mut tables = Vec::new();
    let mut dropped = 0;

    for &algorithm in &design.algorithms {
        for &latency_ms in &design.latencies_ms {
            for &homogeneous in &design.homogeneity {
                for &file_size in &design.file_sizes {
                    let key = ExperimentDescriptor {
                        algorithm,
                        latency_ms,
                        homogeneous,
                        interval_s: design.interval_s,
                        file_size,
                        request_rate: 0,
                    };
                    let mut runs: Vec<&ClusterSummary> = summaries
                        .iter()
                        .copied()
                        .filter(|s| same_configuration(&s.descriptor, &key))
                        .collect();
                    runs.sort_by_key(|s| s.descriptor.request_rate);

                    let found: Vec<u32> = runs.iter().map(|s| s.descriptor.request_rate).collect();
                    if found != rates {
                        dropped += 1;
                        continue;
                    }
                    tables.push(idle_table(&key, &runs, &rates));
                }
            }
        }
    }

    (tables, dropped)
}

fn same_configuration(a: &ExperimentDescriptor, b: &ExperimentDescriptor) -> bool {
    a.algorithm == b.algorithm
        && a.latency_ms == b.latency_ms
        && a.homogeneous == b.homogeneous
        && a.interval_s == b.interval_s
        && a.file_size == b.file_size
}

/// `runs` is sorted by rate and matches `rates` one to one.
fn idle_table(key: &ExperimentDescriptor, runs: &[&ClusterSummary], rates: &[u32]) -> Table {
    let node_ids: BTreeSet<u32> = runs
        .iter()
        .flat_map(|s| s.nodes.iter().map(|n| n.node_id))
        .collect();

    let mut rows = Vec::with_capacity(node_ids.len());
    for node_id in node_ids {
        let values: Option<Vec<f64>> = runs
            .iter()
            .map(|s| s.idle_time(node_id).map(|t| t as f64))
            .collect();
        match values {
            Some(values) => rows.push(TableRow {
                key: format!("Node {node_id}"),
                values,
            }),
            None => debug!(node_id, "node lacks idle time at some rate, row omitted"),
        }
    }

    let homog = if key.homogeneous {
        "Homogeneous"
    } else {
        "Heterogeneous"
    };

    Table {
        title: format!(
            "Idle Time: Algorithm: {}, Latency: {}, {homog}, {} Files",
            key.algorithm.label(),
            key.latency_ms,
            key.file_size.label()
        ),
        name: format!(
            "idle-{}-lat-{}-homog-{}-fsz-{}",
            key.algorithm, key.latency_ms, key.homogeneous, key.file_size
        ),
        bin_label: "Node".to_string(),
        rates: rates.to_vec(),
        rows,
    }
}
