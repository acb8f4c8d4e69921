//! Per-node idle time over a cluster log.
//!
//! A node's active window opens at the first record that names a peer (the
//! first time the node talks to the load balancer) and closes at the end of
//! its last non-lifecycle record. Idle time is whatever part of that window
//! was not covered by recorded event durations:
//!
//! `idle = (end_timestamp + end_duration) - start_timestamp - sum_duration`

use std::collections::BTreeMap;

use crate::descriptor::ExperimentDescriptor;
use crate::record::{ClusterEvent, ClusterRecord, RecordDecodeError};

use super::{AggregateError, AggregationContext, Described};

/// Accumulated state for one node within one experiment file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSummary {
    /// Timestamp of the first peer-bearing record. Set at most once.
    pub start_timestamp: Option<i64>,
    pub end_timestamp: i64,
    pub end_duration: i64,
    /// Sum of durations over non-lifecycle records.
    pub sum_duration: i64,
    pub transfer_count: u64,
    /// Peer latched together with `start_timestamp`.
    pub peer: Option<String>,
    /// Overhead reported by the node's last file transfer.
    pub overhead_ns: Option<i64>,
    last_timestamp: Option<i64>,
}

impl NodeSummary {
    /// Apply one record belonging to this node.
    ///
    /// Fails when timestamps go backwards, since both the start latch and
    /// the end markers assume file order is time order.
    pub fn apply(&mut self, record: &ClusterRecord) -> Result<(), AggregateError> {
        if let Some(previous) = self.last_timestamp {
            if record.timestamp < previous {
                return Err(AggregateError::OutOfOrder {
                    node_id: record.node_id,
                    previous,
                    timestamp: record.timestamp,
                });
            }
        }
        self.last_timestamp = Some(record.timestamp);

        if !record.event.is_lifecycle() {
            self.end_timestamp = record.timestamp;
            self.end_duration = record.duration;
            self.sum_duration = self
                .sum_duration
                .checked_add(record.duration)
                .ok_or(AggregateError::Overflow {
                    node_id: record.node_id,
                })?;
        }

        if record.event == ClusterEvent::FileTransfer {
            self.transfer_count += 1;
            self.overhead_ns = Some(record.overhead_ns);
        }

        // First peer wins.
        if self.peer.is_none() {
            if let Some(peer) = &record.peer {
                self.peer = Some(peer.clone());
                self.start_timestamp = Some(record.timestamp);
            }
        }

        Ok(())
    }

    /// Idle time in nanoseconds, `None` if the node never named a peer.
    pub fn idle_time(&self, node_id: u32) -> Result<Option<i64>, AggregateError> {
        let Some(start) = self.start_timestamp else {
            return Ok(None);
        };
        self.end_timestamp
            .checked_add(self.end_duration)
            .and_then(|end| end.checked_sub(start))
            .and_then(|window| window.checked_sub(self.sum_duration))
            .map(Some)
            .ok_or(AggregateError::Overflow { node_id })
    }
}

/// Derived per-node figures kept after the fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIdle {
    pub node_id: u32,
    /// `None` for a node that never named a peer.
    pub idle_time_ns: Option<i64>,
    pub transfer_count: u64,
    pub overhead_ns: Option<i64>,
}

/// Idle time for every node in one cluster experiment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSummary {
    pub descriptor: ExperimentDescriptor,
    /// Every node seen in the log, ordered by node id.
    pub nodes: Vec<NodeIdle>,
}

impl ClusterSummary {
    pub fn node(&self, node_id: u32) -> Option<&NodeIdle> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// Idle time of `node_id`, if the node had an active window.
    pub fn idle_time(&self, node_id: u32) -> Option<i64> {
        self.node(node_id).and_then(|n| n.idle_time_ns)
    }

    /// Nodes that never named a peer and so have no active window.
    pub fn silent_nodes(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.idle_time_ns.is_none())
            .map(|n| n.node_id)
    }
}

impl Described for ClusterSummary {
    fn descriptor(&self) -> &ExperimentDescriptor {
        &self.descriptor
    }
}

/// Fold a cluster record stream into per-node idle times.
pub fn fold_cluster<I>(
    ctx: &mut AggregationContext,
    descriptor: ExperimentDescriptor,
    records: I,
) -> Result<ClusterSummary, AggregateError>
where
    I: IntoIterator<Item = Result<ClusterRecord, RecordDecodeError>>,
{
    let mut nodes: BTreeMap<u32, NodeSummary> = BTreeMap::new();
    for record in records {
        let record = record?;
        nodes.entry(record.node_id).or_default().apply(&record)?;
        ctx.count_record();
    }

    let mut summary = ClusterSummary {
        descriptor,
        nodes: Vec::with_capacity(nodes.len()),
    };

    for (node_id, node) in nodes {
        let idle_time_ns = node.idle_time(node_id)?;
        if let Some(idle_time) = idle_time_ns.filter(|t| *t < 0) {
            return Err(AggregateError::NegativeIdleTime { node_id, idle_time });
        }
        summary.nodes.push(NodeIdle {
            node_id,
            idle_time_ns,
            transfer_count: node.transfer_count,
            overhead_ns: node.overhead_ns,
        });
    }

    ctx.count_file();
    Ok(summary)
}
