//! Connection-queue snapshots written by the load balancer.
//!
//! A snapshot is a list of `(node_id,queue_depth)` pairs, e.g.
//! `(0,3), (1,0), (2,1)`, optionally wrapped in brackets.

use std::sync::OnceLock;

use regex::Regex;

/// Depth of one node's connection queue at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub node_id: u32,
    pub depth: u32,
}

/// Connection-queue state across the whole cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    entries: Vec<QueueEntry>,
}

/// Why a snapshot could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    Malformed,
    Length { expected: usize, found: usize },
}

fn pair_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\(\s*(\d+)\s*,\s*(\d+)\s*\)").expect("queue pair pattern is valid")
    })
}

impl QueueSnapshot {
    /// Parse snapshot text, requiring exactly `cluster_size` entries.
    pub fn parse(text: &str, cluster_size: usize) -> Result<Self, QueueError> {
        let pattern = pair_pattern();

        let mut entries = Vec::with_capacity(cluster_size);
        for caps in pattern.captures_iter(text) {
            let node_id = caps[1].parse().map_err(|_| QueueError::Malformed)?;
            let depth = caps[2].parse().map_err(|_| QueueError::Malformed)?;
            entries.push(QueueEntry { node_id, depth });
        }

        // Anything besides pairs, separators and brackets is garbage.
        let leftover = pattern.replace_all(text, "");
        let clean = leftover
            .chars()
            .all(|c| c.is_whitespace() || matches!(c, ',' | '[' | ']' | '"'));
        if entries.is_empty() || !clean {
            return Err(QueueError::Malformed);
        }

        if entries.len() != cluster_size {
            return Err(QueueError::Length {
                expected: cluster_size,
                found: entries.len(),
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queue depth for `node_id`, if the node is part of the snapshot.
    pub fn depth_of(&self, node_id: u32) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.node_id == node_id)
            .map(|e| e.depth)
    }
}
