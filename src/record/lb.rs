//! Load-balancer log rows:
//! `event,node_id,peer_id,start_time_ns,duration_ns,bytes,queue_snapshot`.
//!
//! The queue snapshot contains commas of its own. It may arrive as a single
//! quoted field or spill over the remaining columns; both forms are joined
//! back into one snapshot string before parsing.

use std::fmt;

use super::queue::{QueueError, QueueSnapshot};
use super::{RecordDecodeError, RecordDecoder, Row};

/// Column index where the queue snapshot begins.
const QUEUE_COLUMN: usize = 6;

/// Event kinds written by the load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LbEvent {
    UserJoined,
    NodeJoined,
    PortForward,
    HealthCheck,
    Other(String),
}

impl LbEvent {
    pub fn from_label(label: &str) -> Self {
        match label {
            "user-joined" => Self::UserJoined,
            "node-joined" => Self::NodeJoined,
            "port-forward" => Self::PortForward,
            "health-check" => Self::HealthCheck,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::UserJoined => "user-joined",
            Self::NodeJoined => "node-joined",
            Self::PortForward => "port-forward",
            Self::HealthCheck => "health-check",
            Self::Other(label) => label.as_str(),
        }
    }
}

impl fmt::Display for LbEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event recorded by the load balancer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LbRecord {
    pub event: LbEvent,
    pub node_id: u32,
    pub peer_id: String,
    pub start_time: i64,
    pub duration: i64,
    pub bytes: u64,
    /// `None` when the row carries an empty snapshot.
    pub queue: Option<QueueSnapshot>,
}

impl LbRecord {
    pub fn end_time(&self) -> i64 {
        self.start_time.saturating_add(self.duration)
    }
}

/// Decoder for load-balancer logs.
#[derive(Debug, Clone, Copy)]
pub struct LbDecoder {
    cluster_size: usize,
}

impl LbDecoder {
    /// Snapshots must list exactly `cluster_size` nodes.
    pub fn new(cluster_size: usize) -> Self {
        Self { cluster_size }
    }
}

impl RecordDecoder for LbDecoder {
    type Record = LbRecord;

    fn decode(&self, row: &Row<'_>) -> Result<LbRecord, RecordDecodeError> {
        if row.len() <= QUEUE_COLUMN {
            return Err(RecordDecodeError::ColumnCount {
                line: row.line(),
                expected: "at least 7",
                found: row.len(),
            });
        }

        let label = row.text(0);
        if label.is_empty() {
            return Err(row.invalid("event", "event type", label));
        }

        let snapshot = row.rest(QUEUE_COLUMN);
        let queue = if snapshot.is_empty() {
            None
        } else {
            let parsed = QueueSnapshot::parse(&snapshot, self.cluster_size).map_err(|e| match e {
                QueueError::Malformed => RecordDecodeError::MalformedQueue {
                    line: row.line(),
                    snapshot: snapshot.clone(),
                },
                QueueError::Length { expected, found } => RecordDecodeError::QueueLengthMismatch {
                    line: row.line(),
                    expected,
                    found,
                },
            })?;
            Some(parsed)
        };

        Ok(LbRecord {
            event: LbEvent::from_label(label),
            node_id: row.parse(1, "node_id", "node id")?,
            peer_id: row.text(2).to_string(),
            start_time: row.parse(3, "start_time_ns", "timestamp")?,
            duration: row.parse(4, "duration_ns", "duration")?,
            bytes: row.parse(5, "bytes", "byte count")?,
            queue,
        })
    }
}
