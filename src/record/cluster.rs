//! Cluster node log rows:
//! `node_id,performance_overhead_ns,event_type,peer,timestamp_ns,duration_ns,bytes_transferred`
//! with an optional eighth `active_connections` column on newer logs.

use std::fmt;

use super::{RecordDecodeError, RecordDecoder, Row};

/// Event kinds written by cluster nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClusterEvent {
    NodeOnline,
    NodeOffline,
    FileTransfer,
    HealthCheck,
    PortForwarding,
    Other(String),
}

impl ClusterEvent {
    pub fn from_label(label: &str) -> Self {
        match label {
            "node-online" => Self::NodeOnline,
            "node-offline" => Self::NodeOffline,
            "file-transfer" => Self::FileTransfer,
            "healthcheck" => Self::HealthCheck,
            "port-forwarding" => Self::PortForwarding,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::NodeOnline => "node-online",
            Self::NodeOffline => "node-offline",
            Self::FileTransfer => "file-transfer",
            Self::HealthCheck => "healthcheck",
            Self::PortForwarding => "port-forwarding",
            Self::Other(label) => label.as_str(),
        }
    }

    /// Online/offline markers carry no work and never touch duration totals.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::NodeOnline | Self::NodeOffline)
    }
}

impl fmt::Display for ClusterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event recorded by a cluster node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRecord {
    pub node_id: u32,
    pub overhead_ns: i64,
    pub event: ClusterEvent,
    /// `None` when the peer column is empty.
    pub peer: Option<String>,
    pub timestamp: i64,
    pub duration: i64,
    pub bytes: u64,
    pub active_connections: Option<u32>,
}

/// Decoder for cluster node logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterDecoder;

impl RecordDecoder for ClusterDecoder {
    type Record = ClusterRecord;

    fn decode(&self, row: &Row<'_>) -> Result<ClusterRecord, RecordDecodeError> {
        row.expect_columns(&[7, 8], "7 or 8")?;

        let label = row.text(2);
        if label.is_empty() {
            return Err(row.invalid("event_type", "event type", label));
        }

        let peer = match row.text(3) {
            "" => None,
            peer => Some(peer.to_string()),
        };

        Ok(ClusterRecord {
            node_id: row.parse(0, "node_id", "node id")?,
            overhead_ns: row.parse(1, "performance_overhead_ns", "duration")?,
            event: ClusterEvent::from_label(label),
            peer,
            timestamp: row.parse(4, "timestamp_ns", "timestamp")?,
            duration: row.parse(5, "duration_ns", "duration")?,
            bytes: row.parse(6, "bytes_transferred", "byte count")?,
            active_connections: row.parse_opt(7, "active_connections", "connection count")?,
        })
    }
}
