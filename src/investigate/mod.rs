use std::io::{Read, Write};

use crate::descriptor::LogKind;
use crate::record::{
    ClusterDecoder, ClusterEvent, LbDecoder, LbEvent, RecordDecodeError, RecordDecoder, Records,
};

/// Per-node queue depth at every `user-joined` event of a load-balancer log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LbQueueSeries {
    pub cluster_size: usize,
    /// `(timestamp_ns, depth of node 0..cluster_size)`.
    pub rows: Vec<(i64, Vec<u32>)>,
}

impl LbQueueSeries {
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut w = csv::Writer::from_writer(writer);
        let header: Vec<String> = std::iter::once("timestamp_ns".to_string())
            .chain((0..self.cluster_size).map(|i| format!("node-{i}")))
            .collect();
        w.write_record(&header)?;
        for (timestamp, depths) in &self.rows {
            let fields =
                std::iter::once(timestamp.to_string()).chain(depths.iter().map(u32::to_string));
            w.write_record(fields)?;
        }
        w.flush()?;
        Ok(())
    }
}

/// One `healthcheck` sample of a node's open connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSample {
    pub node_id: u32,
    pub timestamp: i64,
    pub connections: u32,
}

/// Connection counts reported by cluster health checks, grouped by node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterConnections {
    pub samples: Vec<ConnectionSample>,
}

impl ClusterConnections {
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut w = csv::Writer::from_writer(writer);
        w.write_record(["node-id", "timestamp_ns", "connections"])?;
        for s in &self.samples {
            w.write_record([
                s.node_id.to_string(),
                s.timestamp.to_string(),
                s.connections.to_string(),
            ])?;
        }
        w.flush()?;
        Ok(())
    }
}

/// Collect queue snapshots from a load-balancer log.
pub fn lb_queue_series<R: Read>(
    reader: R,
    cluster_size: usize,
) -> Result<LbQueueSeries, RecordDecodeError> {
    let mut series = LbQueueSeries {
        cluster_size,
        rows: Vec::new(),
    };

    for record in Records::new(reader, LbDecoder::new(cluster_size)) {
        let record = record?;
        if record.event != LbEvent::UserJoined {
            continue;
        }
        if let Some(queue) = &record.queue {
            let depths = (0..cluster_size)
                .map(|i| u32::try_from(i).ok().and_then(|id| queue.depth_of(id)).unwrap_or(0))
                .collect();
            series.rows.push((record.start_time, depths));
        }
    }

    Ok(series)
}

/// Collect connection counts from cluster `healthcheck` records that carry
/// the optional `active_connections` column.
pub fn cluster_connections<R: Read>(reader: R) -> Result<ClusterConnections, RecordDecodeError> {
    let mut samples = Vec::new();
    for record in Records::new(reader, ClusterDecoder) {
        let record = record?;
        if record.event != ClusterEvent::HealthCheck {
            continue;
        }
        if let Some(connections) = record.active_connections {
            samples.push(ConnectionSample {
                node_id: record.node_id,
                timestamp: record.timestamp,
                connections,
            });
        }
    }

    // Stable, so each node keeps file order.
    samples.sort_by_key(|s| s.node_id);
    Ok(ClusterConnections { samples })
}

/// Optional constraints for [`filter_log`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub node: Option<u32>,
    /// Keep records with `timestamp >= since`.
    pub since: Option<i64>,
}

impl LogFilter {
    fn accepts(&self, node_id: u32, timestamp: i64) -> bool {
        self.node.map_or(true, |n| n == node_id) && self.since.map_or(true, |t| timestamp >= t)
    }
}

/// Copy the header and every focus-event record passing `filter` from
/// `reader` to `writer`. The focus event is `user-joined` for
/// load-balancer logs and `healthcheck` for cluster logs.
///
/// Returns the number of records written.
pub fn filter_log<R: Read, W: Write>(
    reader: R,
    writer: W,
    kind: LogKind,
    cluster_size: usize,
    filter: LogFilter,
) -> Result<usize, RecordDecodeError> {
    match kind {
        LogKind::LoadBalancer => copy_matching(
            Records::new(reader, LbDecoder::new(cluster_size)),
            writer,
            |r| r.event == LbEvent::UserJoined && filter.accepts(r.node_id, r.start_time),
        ),
        LogKind::Cluster => copy_matching(
            Records::new(reader, ClusterDecoder),
            writer,
            |r| r.event == ClusterEvent::HealthCheck && filter.accepts(r.node_id, r.timestamp),
        ),
        // Client logs carry no node or timestamp, so any constraint rejects every record.
        LogKind::Client => copy_matching(
            Records::new(reader, crate::record::ClientDecoder),
            writer,
            |_| filter.node.is_none() && filter.since.is_none(),
        ),
    }
}

fn copy_matching<R, D, W, F>(
    mut records: Records<R, D>,
    writer: W,
    keep: F,
) -> Result<usize, RecordDecodeError>
where
    R: Read,
    D: RecordDecoder,
    W: Write,
    F: Fn(&D::Record) -> bool,
{
    let mut w = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    w.write_record(&records.headers()?)?;

    let mut written = 0;
    while let Some(decoded) = records.next_decoded() {
        let decoded = decoded?;
        if keep(&decoded.record) {
            w.write_record(&decoded.raw)?;
            written += 1;
        }
    }

    w.flush().map_err(csv::Error::from)?;
    Ok(written)
}
