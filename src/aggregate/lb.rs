use crate::descriptor::ExperimentDescriptor;
use crate::record::{LbEvent, LbRecord, RecordDecodeError};

use super::{AggregateError, AggregationContext, Described};

const NANOS_PER_SEC: f64 = 1e9;

/// Why a load-balancer summary reports zero throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbCondition {
    /// The file had no `user-joined` events.
    NoUserJoined,
    /// All requests started and ended at the same instant.
    EmptyWindow,
}

impl LbCondition {
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoUserJoined => "no user-joined events, requests per second reported as 0",
            Self::EmptyWindow => "user-joined events span zero time, requests per second reported as 0",
        }
    }
}

/// Throughput observed by the load balancer for one experiment file.
#[derive(Debug, Clone, PartialEq)]
pub struct LbSummary {
    pub descriptor: ExperimentDescriptor,
    pub total_requests: u64,
    pub requests_per_second: f64,
    pub condition: Option<LbCondition>,
}

impl Described for LbSummary {
    fn descriptor(&self) -> &ExperimentDescriptor {
        &self.descriptor
    }
}

/// Request window tracked over `user-joined` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LbAccumulator {
    total_requests: u64,
    first_start: Option<i64>,
    last_end: Option<i64>,
}

impl LbAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: &LbRecord) {
        if record.event != LbEvent::UserJoined {
            return;
        }

        self.total_requests += 1;
        let end = record.end_time();
        self.first_start = Some(
            self.first_start
                .map_or(record.start_time, |s| s.min(record.start_time)),
        );
        self.last_end = Some(self.last_end.map_or(end, |e| e.max(end)));
    }

    pub fn finish(self, descriptor: ExperimentDescriptor) -> LbSummary {
        let (requests_per_second, condition) = match (self.first_start, self.last_end) {
            (Some(start), Some(end)) if end > start => {
                let elapsed_s = end.saturating_sub(start) as f64 / NANOS_PER_SEC;
                (self.total_requests as f64 / elapsed_s, None)
            }
            (Some(_), Some(_)) => (0.0, Some(LbCondition::EmptyWindow)),
            _ => (0.0, Some(LbCondition::NoUserJoined)),
        };

        LbSummary {
            descriptor,
            total_requests: self.total_requests,
            requests_per_second,
            condition,
        }
    }
}

/// Fold a load-balancer record stream into one summary.
pub fn fold_lb<I>(
    ctx: &mut AggregationContext,
    descriptor: ExperimentDescriptor,
    records: I,
) -> Result<LbSummary, AggregateError>
where
    I: IntoIterator<Item = Result<LbRecord, RecordDecodeError>>,
{
    let mut acc = LbAccumulator::new();
    for record in records {
        acc.record(&record?);
        ctx.count_record();
    }
    ctx.count_file();
    Ok(acc.finish(descriptor))
}
