use crate::descriptor::ExperimentDescriptor;
use crate::record::{ClientRecord, RecordDecodeError};

use super::{AggregateError, AggregationContext, Described, Outcome, Sentinel};

/// Client durations are divided by this to express service time in seconds.
pub const DURATION_SCALE: f64 = 1000.0;

/// Service time and error rate for one client experiment file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSummary {
    pub descriptor: ExperimentDescriptor,
    /// Bytes transferred by the last successful request.
    pub byte_size: u64,
    /// Mean of `duration / 1000` over non-error records.
    pub mean_service_time_s: f64,
    /// `errors / records`.
    pub error_fraction: f64,
    pub records: u64,
    pub errors: u64,
    /// Per-request service times in file order, errors excluded.
    pub service_times_s: Vec<f64>,
}

impl Described for ClientSummary {
    fn descriptor(&self) -> &ExperimentDescriptor {
        &self.descriptor
    }
}

/// Running totals over a client log.
#[derive(Debug, Clone, Default)]
pub struct ClientAccumulator {
    total_s: f64,
    records: u64,
    errors: u64,
    byte_size: u64,
    service_times_s: Vec<f64>,
}

impl ClientAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: &ClientRecord) {
        self.records += 1;
        if record.is_error() {
            self.errors += 1;
            return;
        }

        let service_time = record.duration / DURATION_SCALE;
        self.total_s += service_time;
        self.byte_size = record.bytes;
        self.service_times_s.push(service_time);
    }

    /// Produce the summary, or the sentinel when no record succeeded.
    pub fn finish(self, descriptor: ExperimentDescriptor) -> Outcome<ClientSummary> {
        let valid = self.records - self.errors;
        if valid == 0 {
            return Outcome::Sentinel(Sentinel::NoValidRecords {
                records: self.records,
            });
        }

        Outcome::Summary(ClientSummary {
            descriptor,
            byte_size: self.byte_size,
            mean_service_time_s: self.total_s / valid as f64,
            error_fraction: self.errors as f64 / self.records as f64,
            records: self.records,
            errors: self.errors,
            service_times_s: self.service_times_s,
        })
    }
}

/// Fold a client record stream into one summary.
pub fn fold_client<I>(
    ctx: &mut AggregationContext,
    descriptor: ExperimentDescriptor,
    records: I,
) -> Result<Outcome<ClientSummary>, AggregateError>
where
    I: IntoIterator<Item = Result<ClientRecord, RecordDecodeError>>,
{
    let mut acc = ClientAccumulator::new();
    for record in records {
        acc.record(&record?);
        ctx.count_record();
    }
    ctx.count_file();
    Ok(acc.finish(descriptor))
}
