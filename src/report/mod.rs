pub mod bin;
pub mod nodes;
pub mod table;

use tracing::debug;

use crate::aggregate::{ClientSummary, ClusterSummary, Described, LbSummary};
use crate::config::DesignConfig;

pub use self::bin::{bin_by, BinKey, Bins, Configuration, Grouping};
pub use self::nodes::{idle_tables, request_counts, NodeCount, NodeCountTable};
pub use self::table::{SeriesSet, Table, TableRow};

/// The value placed in each table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    RequestsPerSecond,
    MeanServiceTime,
    ErrorFraction,
    /// Mean node idle time in nanoseconds.
    IdleTime,
}

impl Metric {
    pub const fn title(self) -> &'static str {
        match self {
            Self::RequestsPerSecond => "Load Balancer Requests per Second",
            Self::MeanServiceTime => "Average Client Request Service Time",
            Self::ErrorFraction => "Client Request Error Fraction",
            Self::IdleTime => "Average Node Idle Time",
        }
    }
}

/// A summary that can supply table cells.
pub trait Measured: Described {
    /// `None` when the metric does not apply to this summary kind.
    fn measure(&self, metric: Metric) -> Option<f64>;
}

impl Measured for ClientSummary {
    fn measure(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::MeanServiceTime => Some(self.mean_service_time_s),
            Metric::ErrorFraction => Some(self.error_fraction),
            _ => None,
        }
    }
}

impl Measured for LbSummary {
    fn measure(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::RequestsPerSecond => Some(self.requests_per_second),
            _ => None,
        }
    }
}

impl Measured for ClusterSummary {
    fn measure(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::IdleTime => {
                let idle: Vec<f64> = self
                    .nodes
                    .iter()
                    .filter_map(|n| n.idle_time_ns)
                    .map(|t| t as f64)
                    .collect();
                if idle.is_empty() {
                    return None;
                }
                Some(idle.iter().sum::<f64>() / idle.len() as f64)
            }
            _ => None,
        }
    }
}

/// Tables produced by one [`report`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportOutcome {
    pub tables: Vec<Table>,
    /// Configurations left out by the completeness gate.
    pub dropped_groups: usize,
}

/// Build one table per complete configuration of `grouping`.
pub fn report<'a, S>(
    summaries: impl IntoIterator<Item = &'a S>,
    grouping: Grouping,
    design: &DesignConfig,
    metric: Metric,
) -> ReportOutcome
where
    S: Measured + 'a,
{
    let summaries: Vec<&S> = summaries.into_iter().collect();
    let rates = design.sorted_rates();
    let mut outcome = ReportOutcome::default();

    for config in grouping.configurations(design) {
        let mut bins = Bins::seeded(grouping.seeds(design));
        for &summary in &summaries {
            if !config.matches(summary.descriptor()) {
                continue;
            }
            // Only seeded bins are reported.
            if let Some(key) = grouping.key(summary.descriptor()) {
                if bins.get(key).is_some() {
                    bins.insert(key, summary);
                }
            }
        }
        bins.sort_by_rate();

        if !bins.is_reportable(&rates) {
            debug!(configuration = %config.name(), "incomplete configuration, not reported");
            outcome.dropped_groups += 1;
            continue;
        }

        match table_for(&config, &bins, &rates, metric) {
            Some(table) => outcome.tables.push(table),
            None => outcome.dropped_groups += 1,
        }
    }

    outcome
}

fn table_for<S: Measured>(
    config: &Configuration,
    bins: &Bins<'_, S>,
    rates: &[u32],
    metric: Metric,
) -> Option<Table> {
    let mut rows = Vec::with_capacity(bins.len());
    for (key, bucket) in bins.iter() {
        let values = bucket
            .iter()
            .map(|s| s.measure(metric))
            .collect::<Option<Vec<f64>>>()?;
        rows.push(TableRow {
            key: key.code().to_string(),
            values,
        });
    }

    Some(Table {
        title: format!("{} vs Request Rate: {}", metric.title(), config.describe()),
        name: config.name(),
        bin_label: config.grouping.label().to_string(),
        rates: rates.to_vec(),
        rows,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::descriptor::{Algorithm, ExperimentDescriptor, FileSizeClass};

    fn lb(algorithm: Algorithm, file_size: FileSizeClass, rate: u32, rps: f64) -> LbSummary {
        LbSummary {
            descriptor: ExperimentDescriptor {
                algorithm,
                latency_ms: 0,
                homogeneous: true,
                interval_s: 20,
                file_size,
                request_rate: rate,
            },
            total_requests: 0,
            requests_per_second: rps,
            condition: None,
        }
    }

    fn small_design() -> DesignConfig {
        DesignConfig {
            algorithms: vec![Algorithm::RoundRobin, Algorithm::LeastConnections],
            latencies_ms: vec![0],
            homogeneity: vec![true],
            file_sizes: vec![FileSizeClass::Small, FileSizeClass::Varied],
            rates: vec![100, 10],
            interval_s: 20,
        }
    }

    #[test]
    fn test_report_by_algorithm() {
        let data = vec![
            lb(Algorithm::LeastConnections, FileSizeClass::Small, 100, 95.0),
            lb(Algorithm::RoundRobin, FileSizeClass::Small, 100, 90.0),
            lb(Algorithm::RoundRobin, FileSizeClass::Small, 10, 9.0),
            lb(Algorithm::LeastConnections, FileSizeClass::Small, 10, 9.5),
        ];
        let outcome = report(
            &data,
            Grouping::ByAlgorithm,
            &small_design(),
            Metric::RequestsPerSecond,
        );

        // fsz=s is complete, fsz=v has no data.
        assert_eq!(outcome.tables.len(), 1);
        assert_eq!(outcome.dropped_groups, 1);

        let table = &outcome.tables[0];
        assert_eq!(table.name, "algs-compare-homog-true-fsz-s-delay-0");
        assert_eq!(table.bin_label, "Algorithm");
        assert_eq!(table.rates, vec![10, 100]);
        assert_eq!(table.rows[0].key, "rr");
        assert_eq!(table.rows[0].values, vec![9.0, 90.0]);
        assert_eq!(table.rows[1].key, "lc");
        assert_eq!(table.rows[1].values, vec![9.5, 95.0]);
    }

    #[test]
    fn test_cluster_mean_idle_of_huge_values() {
        let node = |node_id| crate::aggregate::NodeIdle {
            node_id,
            idle_time_ns: Some(i64::MAX),
            transfer_count: 1,
            overhead_ns: Some(0),
        };
        let summary = ClusterSummary {
            descriptor: lb(Algorithm::RoundRobin, FileSizeClass::Small, 10, 0.0).descriptor,
            nodes: vec![node(0), node(1)],
        };
        assert_eq!(summary.measure(Metric::IdleTime), Some(i64::MAX as f64));
        assert_eq!(summary.measure(Metric::RequestsPerSecond), None);
    }

    #[test]
    fn test_other_interval_runs_do_not_join_bins() {
        let mut data = vec![
            lb(Algorithm::RoundRobin, FileSizeClass::Small, 10, 9.0),
            lb(Algorithm::RoundRobin, FileSizeClass::Small, 100, 90.0),
            lb(Algorithm::LeastConnections, FileSizeClass::Small, 10, 9.5),
            lb(Algorithm::LeastConnections, FileSizeClass::Small, 100, 95.0),
        ];
        for rate in [10, 100] {
            let mut run = lb(Algorithm::RoundRobin, FileSizeClass::Small, rate, 1.0);
            run.descriptor.interval_s = 60;
            data.push(run);
        }
        let outcome = report(
            &data,
            Grouping::ByAlgorithm,
            &small_design(),
            Metric::RequestsPerSecond,
        );
        assert_eq!(outcome.tables.len(), 1);
        assert_eq!(outcome.tables[0].rows[0].values, vec![9.0, 90.0]);
    }

    #[test]
    fn test_missing_algorithm_drops_group() {
        let data = vec![
            lb(Algorithm::RoundRobin, FileSizeClass::Small, 100, 90.0),
            lb(Algorithm::RoundRobin, FileSizeClass::Small, 10, 9.0),
        ];
        let outcome = report(
            &data,
            Grouping::ByAlgorithm,
            &small_design(),
            Metric::RequestsPerSecond,
        );
        assert!(outcome.tables.is_empty());
        assert_eq!(outcome.dropped_groups, 2);
    }

    #[test]
    fn test_report_by_file_size_ignores_varied() {
        let data = vec![
            lb(Algorithm::RoundRobin, FileSizeClass::Small, 10, 9.0),
            lb(Algorithm::RoundRobin, FileSizeClass::Small, 100, 90.0),
            lb(Algorithm::RoundRobin, FileSizeClass::Varied, 10, 1.0),
        ];
        let outcome = report(
            &data,
            Grouping::ByFileSize,
            &small_design(),
            Metric::RequestsPerSecond,
        );
        assert_eq!(outcome.tables.len(), 1);
        let table = &outcome.tables[0];
        assert_eq!(table.name, "vary-fsz-alg-rr-homog-true-delay-0");
        assert_eq!(table.bin_label, "File Size");
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].key, "s");
    }

    #[test]
    fn test_inapplicable_metric_emits_nothing() {
        let data = vec![
            lb(Algorithm::RoundRobin, FileSizeClass::Small, 10, 9.0),
            lb(Algorithm::RoundRobin, FileSizeClass::Small, 100, 90.0),
        ];
        let outcome = report(
            &data,
            Grouping::ByFileSize,
            &small_design(),
            Metric::ErrorFraction,
        );
        assert!(outcome.tables.is_empty());
    }
}
