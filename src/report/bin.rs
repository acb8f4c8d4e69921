use std::fmt;

use crate::aggregate::Described;
use crate::config::DesignConfig;
use crate::descriptor::{Algorithm, ExperimentDescriptor, FileSizeClass};

/// The categorical value a bin is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinKey {
    Algorithm(Algorithm),
    FileSize(FileSizeClass),
}

impl BinKey {
    /// File name code, also used as the row key in tables.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Algorithm(a) => a.code(),
            Self::FileSize(f) => f.code(),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Algorithm(a) => a.label(),
            Self::FileSize(f) => f.label(),
        }
    }

    /// Whether `descriptor` carries this key's value.
    pub fn matches(self, descriptor: &ExperimentDescriptor) -> bool {
        match self {
            Self::Algorithm(a) => descriptor.algorithm == a,
            Self::FileSize(f) => descriptor.file_size == f,
        }
    }
}

impl fmt::Display for BinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The dimension that varies across the bins of one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grouping {
    /// One bin per algorithm; file size, latency and homogeneity fixed.
    ByAlgorithm,
    /// One bin per non-varied file size; algorithm, latency and
    /// homogeneity fixed.
    ByFileSize,
}

impl Grouping {
    pub const fn all() -> [Self; 2] {
        [Self::ByAlgorithm, Self::ByFileSize]
    }

    /// First column header of the table.
    pub const fn label(self) -> &'static str {
        match self {
            Self::ByAlgorithm => "Algorithm",
            Self::ByFileSize => "File Size",
        }
    }

    /// The bin `descriptor` belongs to. Varied-size runs have no file-size bin.
    pub fn key(self, descriptor: &ExperimentDescriptor) -> Option<BinKey> {
        match self {
            Self::ByAlgorithm => Some(BinKey::Algorithm(descriptor.algorithm)),
            Self::ByFileSize => match descriptor.file_size {
                FileSizeClass::Varied => None,
                size => Some(BinKey::FileSize(size)),
            },
        }
    }

    /// Bins every report of this grouping must contain, in row order.
    pub fn seeds(self, design: &DesignConfig) -> Vec<BinKey> {
        match self {
            Self::ByAlgorithm => design
                .algorithms
                .iter()
                .copied()
                .map(BinKey::Algorithm)
                .collect(),
            Self::ByFileSize => design
                .file_sizes
                .iter()
                .copied()
                .filter(|f| *f != FileSizeClass::Varied)
                .map(BinKey::FileSize)
                .collect(),
        }
    }

    /// Every combination of held-fixed dimensions in the design.
    pub fn configurations(self, design: &DesignConfig) -> Vec<Configuration> {
        let fixed: Vec<BinKey> = match self {
            Self::ByAlgorithm => design
                .file_sizes
                .iter()
                .copied()
                .map(BinKey::FileSize)
                .collect(),
            Self::ByFileSize => design
                .algorithms
                .iter()
                .copied()
                .map(BinKey::Algorithm)
                .collect(),
        };

        let mut out =
            Vec::with_capacity(design.homogeneity.len() * fixed.len() * design.latencies_ms.len());
        for &homogeneous in &design.homogeneity {
            for &key in &fixed {
                for &latency_ms in &design.latencies_ms {
                    out.push(Configuration {
                        grouping: self,
                        homogeneous,
                        latency_ms,
                        interval_s: design.interval_s,
                        fixed: key,
                    });
                }
            }
        }
        out
    }
}

/// One slice of the design space with everything but the grouped
/// dimension and the request rate held fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Configuration {
    pub grouping: Grouping,
    pub homogeneous: bool,
    pub latency_ms: u32,
    pub interval_s: u32,
    /// File size for algorithm groupings, algorithm for file-size groupings.
    pub fixed: BinKey,
}

impl Configuration {
    pub fn matches(&self, descriptor: &ExperimentDescriptor) -> bool {
        descriptor.homogeneous == self.homogeneous
            && descriptor.latency_ms == self.latency_ms
            && descriptor.interval_s == self.interval_s
            && self.fixed.matches(descriptor)
    }

    /// Output name, without extension.
    pub fn name(&self) -> String {
        match self.grouping {
            Grouping::ByAlgorithm => format!(
                "algs-compare-homog-{}-fsz-{}-delay-{}",
                self.homogeneous, self.fixed, self.latency_ms
            ),
            Grouping::ByFileSize => format!(
                "vary-fsz-alg-{}-homog-{}-delay-{}",
                self.fixed, self.homogeneous, self.latency_ms
            ),
        }
    }

    /// Human-readable description of the fixed dimensions.
    pub fn describe(&self) -> String {
        let homog = if self.homogeneous {
            "Homogeneous"
        } else {
            "Heterogeneous"
        };
        let delay = match self.latency_ms {
            0 => "Zero Network Delay".to_string(),
            ms => format!("{ms} ms Network Delay"),
        };
        match self.grouping {
            Grouping::ByAlgorithm => format!("{} Files, {homog}, {delay}", self.fixed.label()),
            Grouping::ByFileSize => format!("{}, {homog}, {delay}", self.fixed.label()),
        }
    }
}

/// Summaries grouped by key, keys kept in insertion order.
#[derive(Debug)]
pub struct Bins<'a, S> {
    buckets: Vec<(BinKey, Vec<&'a S>)>,
}

impl<'a, S> Default for Bins<'a, S> {
    fn default() -> Self {
        Self {
            buckets: Vec::new(),
        }
    }
}

impl<'a, S: Described> Bins<'a, S> {
    /// Start with an empty bucket for each key.
    pub fn seeded(keys: impl IntoIterator<Item = BinKey>) -> Self {
        let mut bins = Self::default();
        for key in keys {
            bins.bucket_mut(key);
        }
        bins
    }

    fn bucket_mut(&mut self, key: BinKey) -> &mut Vec<&'a S> {
        let idx = match self.buckets.iter().position(|(k, _)| *k == key) {
            Some(idx) => idx,
            None => {
                self.buckets.push((key, Vec::new()));
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[idx].1
    }

    pub fn insert(&mut self, key: BinKey, summary: &'a S) {
        self.bucket_mut(key).push(summary);
    }

    /// Stable sort of every bucket by ascending request rate.
    pub fn sort_by_rate(&mut self) {
        for (_, bucket) in &mut self.buckets {
            bucket.sort_by_key(|s| s.request_rate());
        }
    }

    /// True when there is at least one bucket and every bucket, once
    /// sorted, holds exactly one summary per configured rate.
    pub fn is_reportable(&self, sorted_rates: &[u32]) -> bool {
        !self.buckets.is_empty()
            && self.buckets.iter().all(|(_, bucket)| {
                bucket.len() == sorted_rates.len()
                    && bucket
                        .iter()
                        .zip(sorted_rates)
                        .all(|(s, &rate)| s.request_rate() == rate)
            })
    }

    pub fn get(&self, key: BinKey) -> Option<&[&'a S]> {
        self.buckets
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, b)| b.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (BinKey, &[&'a S])> {
        self.buckets.iter().map(|(k, b)| (*k, b.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Group `summaries` by `key_fn`, preserving first-seen key order, then
/// sort each bucket by rate. Summaries with no key are left out.
pub fn bin_by<'a, S, F>(summaries: impl IntoIterator<Item = &'a S>, key_fn: F) -> Bins<'a, S>
where
    S: Described + 'a,
    F: Fn(&S) -> Option<BinKey>,
{
    let mut bins = Bins::default();
    for summary in summaries {
        if let Some(key) = key_fn(summary) {
            bins.insert(key, summary);
        }
    }
    bins.sort_by_rate();
    bins
}
