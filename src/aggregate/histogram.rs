/// One equal-width bucket of a service-time distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub start: f64,
    pub end: f64,
    pub count: u64,
}

/// Equal-width histogram over `[min, max]` of the observed values.
///
/// Every bucket is half-open except the last, which also holds `max`.
/// When all values are equal the range is widened to `value ± 0.5`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    buckets: Vec<Bucket>,
}

impl Histogram {
    /// Build a histogram with `bins` buckets. Returns `None` for an empty
    /// input, zero bins, or any non-finite value.
    pub fn from_values(values: &[f64], bins: usize) -> Option<Self> {
        if values.is_empty() || bins == 0 || values.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let (mut lo, mut hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let width = (hi - lo) / bins as f64;
        let mut buckets: Vec<Bucket> = (0..bins)
            .map(|i| Bucket {
                start: lo + width * i as f64,
                end: if i + 1 == bins {
                    hi
                } else {
                    lo + width * (i + 1) as f64
                },
                count: 0,
            })
            .collect();

        for &v in values {
            let idx = bucket_index(v, lo, width, bins);
            if let Some(bucket) = buckets.get_mut(idx) {
                bucket.count += 1;
            }
        }

        Some(Self { buckets })
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Total number of recorded values.
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }
}

fn bucket_index(value: f64, lo: f64, width: f64, bins: usize) -> usize {
    let idx = ((value - lo) / width).floor();
    if idx < 0.0 {
        0
    } else {
        // The closed upper edge lands in the last bucket.
        (idx as usize).min(bins - 1)
    }
}
