//! Experiment descriptors encoded in log file names.
//!
//! A descriptor name is a `-` separated token sequence laid out by
//! [`NAME_SCHEMA`]: literal keywords interleaved with field values, e.g.
//! `exp-rr-lat-0-homog-true-int-20-fsz-s-rate-10`. Decoding consumes exactly
//! one segment per schema entry, so a name with a segment added or removed
//! anywhere fails with [`DecodeError::SegmentCount`] instead of shifting
//! every later field.
//!
//! Log files prepend a per-kind prefix and append `.csv`:
//! `client-exp-...`, `lb-exp-...`, `cluster-exp-...`.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Separator between name segments.
pub const DELIMITER: char = '-';

/// Optional extension carried by log file names.
pub const EXTENSION: &str = ".csv";

/// Load balancing algorithm under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "rr")]
    RoundRobin,
    #[serde(rename = "lc")]
    LeastConnections,
    #[serde(rename = "lrt")]
    LeastResponseTime,
}

impl Algorithm {
    /// Short code used in file names.
    pub const fn code(self) -> &'static str {
        match self {
            Self::RoundRobin => "rr",
            Self::LeastConnections => "lc",
            Self::LeastResponseTime => "lrt",
        }
    }

    /// Convert from the file name short code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "rr" => Some(Self::RoundRobin),
            "lc" => Some(Self::LeastConnections),
            "lrt" => Some(Self::LeastResponseTime),
            _ => None,
        }
    }

    /// Human-readable name for report titles.
    pub const fn label(self) -> &'static str {
        match self {
            Self::RoundRobin => "Round Robin",
            Self::LeastConnections => "Least Connections",
            Self::LeastResponseTime => "Least Response Time",
        }
    }

    /// All algorithms in canonical order.
    pub fn all() -> &'static [Self] {
        &[
            Self::RoundRobin,
            Self::LeastConnections,
            Self::LeastResponseTime,
        ]
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Size class of the files requested during an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum FileSizeClass {
    #[serde(rename = "s")]
    Small,
    #[serde(rename = "m")]
    Medium,
    #[serde(rename = "l")]
    Large,
    /// Requests spread across the other classes.
    #[serde(rename = "v")]
    Varied,
}

impl FileSizeClass {
    /// Single-letter code used in file names.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Small => "s",
            Self::Medium => "m",
            Self::Large => "l",
            Self::Varied => "v",
        }
    }

    /// Convert from the file name code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "s" => Some(Self::Small),
            "m" => Some(Self::Medium),
            "l" => Some(Self::Large),
            "v" => Some(Self::Varied),
            _ => None,
        }
    }

    /// Human-readable name for report titles.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Small => "Small",
            Self::Medium => "Medium",
            Self::Large => "Large",
            Self::Varied => "Varied-sized",
        }
    }

    /// All size classes in canonical order. `Varied` is always last.
    pub fn all() -> &'static [Self] {
        &[Self::Small, Self::Medium, Self::Large, Self::Varied]
    }
}

impl fmt::Display for FileSizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Which experiment subsystem wrote a log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Client,
    LoadBalancer,
    Cluster,
}

impl LogKind {
    /// File name prefix identifying the kind.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::LoadBalancer => "lb",
            Self::Cluster => "cluster",
        }
    }

    /// Convert from a file name prefix segment.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "client" => Some(Self::Client),
            "lb" => Some(Self::LoadBalancer),
            "cluster" => Some(Self::Cluster),
            _ => None,
        }
    }

    /// Detect the kind of a log file from its name alone.
    pub fn detect(file_name: &str) -> Option<Self> {
        file_name
            .split(DELIMITER)
            .next()
            .and_then(Self::from_prefix)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::LoadBalancer => "load-balancer",
            Self::Cluster => "cluster",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of one experiment run, as encoded in its log file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExperimentDescriptor {
    pub algorithm: Algorithm,
    pub latency_ms: u32,
    pub homogeneous: bool,
    /// Positive.
    pub interval_s: u32,
    pub file_size: FileSizeClass,
    /// Requests per second issued by the client population. Positive.
    pub request_rate: u32,
}

/// A named value slot in the descriptor grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Algorithm,
    LatencyMs,
    Homogeneous,
    IntervalS,
    FileSize,
    RequestRate,
}

impl Field {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Algorithm => "algorithm",
            Self::LatencyMs => "latency",
            Self::Homogeneous => "homogeneous",
            Self::IntervalS => "interval",
            Self::FileSize => "file size",
            Self::RequestRate => "request rate",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One position in the descriptor grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Literal(&'static str),
    Value(Field),
}

/// Ordered descriptor grammar, one entry per `-` separated segment.
pub const NAME_SCHEMA: &[Segment] = &[
    Segment::Literal("exp"),
    Segment::Value(Field::Algorithm),
    Segment::Literal("lat"),
    Segment::Value(Field::LatencyMs),
    Segment::Literal("homog"),
    Segment::Value(Field::Homogeneous),
    Segment::Literal("int"),
    Segment::Value(Field::IntervalS),
    Segment::Literal("fsz"),
    Segment::Value(Field::FileSize),
    Segment::Literal("rate"),
    Segment::Value(Field::RequestRate),
];

/// Errors produced when a name does not follow the descriptor grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected {expected} name segments, found {found}")]
    SegmentCount { expected: usize, found: usize },

    #[error("segment {position}: expected {expected:?}, found {found:?}")]
    UnexpectedToken {
        position: usize,
        expected: &'static str,
        found: String,
    },

    #[error("invalid {field} value {value:?}")]
    InvalidValue { field: Field, value: String },

    #[error("missing {0} segment")]
    MissingField(Field),

    #[error("unknown log kind prefix {prefix:?}")]
    UnknownLogKind { prefix: String },
}

impl ExperimentDescriptor {
    /// Render the value for a grammar field.
    fn field_value(&self, field: Field) -> String {
        match field {
            Field::Algorithm => self.algorithm.code().to_string(),
            Field::LatencyMs => self.latency_ms.to_string(),
            Field::Homogeneous => self.homogeneous.to_string(),
            Field::IntervalS => self.interval_s.to_string(),
            Field::FileSize => self.file_size.code().to_string(),
            Field::RequestRate => self.request_rate.to_string(),
        }
    }

    /// Encode as a descriptor name (`exp-<algo>-lat-...-rate-<rate>`).
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(48);
        for (i, segment) in NAME_SCHEMA.iter().enumerate() {
            if i > 0 {
                out.push(DELIMITER);
            }
            match segment {
                Segment::Literal(literal) => out.push_str(literal),
                Segment::Value(field) => out.push_str(&self.field_value(*field)),
            }
        }
        out
    }

    /// Log file name for the given kind, without the extension.
    pub fn file_stem(&self, kind: LogKind) -> String {
        format!("{}{DELIMITER}{}", kind.prefix(), self.encode())
    }

    /// Full log file name for the given kind, including the extension.
    pub fn file_name(&self, kind: LogKind) -> String {
        format!("{}{EXTENSION}", self.file_stem(kind))
    }

    /// Decode a descriptor name produced by [`ExperimentDescriptor::encode`].
    pub fn decode(name: &str) -> Result<Self, DecodeError> {
        let segments: Vec<&str> = name.split(DELIMITER).collect();
        if segments.len() != NAME_SCHEMA.len() {
            return Err(DecodeError::SegmentCount {
                expected: NAME_SCHEMA.len(),
                found: segments.len(),
            });
        }

        let mut builder = DescriptorBuilder::default();
        for (position, (segment, expected)) in segments.iter().zip(NAME_SCHEMA).enumerate() {
            match expected {
                Segment::Literal(literal) => {
                    if segment != literal {
                        return Err(DecodeError::UnexpectedToken {
                            position,
                            expected: *literal,
                            found: (*segment).to_string(),
                        });
                    }
                }
                Segment::Value(field) => builder.set(*field, segment)?,
            }
        }

        builder.build()
    }
}

impl fmt::Display for ExperimentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Decode a log file name into its kind and descriptor.
///
/// The `.csv` extension is optional. Directory components must already be
/// stripped.
pub fn decode_file_name(file_name: &str) -> Result<(LogKind, ExperimentDescriptor), DecodeError> {
    let stem = file_name.strip_suffix(EXTENSION).unwrap_or(file_name);

    let (prefix, rest) = stem.split_once(DELIMITER).unwrap_or((stem, ""));
    let kind = LogKind::from_prefix(prefix).ok_or_else(|| DecodeError::UnknownLogKind {
        prefix: prefix.to_string(),
    })?;

    let descriptor = ExperimentDescriptor::decode(rest)?;
    Ok((kind, descriptor))
}

/// Collects field values while walking [`NAME_SCHEMA`].
#[derive(Default)]
struct DescriptorBuilder {
    algorithm: Option<Algorithm>,
    latency_ms: Option<u32>,
    homogeneous: Option<bool>,
    interval_s: Option<u32>,
    file_size: Option<FileSizeClass>,
    request_rate: Option<u32>,
}

impl DescriptorBuilder {
    fn set(&mut self, field: Field, value: &str) -> Result<(), DecodeError> {
        let invalid = || DecodeError::InvalidValue {
            field,
            value: value.to_string(),
        };

        match field {
            Field::Algorithm => {
                self.algorithm = Some(Algorithm::from_code(value).ok_or_else(invalid)?);
            }
            Field::LatencyMs => {
                self.latency_ms = Some(parse_digits(value).ok_or_else(invalid)?);
            }
            Field::Homogeneous => {
                self.homogeneous = Some(match value {
                    "true" => true,
                    "false" => false,
                    _ => return Err(invalid()),
                });
            }
            Field::IntervalS => {
                self.interval_s = Some(parse_positive(value).ok_or_else(invalid)?);
            }
            Field::FileSize => {
                self.file_size = Some(FileSizeClass::from_code(value).ok_or_else(invalid)?);
            }
            Field::RequestRate => {
                self.request_rate = Some(parse_positive(value).ok_or_else(invalid)?);
            }
        }

        Ok(())
    }

    fn build(self) -> Result<ExperimentDescriptor, DecodeError> {
        Ok(ExperimentDescriptor {
            algorithm: self
                .algorithm
                .ok_or(DecodeError::MissingField(Field::Algorithm))?,
            latency_ms: self
                .latency_ms
                .ok_or(DecodeError::MissingField(Field::LatencyMs))?,
            homogeneous: self
                .homogeneous
                .ok_or(DecodeError::MissingField(Field::Homogeneous))?,
            interval_s: self
                .interval_s
                .ok_or(DecodeError::MissingField(Field::IntervalS))?,
            file_size: self
                .file_size
                .ok_or(DecodeError::MissingField(Field::FileSize))?,
            request_rate: self
                .request_rate
                .ok_or(DecodeError::MissingField(Field::RequestRate))?,
        })
    }
}

/// Parse a plain decimal integer (no sign, no whitespace).
fn parse_digits(value: &str) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn parse_positive(value: &str) -> Option<u32> {
    parse_digits(value).filter(|v| *v > 0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn sample() -> ExperimentDescriptor {
        ExperimentDescriptor {
            algorithm: Algorithm::LeastResponseTime,
            latency_ms: 25,
            homogeneous: false,
            interval_s: 20,
            file_size: FileSizeClass::Varied,
            request_rate: 150,
        }
    }

    #[test]
    fn test_encode_layout() {
        assert_eq!(
            sample().encode(),
            "exp-lrt-lat-25-homog-false-int-20-fsz-v-rate-150"
        );
    }

    #[test]
    fn test_file_name_per_kind() {
        let d = sample();
        assert_eq!(
            d.file_name(LogKind::Client),
            "client-exp-lrt-lat-25-homog-false-int-20-fsz-v-rate-150.csv"
        );
        assert_eq!(
            d.file_name(LogKind::LoadBalancer),
            "lb-exp-lrt-lat-25-homog-false-int-20-fsz-v-rate-150.csv"
        );
        assert_eq!(
            d.file_name(LogKind::Cluster),
            "cluster-exp-lrt-lat-25-homog-false-int-20-fsz-v-rate-150.csv"
        );
    }

    #[test]
    fn test_decode_recovers_every_descriptor() {
        for &algorithm in Algorithm::all() {
            for latency_ms in [0, 25, 100] {
                for homogeneous in [true, false] {
                    for &file_size in FileSizeClass::all() {
                        for request_rate in [1, 10, 200, 1000] {
                            let d = ExperimentDescriptor {
                                algorithm,
                                latency_ms,
                                homogeneous,
                                interval_s: 20,
                                file_size,
                                request_rate,
                            };
                            assert_eq!(ExperimentDescriptor::decode(&d.encode()).unwrap(), d);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_decode_file_name() {
        let (kind, d) =
            decode_file_name("cluster-exp-rr-lat-0-homog-true-int-20-fsz-s-rate-10.csv").unwrap();
        assert_eq!(kind, LogKind::Cluster);
        assert_eq!(d.algorithm, Algorithm::RoundRobin);
        assert_eq!(d.latency_ms, 0);
        assert!(d.homogeneous);
        assert_eq!(d.interval_s, 20);
        assert_eq!(d.file_size, FileSizeClass::Small);
        assert_eq!(d.request_rate, 10);
    }

    #[test]
    fn test_decode_file_name_without_extension() {
        let (kind, d) = decode_file_name("lb-exp-lc-lat-25-homog-false-int-20-fsz-m-rate-50").unwrap();
        assert_eq!(kind, LogKind::LoadBalancer);
        assert_eq!(d.algorithm, Algorithm::LeastConnections);
        assert_eq!(d.request_rate, 50);
    }

    #[test]
    fn test_added_segment_is_rejected() {
        let err = ExperimentDescriptor::decode("exp-rr-lat-0-homog-true-int-20-fsz-s-cap-5-rate-10")
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::SegmentCount {
                expected: 12,
                found: 14
            }
        );
    }

    #[test]
    fn test_missing_segment_is_rejected() {
        let err = ExperimentDescriptor::decode("exp-rr-lat-0-homog-true-fsz-s-rate-10").unwrap_err();
        assert!(matches!(err, DecodeError::SegmentCount { found: 10, .. }));
    }

    #[test]
    fn test_wrong_literal() {
        let err = ExperimentDescriptor::decode("exp-rr-delay-0-homog-true-int-20-fsz-s-rate-10")
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnexpectedToken {
                position: 2,
                expected: "lat",
                found: "delay".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_field_values() {
        let cases = [
            ("exp-wrr-lat-0-homog-true-int-20-fsz-s-rate-10", Field::Algorithm),
            ("exp-rr-lat-x-homog-true-int-20-fsz-s-rate-10", Field::LatencyMs),
            ("exp-rr-lat-+5-homog-true-int-20-fsz-s-rate-10", Field::LatencyMs),
            ("exp-rr-lat-0-homog-True-int-20-fsz-s-rate-10", Field::Homogeneous),
            ("exp-rr-lat-0-homog-true-int-0-fsz-s-rate-10", Field::IntervalS),
            ("exp-rr-lat-0-homog-true-int-20-fsz-xl-rate-10", Field::FileSize),
            ("exp-rr-lat-0-homog-true-int-20-fsz-s-rate-0", Field::RequestRate),
            ("exp-rr-lat-0-homog-true-int-20-fsz-s-rate-", Field::RequestRate),
        ];
        for (name, expected_field) in cases {
            match ExperimentDescriptor::decode(name) {
                Err(DecodeError::InvalidValue { field, .. }) => {
                    assert_eq!(field, expected_field, "{name}")
                }
                other => panic!("{name}: unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_prefix() {
        let err = decode_file_name("server-exp-rr-lat-0-homog-true-int-20-fsz-s-rate-10.csv")
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownLogKind {
                prefix: "server".to_string()
            }
        );
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(LogKind::detect("client-exp-whatever.csv"), Some(LogKind::Client));
        assert_eq!(LogKind::detect("lb-exp-x"), Some(LogKind::LoadBalancer));
        assert_eq!(LogKind::detect("notes.txt"), None);
    }
}
