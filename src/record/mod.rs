pub mod client;
pub mod cluster;
pub mod lb;
pub mod queue;

use std::io;
use std::str::FromStr;

use csv::StringRecord;
use thiserror::Error;

pub use self::client::{ClientDecoder, ClientRecord};
pub use self::cluster::{ClusterDecoder, ClusterEvent, ClusterRecord};
pub use self::lb::{LbDecoder, LbEvent, LbRecord};
pub use self::queue::{QueueEntry, QueueSnapshot};

/// Errors that can occur while decoding a log body.
#[derive(Error, Debug)]
pub enum RecordDecodeError {
    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: u64,
        expected: &'static str,
        found: usize,
    },

    #[error("line {line}: {column} is not a valid {kind}: {value:?}")]
    InvalidField {
        line: u64,
        column: &'static str,
        kind: &'static str,
        value: String,
    },

    #[error("line {line}: malformed queue snapshot {snapshot:?}")]
    MalformedQueue { line: u64, snapshot: String },

    #[error("line {line}: queue snapshot has {found} entries, cluster size is {expected}")]
    QueueLengthMismatch {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("reading log: {0}")]
    Csv(#[from] csv::Error),
}

impl RecordDecodeError {
    /// The 1-based line the error refers to, when known.
    pub fn line(&self) -> Option<u64> {
        match self {
            Self::ColumnCount { line, .. }
            | Self::InvalidField { line, .. }
            | Self::MalformedQueue { line, .. }
            | Self::QueueLengthMismatch { line, .. } => Some(*line),
            Self::Csv(e) => e.position().map(|p| p.line()),
        }
    }
}

/// Decodes one CSV row into a typed record.
pub trait RecordDecoder {
    type Record;

    /// Decode a single row. The header row is never passed in.
    fn decode(&self, row: &Row<'_>) -> Result<Self::Record, RecordDecodeError>;
}

/// A raw CSV row plus its position in the file.
pub struct Row<'a> {
    line: u64,
    fields: &'a StringRecord,
}

impl<'a> Row<'a> {
    pub fn new(line: u64, fields: &'a StringRecord) -> Self {
        Self { line, fields }
    }

    /// 1-based line number in the source file.
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field text at `index`, empty when the column is absent.
    pub fn text(&self, index: usize) -> &'a str {
        self.fields.get(index).unwrap_or("")
    }

    /// Join columns `from..` back together with `,`.
    pub fn rest(&self, from: usize) -> String {
        self.fields
            .iter()
            .skip(from)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Fail unless the row has one of the accepted column counts.
    pub fn expect_columns(
        &self,
        accepted: &[usize],
        expected: &'static str,
    ) -> Result<(), RecordDecodeError> {
        if accepted.contains(&self.len()) {
            Ok(())
        } else {
            Err(RecordDecodeError::ColumnCount {
                line: self.line,
                expected,
                found: self.len(),
            })
        }
    }

    /// Parse the field at `index` as `T`.
    pub fn parse<T: FromStr>(
        &self,
        index: usize,
        column: &'static str,
        kind: &'static str,
    ) -> Result<T, RecordDecodeError> {
        let value = self.text(index);
        value.parse().map_err(|_| self.invalid(column, kind, value))
    }

    /// Parse an optional field: empty text yields `None`.
    pub fn parse_opt<T: FromStr>(
        &self,
        index: usize,
        column: &'static str,
        kind: &'static str,
    ) -> Result<Option<T>, RecordDecodeError> {
        if self.text(index).is_empty() {
            Ok(None)
        } else {
            self.parse(index, column, kind).map(Some)
        }
    }

    /// Parse a finite floating point field.
    pub fn parse_finite(
        &self,
        index: usize,
        column: &'static str,
    ) -> Result<f64, RecordDecodeError> {
        let value: f64 = self.parse(index, column, "number")?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.invalid(column, "number", self.text(index)))
        }
    }

    /// Build an [`RecordDecodeError::InvalidField`] for this row.
    pub fn invalid(&self, column: &'static str, kind: &'static str, value: &str) -> RecordDecodeError {
        RecordDecodeError::InvalidField {
            line: self.line,
            column,
            kind,
            value: value.to_string(),
        }
    }
}

/// A decoded record together with the raw row it came from.
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub raw: StringRecord,
    pub record: T,
}

/// Lazy, single-pass sequence of decoded records.
pub struct Records<R, D> {
    reader: csv::Reader<R>,
    decoder: D,
    row: StringRecord,
    failed: bool,
}

impl<R: io::Read, D: RecordDecoder> Records<R, D> {
    /// Wrap an opened log stream. The first line is treated as the header.
    pub fn new(reader: R, decoder: D) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        Self {
            reader,
            decoder,
            row: StringRecord::new(),
            failed: false,
        }
    }

    /// The discarded header row.
    pub fn headers(&mut self) -> Result<StringRecord, RecordDecodeError> {
        Ok(self.reader.headers()?.clone())
    }

    /// Read the next record and keep its raw row.
    ///
    /// After the first error the sequence is exhausted.
    pub fn next_decoded(&mut self) -> Option<Result<Decoded<D::Record>, RecordDecodeError>> {
        if self.failed {
            return None;
        }

        let result = match self.reader.read_record(&mut self.row) {
            Ok(false) => return None,
            Ok(true) => {
                let line = self.row.position().map(|p| p.line()).unwrap_or(0);
                self.decoder
                    .decode(&Row::new(line, &self.row))
                    .map(|record| Decoded {
                        raw: self.row.clone(),
                        record,
                    })
            }
            Err(e) => Err(RecordDecodeError::Csv(e)),
        };

        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

impl<R: io::Read, D: RecordDecoder> Iterator for Records<R, D> {
    type Item = Result<D::Record, RecordDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_decoded().map(|r| r.map(|d| d.record))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    struct PairDecoder;

    impl RecordDecoder for PairDecoder {
        type Record = (u32, String);

        fn decode(&self, row: &Row<'_>) -> Result<Self::Record, RecordDecodeError> {
            row.expect_columns(&[2], "2")?;
            Ok((row.parse(0, "id", "integer")?, row.text(1).to_string()))
        }
    }

    #[test]
    fn test_header_is_discarded() {
        let data = "id,name\n1,a\n2,b\n";
        let records: Vec<_> = Records::new(data.as_bytes(), PairDecoder)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records, vec![(1, "a".to_string()), (2, "b".to_string())]);
    }

    #[test]
    fn test_header_only_yields_nothing() {
        let mut records = Records::new("id,name\n".as_bytes(), PairDecoder);
        assert!(records.next().is_none());
    }

    #[test]
    fn test_error_carries_line_and_stops_stream() {
        let data = "id,name\n1,a\nx,b\n3,c\n";
        let mut records = Records::new(data.as_bytes(), PairDecoder);
        assert!(records.next().unwrap().is_ok());

        let err = records.next().unwrap().unwrap_err();
        assert_eq!(err.line(), Some(3));
        assert!(matches!(
            err,
            RecordDecodeError::InvalidField { column: "id", .. }
        ));

        assert!(records.next().is_none());
    }

    #[test]
    fn test_column_count_mismatch() {
        let data = "id,name\n1,a,extra\n";
        let err = Records::new(data.as_bytes(), PairDecoder)
            .next()
            .unwrap()
            .unwrap_err();
        assert!(matches!(
            err,
            RecordDecodeError::ColumnCount { found: 3, line: 2, .. }
        ));
    }

    #[test]
    fn test_fields_are_trimmed() {
        let data = "id, name\n 7 , spaced \n";
        let records: Vec<_> = Records::new(data.as_bytes(), PairDecoder)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records, vec![(7, "spaced".to_string())]);
    }

    #[test]
    fn test_next_decoded_keeps_raw_row() {
        let data = "id,name\n5,e\n";
        let mut records = Records::new(data.as_bytes(), PairDecoder);
        let decoded = records.next_decoded().unwrap().unwrap();
        assert_eq!(decoded.raw.get(1), Some("e"));
        assert_eq!(decoded.record.0, 5);
        assert_eq!(records.headers().unwrap().get(0), Some("id"));
    }
}
