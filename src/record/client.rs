use super::{RecordDecodeError, RecordDecoder, Row};

/// Number of columns in a client log.
pub const COLUMNS: usize = 2;

/// One request issued by the client population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientRecord {
    pub duration: f64,
    pub bytes: u64,
}

impl ClientRecord {
    /// A failed request is logged with zero duration and zero bytes.
    pub fn is_error(&self) -> bool {
        self.duration == 0.0 && self.bytes == 0
    }
}

/// Decoder for client logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientDecoder;

impl RecordDecoder for ClientDecoder {
    type Record = ClientRecord;

    fn decode(&self, row: &Row<'_>) -> Result<ClientRecord, RecordDecodeError> {
        row.expect_columns(&[COLUMNS], "2")?;
        Ok(ClientRecord {
            duration: row.parse_finite(0, "duration")?,
            bytes: row.parse(1, "bytes_transferred", "byte count")?,
        })
    }
}
