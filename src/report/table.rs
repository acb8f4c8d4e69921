use std::io;

/// A rate-indexed comparison table.
///
/// The first column holds the row key, the remaining columns one value per
/// configured rate in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub title: String,
    /// Output name without extension.
    pub name: String,
    /// Header of the key column.
    pub bin_label: String,
    /// Ascending.
    pub rates: Vec<u32>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub key: String,
    pub values: Vec<f64>,
}

/// Plot-ready view of a table: one numeric series per row, sharing the
/// rate axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSet {
    pub title: String,
    pub file_name: String,
    pub x: Vec<u32>,
    pub series: Vec<(String, Vec<f64>)>,
}

impl Table {
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name)
    }

    /// `<bin-label>,<rate1>(req/sec),<rate2>(req/sec),...`
    pub fn header(&self) -> Vec<String> {
        std::iter::once(self.bin_label.clone())
            .chain(self.rates.iter().map(|r| format!("{r}(req/sec)")))
            .collect()
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut w = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(writer);
        w.write_record(self.header())?;
        for row in &self.rows {
            let fields =
                std::iter::once(row.key.clone()).chain(row.values.iter().map(f64::to_string));
            w.write_record(fields)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn to_series(&self) -> SeriesSet {
        SeriesSet {
            title: self.title.clone(),
            file_name: self.name.clone(),
            x: self.rates.clone(),
            series: self
                .rows
                .iter()
                .map(|r| (r.key.clone(), r.values.clone()))
                .collect(),
        }
    }
}
