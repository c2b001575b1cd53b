use crate::error::{Error, Result};
use crate::features::Record;
use csv::ReaderBuilder;
use serde_json::{Number, Value};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Game records loaded from a delimited file with a header row
#[derive(Debug, Clone)]
pub struct DataSet {
    pub records: Vec<Record>,
    pub headers: Vec<String>,
}

impl DataSet {
    /// Read a TSV file into a DataSet
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_path(path, b'\t')
    }

    /// Read a delimited file into a DataSet
    pub fn from_path<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let file = File::open(&path)?;
        let ds = Self::from_reader(file, delimiter)?;
        tracing::info!(
            path = %path.as_ref().display(),
            records = ds.records.len(),
            columns = ds.headers.len(),
            "loaded data set"
        );
        Ok(ds)
    }

    /// Parse delimited text. Numeric-looking cells become numbers, empty
    /// cells become null, everything else stays a string.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|s| s.to_string()).collect();

        let mut records = Vec::new();
        for result in rdr.records() {
            let row = result?;
            let record: Record = headers
                .iter()
                .zip(row.iter())
                .map(|(h, cell)| (h.clone(), parse_cell(cell)))
                .collect();
            records.push(record);
        }

        if records.is_empty() {
            return Err(Error::EmptyInput);
        }

        Ok(Self { records, headers })
    }
}

fn parse_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Number(i.into());
    }
    match cell.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(cell.to_string()),
    }
}
