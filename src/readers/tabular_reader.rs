//! Delimited exports with one row per coordinate and day.

use crate::error::{ProcessingError, Result};
use crate::models::{Measurement, RawPoint, SourceBatch};
use crate::readers::source::{decode_text, open_source, parse_decimal};
use crate::utils::constants::{COL_DATE, COL_LAMBX, COL_LAMBY, SOURCE_DATE_FORMAT};
use chrono::NaiveDate;
use csv::ByteRecord;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::debug;

struct Columns {
    x: usize,
    y: usize,
    date: usize,
    values: Vec<(String, usize)>,
}

pub struct TabularReader {
    variables: Vec<String>,
    x_column: String,
    y_column: String,
    date_column: String,
    delimiter: u8,
    use_mmap: bool,
}

impl TabularReader {
    pub fn new(variables: Vec<String>) -> Self {
        Self {
            variables,
            x_column: COL_LAMBX.to_string(),
            y_column: COL_LAMBY.to_string(),
            date_column: COL_DATE.to_string(),
            delimiter: b';',
            use_mmap: true,
        }
    }

    pub fn with_columns(mut self, x: &str, y: &str, date: &str) -> Self {
        self.x_column = x.to_string();
        self.y_column = y.to_string();
        self.date_column = date.to_string();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn read_file(&self, path: &Path) -> Result<SourceBatch> {
        let batch = self.read_from(open_source(path, self.use_mmap)?).map_err(|e| match e {
            ProcessingError::InvalidFormat(msg) => {
                ProcessingError::InvalidFormat(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        debug!(
            "{}: {} rows, {} coordinates, {} dropped",
            path.display(),
            batch.len(),
            batch.points.len(),
            batch.dropped
        );
        Ok(batch)
    }

    /// Parse rows from any reader. Missing columns fail the whole source;
    /// rows that do not parse are dropped and counted.
    pub fn read_from<R: Read>(&self, reader: R) -> Result<SourceBatch> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns = self.resolve_columns(csv_reader.byte_headers()?)?;

        let mut batch = SourceBatch::new();
        let mut seen = HashSet::new();
        let mut record = ByteRecord::new();
        let mut row = 1usize;

        loop {
            row += 1;
            match csv_reader.read_byte_record(&mut record) {
                Ok(false) => break,
                Ok(true) => {}
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    debug!("Dropping row {}: {}", row, e);
                    batch.dropped += 1;
                    continue;
                }
            }

            match parse_record(&record, &columns) {
                Ok(measurement) => {
                    if seen.insert((measurement.x.to_bits(), measurement.y.to_bits())) {
                        batch.points.push(RawPoint::new(measurement.x, measurement.y));
                    }
                    batch.measurements.push(measurement);
                }
                Err(e) => {
                    debug!("Dropping row {}: {}", row, e);
                    batch.dropped += 1;
                }
            }
        }

        Ok(batch)
    }

    fn resolve_columns(&self, headers: &ByteRecord) -> Result<Columns> {
        let names: Vec<String> = headers
            .iter()
            .map(|header| decode_text(header).trim().to_string())
            .collect();

        let position = |name: &str| {
            names.iter().position(|header| header == name).ok_or_else(|| {
                ProcessingError::InvalidFormat(format!(
                    "Missing column '{}' (found: {})",
                    name,
                    names.join(", ")
                ))
            })
        };

        let values = self
            .variables
            .iter()
            .map(|variable| Ok((variable.clone(), position(variable)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Columns {
            x: position(&self.x_column)?,
            y: position(&self.y_column)?,
            date: position(&self.date_column)?,
            values,
        })
    }
}

fn field<'r>(record: &'r ByteRecord, index: usize) -> Result<&'r str> {
    let bytes = record
        .get(index)
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Missing field {}", index + 1)))?;
    std::str::from_utf8(bytes)
        .map(str::trim)
        .map_err(|_| ProcessingError::InvalidFormat(format!("Field {} is not text", index + 1)))
}

fn number(record: &ByteRecord, index: usize) -> Result<f64> {
    let text = field(record, index)?;
    parse_decimal(text)
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Invalid number: '{}'", text)))
}

fn parse_record(record: &ByteRecord, columns: &Columns) -> Result<Measurement> {
    let x = number(record, columns.x)?;
    let y = number(record, columns.y)?;
    let date = NaiveDate::parse_from_str(field(record, columns.date)?, SOURCE_DATE_FORMAT)?;

    let mut measurement = Measurement::new(x, y, date);
    for (variable, index) in &columns.values {
        // An empty cell is a missing observation, not a malformed row
        if field(record, *index)?.is_empty() {
            continue;
        }
        measurement = measurement.with_value(variable, number(record, *index)?);
    }
    Ok(measurement)
}
