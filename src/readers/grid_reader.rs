//! Grid description tables (one row per cell, decimal comma).

use crate::error::{ProcessingError, Result};
use crate::readers::source::{decode_text, open_source, parse_decimal};
use crate::utils::constants::{GRID_COL_LAMBX, GRID_COL_LAMBY, GRID_COL_LAT, GRID_COL_LON};
use csv::ByteRecord;
use std::io::Read;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridRow {
    pub x: f64,
    pub y: f64,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

impl GridRow {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            lon: None,
            lat: None,
        }
    }

    pub fn with_geographic(mut self, lon: f64, lat: f64) -> Self {
        self.lon = Some(lon);
        self.lat = Some(lat);
        self
    }

    /// Geographic position, when the table carried both columns
    pub fn geographic(&self) -> Option<(f64, f64)> {
        self.lon.zip(self.lat)
    }
}

pub struct GridReader {
    delimiter: u8,
}

impl GridReader {
    pub fn new() -> Self {
        Self { delimiter: b';' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Read a grid table. The registry depends on every row, so any
    /// unreadable row fails the whole table.
    pub fn read_file(&self, path: &Path) -> Result<Vec<GridRow>> {
        if !path.is_file() {
            return Err(ProcessingError::Config(format!(
                "Grid table not found: {}",
                path.display()
            )));
        }

        let rows = self.read_from(open_source(path, false)?)?;
        info!("Read {} grid rows from {}", rows.len(), path.display());
        Ok(rows)
    }

    pub fn read_from<R: Read>(&self, reader: R) -> Result<Vec<GridRow>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(reader);

        let names: Vec<String> = csv_reader
            .byte_headers()?
            .iter()
            .map(|header| decode_text(header).trim().to_string())
            .collect();
        let position = |name: &str| names.iter().position(|header| header == name);

        let x = position(GRID_COL_LAMBX).ok_or_else(|| missing(GRID_COL_LAMBX))?;
        let y = position(GRID_COL_LAMBY).ok_or_else(|| missing(GRID_COL_LAMBY))?;
        let geographic = position(GRID_COL_LON).zip(position(GRID_COL_LAT));

        let mut rows = Vec::new();
        let mut record = ByteRecord::new();
        let mut line = 1usize;

        while csv_reader.read_byte_record(&mut record)? {
            line += 1;
            let number = |index: usize| {
                record
                    .get(index)
                    .map(decode_text)
                    .and_then(|text| parse_decimal(&text))
                    .ok_or_else(|| {
                        ProcessingError::InvalidFormat(format!(
                            "Grid row {}: invalid value in column {}",
                            line,
                            names.get(index).map(String::as_str).unwrap_or("?")
                        ))
                    })
            };

            let mut row = GridRow::new(number(x)?, number(y)?);
            if let Some((lon, lat)) = geographic {
                row = row.with_geographic(number(lon)?, number(lat)?);
            }
            rows.push(row);
        }

        Ok(rows)
    }
}

impl Default for GridReader {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(column: &str) -> ProcessingError {
    ProcessingError::InvalidFormat(format!("Grid table has no '{}' column", column))
}
