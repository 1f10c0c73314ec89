//! Per-station CSV files.
//!
//! A file opens with `KEY=VALUE` metadata lines (usually `#`-prefixed)
//! giving the station position, then a `date;precipitation;quality` table:
//!
//! ```text
//! # NUM_POSTE=01014002
//! # NOM_USUEL=ARBENT
//! # LATITUDE (°)=46,278167
//! # LONGITUDE(°)=5,669
//! # ALTITUDE (m)=534
//! date;precipitation;quality
//! 20100101;0,2;1
//! ```
//!
//! Files exported on Windows are often Latin-1 encoded.

use crate::error::{ProcessingError, Result};
use crate::models::{Measurement, RawPoint, SourceBatch, StationMetadata};
use crate::readers::source::{decode_text, parse_decimal};
use crate::utils::constants::{PRECIPITATION_VARIABLE, SOURCE_DATE_FORMAT};
use crate::utils::coordinates::parse_coordinate;
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tracing::debug;
use validator::Validate;

pub struct StationReader {
    variable: String,
}

impl StationReader {
    pub fn new() -> Self {
        Self::with_variable(PRECIPITATION_VARIABLE)
    }

    /// Record the precipitation column under `variable`
    pub fn with_variable(variable: &str) -> Self {
        Self {
            variable: variable.to_string(),
        }
    }

    pub fn read_file(&self, path: &Path) -> Result<SourceBatch> {
        let bytes = fs::read(path)?;
        let (station, batch) = self.parse(&decode_text(&bytes)).map_err(|e| match e {
            ProcessingError::MissingData(msg) => {
                ProcessingError::MissingData(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        debug!(
            "{}: {} days, {} dropped",
            station.label(),
            batch.len(),
            batch.dropped
        );
        Ok(batch)
    }

    /// Parse a whole station file
    pub fn parse(&self, text: &str) -> Result<(StationMetadata, SourceBatch)> {
        let mut metadata: Vec<(String, String)> = Vec::new();
        let mut rows: Vec<&str> = Vec::new();

        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let body = line.trim_start_matches('#').trim();
            if line.starts_with('#') || (body.contains('=') && !body.contains(';')) {
                if let Some((key, value)) = body.split_once('=') {
                    metadata.push((key.trim().to_uppercase(), value.trim().to_string()));
                }
                continue;
            }

            // Column header
            if !line.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            rows.push(line);
        }

        let station = parse_metadata(&metadata)?;
        let mut batch = SourceBatch::new();
        batch
            .points
            .push(RawPoint::new(station.longitude, station.latitude).with_elevation(station.elevation));

        for line in rows {
            match self.parse_row(line, &station) {
                Ok(Some(measurement)) => batch.measurements.push(measurement),
                Ok(None) => {}
                Err(e) => {
                    debug!("Dropping '{}': {}", line, e);
                    batch.dropped += 1;
                }
            }
        }

        Ok((station, batch))
    }

    fn parse_row(&self, line: &str, station: &StationMetadata) -> Result<Option<Measurement>> {
        let mut fields = line.split(';').map(str::trim);

        let date_text = fields.next().unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_text, SOURCE_DATE_FORMAT)
            .or_else(|_| NaiveDate::parse_from_str(date_text, "%Y-%m-%d"))?;

        let value_text = fields.next().unwrap_or_default();
        if value_text.is_empty() {
            return Ok(None);
        }
        let value = parse_decimal(value_text).ok_or_else(|| {
            ProcessingError::InvalidFormat(format!("Invalid precipitation: '{}'", value_text))
        })?;

        Ok(Some(
            Measurement::new(station.longitude, station.latitude, date)
                .with_value(&self.variable, value),
        ))
    }
}

impl Default for StationReader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_metadata(fields: &[(String, String)]) -> Result<StationMetadata> {
    let find = |prefix: &str| {
        fields
            .iter()
            .find(|(key, _)| key.starts_with(prefix))
            .map(|(_, value)| value.as_str())
    };

    let longitude = find("LONGITUDE")
        .ok_or_else(|| ProcessingError::MissingData("No LONGITUDE in station header".to_string()))
        .and_then(parse_coordinate)?;
    let latitude = find("LATITUDE")
        .ok_or_else(|| ProcessingError::MissingData("No LATITUDE in station header".to_string()))
        .and_then(parse_coordinate)?;

    let station = StationMetadata {
        station_id: find("NUM_POSTE").map(String::from),
        name: find("NOM_USUEL").map(String::from),
        elevation: find("ALTITUDE").and_then(parse_decimal),
        ..StationMetadata::new(longitude, latitude)
    };
    station.validate()?;
    Ok(station)
}
