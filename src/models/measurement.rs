use crate::models::RawPoint;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One dated observation at a raw source location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub x: f64,
    pub y: f64,
    pub date: NaiveDate,
    pub values: BTreeMap<String, f64>,
}

impl Measurement {
    pub fn new(x: f64, y: f64, date: NaiveDate) -> Self {
        Self {
            x,
            y,
            date,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, variable: &str, value: f64) -> Self {
        self.values.insert(variable.to_string(), value);
        self
    }

    pub fn value(&self, variable: &str) -> Option<f64> {
        self.values.get(variable).copied()
    }
}

/// Inclusive calendar window; open ends accept everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }
}

/// Output of a source adapter: the measurements of one file plus the
/// candidate registry points in first-occurrence order.
#[derive(Debug, Default)]
pub struct SourceBatch {
    pub measurements: Vec<Measurement>,
    pub points: Vec<RawPoint>,
    /// Records dropped because a required field failed to parse
    pub dropped: usize,
}

impl SourceBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, other: SourceBatch) {
        self.measurements.extend(other.measurements);
        self.points.extend(other.points);
        self.dropped += other.dropped;
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}
