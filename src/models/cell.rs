use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use validator::Validate;

/// Stable, positive identifier of a registry cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CellId(NonZeroU32);

impl CellId {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(CellId)
    }

    /// Id for the cell at zero-based `index` in registry order
    pub fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index + 1).ok().and_then(Self::new)
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for CellId {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        CellId::new(value).ok_or_else(|| "cell id must be a positive integer".to_string())
    }
}

impl From<CellId> for u32 {
    fn from(id: CellId) -> Self {
        id.get()
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A spatial unit that statistics are reported against.
///
/// `x`/`y` are in the source coordinate system (degrees or Lambert
/// hectometres); `lon`/`lat` are always geographic WGS84 degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Cell {
    pub id: CellId,

    pub x: f64,

    pub y: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl Cell {
    pub fn new(id: CellId, x: f64, y: f64, lon: f64, lat: f64, elevation: Option<f64>) -> Self {
        Self {
            id,
            x,
            y,
            lon,
            lat,
            elevation,
        }
    }
}

/// Candidate location handed to the registry builder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
    pub elevation: Option<f64>,
}

impl RawPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            elevation: None,
        }
    }

    pub fn with_elevation(mut self, elevation: Option<f64>) -> Self {
        self.elevation = elevation;
        self
    }
}
