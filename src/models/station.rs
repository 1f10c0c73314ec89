use serde::{Deserialize, Serialize};
use validator::Validate;

/// Header of a per-station precipitation file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StationMetadata {
    pub station_id: Option<String>,

    pub name: Option<String>,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    pub elevation: Option<f64>,
}

impl StationMetadata {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            station_id: None,
            name: None,
            longitude,
            latitude,
            elevation: None,
        }
    }

    pub fn label(&self) -> String {
        match (&self.station_id, &self.name) {
            (Some(id), Some(name)) => format!("{} ({})", name, id),
            (None, Some(name)) => name.clone(),
            (Some(id), None) => id.clone(),
            (None, None) => format!("station at {:.4}, {:.4}", self.longitude, self.latitude),
        }
    }
}
