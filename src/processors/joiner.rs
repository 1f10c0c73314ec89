//! Attach measurements to registry cells.

use crate::models::{CellId, Measurement};
use crate::processors::registry::CellRegistry;
use crate::utils::CoordKey;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoinStrategy {
    /// Coordinates match the registry at its precision
    Exact,
    /// Nearest registry cell within `tolerance` degrees
    Nearest { tolerance: f64 },
}

/// A measurement tagged with the cell it belongs to
#[derive(Debug, Clone, Copy)]
pub struct TaggedMeasurement<'m> {
    pub cell_id: CellId,
    pub measurement: &'m Measurement,
}

#[derive(Debug, Default)]
pub struct JoinOutcome<'m> {
    pub joined: Vec<TaggedMeasurement<'m>>,
    /// Measurements with no matching cell; dropped, never an error
    pub misses: usize,
}

pub struct RecordJoiner<'r> {
    registry: &'r CellRegistry,
    strategy: JoinStrategy,
}

impl<'r> RecordJoiner<'r> {
    pub fn new(registry: &'r CellRegistry, strategy: JoinStrategy) -> Self {
        Self { registry, strategy }
    }

    pub fn strategy(&self) -> JoinStrategy {
        self.strategy
    }

    /// Cell for one source coordinate pair
    pub fn resolve(&self, x: f64, y: f64) -> Option<CellId> {
        match self.strategy {
            JoinStrategy::Exact => self.registry.lookup_exact(x, y),
            JoinStrategy::Nearest { tolerance } => {
                match self.registry.system().to_geographic(x, y) {
                    Ok((lon, lat)) => self.registry.nearest_within(lon, lat, tolerance),
                    Err(e) => {
                        warn!("Cannot place measurement at ({}, {}): {}", x, y, e);
                        None
                    }
                }
            }
        }
    }

    /// Tag every measurement with its cell. Gridded sources repeat the same
    /// coordinates for every date, so lookups are cached per coordinate.
    pub fn join<'m, I>(&self, measurements: I) -> JoinOutcome<'m>
    where
        I: IntoIterator<Item = &'m Measurement>,
    {
        let precision = self.registry.precision();
        let mut cache: HashMap<CoordKey, Option<CellId>> = HashMap::new();
        let mut outcome = JoinOutcome::default();

        for measurement in measurements {
            let key = CoordKey::new(measurement.x, measurement.y, precision);
            let cell = *cache
                .entry(key)
                .or_insert_with(|| self.resolve(measurement.x, measurement.y));

            match cell {
                Some(cell_id) => outcome.joined.push(TaggedMeasurement {
                    cell_id,
                    measurement,
                }),
                None => outcome.misses += 1,
            }
        }

        debug!(
            "Joined {} measurements over {} coordinates, {} misses",
            outcome.joined.len(),
            cache.len(),
            outcome.misses
        );

        outcome
    }
}
