//! Stable registry of unique grid cells.
//!
//! Ids are assigned densely in first-occurrence order and never derived
//! from hashing, so the same input always yields the same numbering. A
//! registry loaded from disk keeps the ids it was saved with, along with
//! the coordinate system and rounding precision its keys were built with.

use crate::error::{ProcessingError, Result};
use crate::models::{Cell, CellId, RawPoint};
use crate::processors::region_filter::Region;
use crate::readers::GridRow;
use crate::utils::coordinates::validate_geographic;
use crate::utils::{haversine_distance, CoordKey, CoordinateSystem};
use rstar::primitives::GeomWithData;
use rstar::{PointDistance, RTree};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use validator::Validate;

type CellPoint = GeomWithData<[f64; 2], CellId>;

#[derive(Serialize)]
struct RegistryDocument<'a> {
    system: CoordinateSystem,
    precision: u32,
    cells: &'a [Cell],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRegistry {
    Document {
        system: CoordinateSystem,
        precision: u32,
        cells: Vec<Cell>,
    },
    /// Bare cell array, without the settings its keys were built with
    Cells(Vec<Cell>),
}

pub struct CellRegistry {
    cells: Vec<Cell>,
    system: CoordinateSystem,
    precision: u32,
    by_id: HashMap<CellId, usize>,
    by_key: HashMap<CoordKey, CellId>,
    spatial: RTree<CellPoint>,
}

impl CellRegistry {
    /// Build from source points; duplicates collapse onto the first occurrence
    pub fn from_points<I>(points: I, system: CoordinateSystem, precision: u32) -> Result<Self>
    where
        I: IntoIterator<Item = RawPoint>,
    {
        Self::build(points, system, precision, None)
    }

    /// Build from source points, keeping only those strictly inside `region`
    pub fn from_points_in_region<I>(
        points: I,
        system: CoordinateSystem,
        precision: u32,
        region: &Region,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = RawPoint>,
    {
        Self::build(points, system, precision, Some(region))
    }

    /// Build from an explicit grid table. Geographic columns present in
    /// the table are used as is; missing ones are projected from x/y.
    pub fn from_grid_table(
        rows: Vec<GridRow>,
        system: CoordinateSystem,
        precision: u32,
        region: Option<&Region>,
    ) -> Result<Self> {
        let mut cells = Vec::with_capacity(rows.len());
        let mut seen = HashSet::with_capacity(rows.len());

        for row in rows {
            let key = CoordKey::new(row.x, row.y, precision);
            if seen.contains(&key) {
                continue;
            }

            let (lon, lat) = match row.geographic() {
                Some(lonlat) => lonlat,
                None => system.to_geographic(row.x, row.y)?,
            };
            validate_geographic(lon, lat)?;

            if region.is_some_and(|region| !region.contains(lon, lat)) {
                continue;
            }
            seen.insert(key);

            let id = next_id(cells.len())?;
            cells.push(Cell::new(id, row.x, row.y, lon, lat, None));
        }

        Self::from_cells(cells, system, precision)
    }

    fn build<I>(
        points: I,
        system: CoordinateSystem,
        precision: u32,
        region: Option<&Region>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = RawPoint>,
    {
        let mut seen = HashSet::new();
        // Exact source coordinates already found outside the region
        let mut rejected = HashSet::new();
        let mut cells = Vec::new();
        let mut outside = 0usize;

        for point in points {
            let key = CoordKey::new(point.x, point.y, precision);
            let bits = (point.x.to_bits(), point.y.to_bits());
            if seen.contains(&key) || rejected.contains(&bits) {
                continue;
            }

            let (lon, lat) = system.to_geographic(point.x, point.y)?;
            validate_geographic(lon, lat)?;

            if let Some(region) = region {
                if !region.contains(lon, lat) {
                    outside += 1;
                    rejected.insert(bits);
                    continue;
                }
            }
            seen.insert(key);

            let id = next_id(cells.len())?;
            cells.push(Cell::new(id, point.x, point.y, lon, lat, point.elevation));
        }

        debug!(
            "Registry build: {} cells kept, {} points outside region",
            seen.len(),
            outside
        );

        Self::from_cells(cells, system, precision)
    }

    /// Index an existing cell list, rejecting duplicate ids or coordinates
    pub fn from_cells(cells: Vec<Cell>, system: CoordinateSystem, precision: u32) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(cells.len());
        let mut by_key = HashMap::with_capacity(cells.len());

        for (position, cell) in cells.iter().enumerate() {
            cell.validate()?;

            if by_id.insert(cell.id, position).is_some() {
                return Err(ProcessingError::Config(format!(
                    "Registry holds cell id {} more than once",
                    cell.id
                )));
            }

            let key = CoordKey::new(cell.x, cell.y, precision);
            if let Some(previous) = by_key.insert(key, cell.id) {
                return Err(ProcessingError::Config(format!(
                    "Cells {} and {} share coordinates ({}, {})",
                    previous, cell.id, cell.x, cell.y
                )));
            }
        }

        let spatial = RTree::bulk_load(
            cells
                .iter()
                .map(|cell| GeomWithData::new([cell.lon, cell.lat], cell.id))
                .collect(),
        );

        Ok(Self {
            cells,
            system,
            precision,
            by_id,
            by_key,
            spatial,
        })
    }

    /// Persist cells together with the coordinate system and precision.
    /// The file is replaced atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };

        let document = RegistryDocument {
            system: self.system,
            precision: self.precision,
            cells: &self.cells,
        };

        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, &document)?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;

        info!("Saved {} cells to {}", self.cells.len(), path.display());
        Ok(())
    }

    /// Load a registry saved by [`CellRegistry::save`]. Ids are kept as stored.
    ///
    /// A registry saved with a different coordinate system or precision is
    /// a configuration error: its keys would match none of the measurements.
    pub fn load(path: &Path, system: CoordinateSystem, precision: u32) -> Result<Self> {
        let cells = match read_stored(path)? {
            StoredRegistry::Document {
                system: stored_system,
                precision: stored_precision,
                cells,
            } => {
                if stored_system != system || stored_precision != precision {
                    return Err(ProcessingError::Config(format!(
                        "Registry {} was built for {} at precision {}, configured {} at precision {}",
                        path.display(),
                        stored_system,
                        stored_precision,
                        system,
                        precision
                    )));
                }
                cells
            }
            StoredRegistry::Cells(cells) => cells,
        };

        info!("Loaded {} cells from {}", cells.len(), path.display());
        Self::from_cells(cells, system, precision)
    }

    /// Load a registry with the coordinate system and precision it was saved with
    pub fn open(path: &Path) -> Result<Self> {
        match read_stored(path)? {
            StoredRegistry::Document {
                system,
                precision,
                cells,
            } => {
                info!("Loaded {} cells ({}) from {}", cells.len(), system, path.display());
                Self::from_cells(cells, system, precision)
            }
            StoredRegistry::Cells(_) => Err(ProcessingError::Config(format!(
                "Registry {} does not record its coordinate system",
                path.display()
            ))),
        }
    }

    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.by_id.get(&id).map(|&position| &self.cells[position])
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells.iter().map(|cell| cell.id)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn system(&self) -> CoordinateSystem {
        self.system
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Cell whose source coordinates match at the registry precision
    pub fn lookup_exact(&self, x: f64, y: f64) -> Option<CellId> {
        self.by_key.get(&CoordKey::new(x, y, self.precision)).copied()
    }

    /// Nearest cell in degree space, if no farther than `tolerance` degrees
    pub fn nearest_within(&self, lon: f64, lat: f64, tolerance: f64) -> Option<CellId> {
        let query = [lon, lat];
        self.spatial
            .nearest_neighbor(&query)
            .filter(|candidate| candidate.distance_2(&query) <= tolerance * tolerance)
            .map(|candidate| candidate.data)
    }

    /// Nearest cell by great-circle distance, with the distance in kilometres
    pub fn nearest_by_distance(&self, lon: f64, lat: f64) -> Option<(&Cell, f64)> {
        self.cells
            .iter()
            .map(|cell| (cell, haversine_distance(lat, lon, cell.lat, cell.lon)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

impl std::fmt::Debug for CellRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellRegistry")
            .field("cells", &self.cells.len())
            .field("system", &self.system)
            .field("precision", &self.precision)
            .finish()
    }
}

fn read_stored(path: &Path) -> Result<StoredRegistry> {
    let file = File::open(path).map_err(|e| {
        ProcessingError::Config(format!("Cannot open registry {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn next_id(count: usize) -> Result<CellId> {
    CellId::from_index(count)
        .ok_or_else(|| ProcessingError::Config("Registry exceeds the cell id range".to_string()))
}
