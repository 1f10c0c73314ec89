/// Tabular source columns (SIM2 daily exports)
pub const COL_LAMBX: &str = "LAMBX";
pub const COL_LAMBY: &str = "LAMBY";
pub const COL_DATE: &str = "DATE";

/// Grid table columns (SAFRAN grid description)
pub const GRID_COL_LAMBX: &str = "LAMBX (hm)";
pub const GRID_COL_LAMBY: &str = "LAMBY (hm)";
pub const GRID_COL_LAT: &str = "LAT_DG";
pub const GRID_COL_LON: &str = "LON_DG";

/// Variable names
pub const DEFAULT_VARIABLE: &str = "PRELIQ_Q";
pub const PRECIPITATION_VARIABLE: &str = "precipitation";

/// Source date format (e.g. 20240131)
pub const SOURCE_DATE_FORMAT: &str = "%Y%m%d";

/// Report labels used when several variables share a period
pub const ANNUAL_PREFIX: &str = "annual_";
pub const MONTHLY_PREFIX: &str = "monthly_";

/// File names
pub const DEFAULT_REGISTRY_FILE: &str = "centroid_coordinates.json";
pub const DEFAULT_OUTPUT_DIR: &str = "output/cells";
pub const REPORT_EXTENSION: &str = "json";

/// Coordinate handling
pub const DEFAULT_COORDINATE_PRECISION: u32 = 3;
pub const DEFAULT_NEAREST_TOLERANCE: f64 = 0.05;
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Processing defaults
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB
pub const MMAP_THRESHOLD_BYTES: u64 = 64 * 1024 * 1024;

/// Environment prefix for configuration overrides (PRECIP_OUTPUT_DIR, ...)
pub const ENV_PREFIX: &str = "PRECIP";
