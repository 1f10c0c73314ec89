pub mod constants;
pub mod coordinates;
pub mod filename;
pub mod progress;
pub mod projection;

pub use constants::*;
pub use coordinates::{dms_to_decimal, haversine_distance, CoordKey};
pub use filename::{cell_id_from_report_path, report_path};
pub use progress::ProgressReporter;
pub use projection::CoordinateSystem;
