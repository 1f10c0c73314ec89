pub mod grid_reader;
pub mod region_reader;
pub mod source;
pub mod station_reader;
pub mod tabular_reader;

pub use grid_reader::{GridReader, GridRow};
pub use region_reader::{parse_polygons, read_region};
pub use source::{collect_inputs, detect_format, SourceFormat, SourceReader};
pub use station_reader::StationReader;
pub use tabular_reader::TabularReader;
