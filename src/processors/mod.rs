pub mod aggregator;
pub mod joiner;
pub mod pipeline;
pub mod region_filter;
pub mod registry;
pub mod summary;

pub use aggregator::{CellAggregate, TemporalAggregator};
pub use joiner::{JoinOutcome, JoinStrategy, RecordJoiner, TaggedMeasurement};
pub use pipeline::{PassMode, Pipeline};
pub use region_filter::Region;
pub use registry::CellRegistry;
pub use summary::{RunSummary, SkippedCell};
