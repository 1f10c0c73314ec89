pub mod cell;
pub mod measurement;
pub mod report;
pub mod station;

pub use cell::{Cell, CellId, RawPoint};
pub use measurement::{DateWindow, Measurement, SourceBatch};
pub use report::{month_key, year_key, CellReport, MergeOutcome, PeriodValue, ReportShape};
pub use station::StationMetadata;
