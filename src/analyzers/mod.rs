pub mod report_analyzer;

pub use report_analyzer::{CellInsight, PeriodTotal, ReportAnalyzer, ReportStatistics};
