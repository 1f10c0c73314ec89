use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Cell {cell_id} has no report to merge into")]
    MergeTargetMissing { cell_id: u32 },

    #[error("Cell {cell_id} not found in registry")]
    CellNotFound { cell_id: u32 },

    #[error("Report for cell {cell_id} is unreadable: {source}")]
    CorruptReport {
        cell_id: u32,
        #[source]
        source: serde_json::Error,
    },
}

impl ProcessingError {
    /// Errors that only concern a single cell and must not abort a run.
    pub fn is_per_cell(&self) -> bool {
        matches!(
            self,
            ProcessingError::MergeTargetMissing { .. }
                | ProcessingError::CellNotFound { .. }
                | ProcessingError::CorruptReport { .. }
        )
    }
}
