//! Pipeline configuration.
//!
//! Settings are layered: defaults, then an optional configuration file
//! (TOML, YAML or JSON, picked from the extension), then `PRECIP_*`
//! environment variables, then command-line overrides applied by the CLI.

use crate::error::{ProcessingError, Result};
use crate::models::{DateWindow, ReportShape};
use crate::processors::JoinStrategy;
use crate::utils::constants::{
    DEFAULT_COORDINATE_PRECISION, DEFAULT_NEAREST_TOLERANCE, DEFAULT_OUTPUT_DIR,
    DEFAULT_REGISTRY_FILE, DEFAULT_VARIABLE, ENV_PREFIX,
};
use crate::utils::CoordinateSystem;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    /// Registry and measurements come from the same discretized grid
    #[default]
    Exact,
    /// Registry was built independently of the measurement grid
    Nearest,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_pipeline_config"))]
pub struct PipelineConfig {
    /// GeoJSON boundary restricting the registry
    pub region_path: Option<PathBuf>,

    /// Persisted registry; loaded when present, written after a build
    pub registry_path: PathBuf,

    /// Explicit grid table used instead of source points to build the registry
    pub grid_path: Option<PathBuf>,

    /// Directory holding one `<id>.json` report per cell
    pub output_dir: PathBuf,

    pub start_date: Option<NaiveDate>,

    pub end_date: Option<NaiveDate>,

    #[validate(length(min = 1))]
    pub variables: Vec<String>,

    /// Variables whose negative values are replaced by zero before summing
    pub clip_negative: Vec<String>,

    pub source_crs: CoordinateSystem,

    pub join: JoinMode,

    pub nearest_tolerance: f64,

    #[validate(range(max = 9))]
    pub coordinate_precision: u32,

    /// Label multi-variable periods `annual_<var>` / `monthly_<var>`
    pub prefix_labels: bool,

    #[validate(range(min = 1))]
    pub max_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            region_path: None,
            registry_path: PathBuf::from(DEFAULT_REGISTRY_FILE),
            grid_path: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            start_date: None,
            end_date: None,
            variables: vec![DEFAULT_VARIABLE.to_string()],
            clip_negative: Vec::new(),
            source_crs: CoordinateSystem::default(),
            join: JoinMode::default(),
            nearest_tolerance: DEFAULT_NEAREST_TOLERANCE,
            coordinate_precision: DEFAULT_COORDINATE_PRECISION,
            prefix_labels: false,
            max_workers: num_cpus::get(),
        }
    }
}

impl PipelineConfig {
    /// Load settings from an optional file and the environment.
    ///
    /// A file path that was given but does not exist is a configuration
    /// error, not a silent fallback to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.is_file() {
                return Err(ProcessingError::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("variables")
                .with_list_parse_key("clip_negative"),
        );

        let settings: PipelineConfig = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Validate and return self, for use at the end of a builder chain
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn date_window(&self) -> DateWindow {
        DateWindow::new(self.start_date, self.end_date)
    }

    pub fn join_strategy(&self) -> JoinStrategy {
        match self.join {
            JoinMode::Exact => JoinStrategy::Exact,
            JoinMode::Nearest => JoinStrategy::Nearest {
                tolerance: self.nearest_tolerance,
            },
        }
    }

    pub fn report_shape(&self) -> Result<ReportShape> {
        ReportShape::for_variables(&self.variables, self.prefix_labels)
    }
}

fn validate_pipeline_config(config: &PipelineConfig) -> std::result::Result<(), ValidationError> {
    if let Some(unknown) = config
        .clip_negative
        .iter()
        .find(|name| !config.variables.contains(name))
    {
        return Err(with_message(
            "clip_not_summarized",
            format!("clip_negative variable '{}' is not in variables", unknown),
        ));
    }

    if let (Some(start), Some(end)) = (config.start_date, config.end_date) {
        if start > end {
            return Err(with_message(
                "inverted_dates",
                format!("start_date {} is after end_date {}", start, end),
            ));
        }
    }

    if config.join == JoinMode::Nearest
        && !(config.nearest_tolerance.is_finite() && config.nearest_tolerance > 0.0)
    {
        return Err(with_message(
            "tolerance",
            format!(
                "nearest_tolerance must be a positive number, got {}",
                config.nearest_tolerance
            ),
        ));
    }

    Ok(())
}

fn with_message(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::from(message));
    error
}
