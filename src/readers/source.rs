//! Opening inputs and turning one pass's paths into a single batch.

use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result};
use crate::models::SourceBatch;
use crate::readers::station_reader::StationReader;
use crate::readers::tabular_reader::TabularReader;
use crate::utils::constants::{DEFAULT_BUFFER_SIZE, MMAP_THRESHOLD_BYTES};
use encoding_rs::WINDOWS_1252;
use flate2::read::MultiGzDecoder;
use memmap2::Mmap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const SNIFF_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Decide per file from its content
    #[default]
    Auto,
    /// `LAMBX;LAMBY;DATE;<variables>` exports, plain or gzip
    Tabular,
    /// Per-station CSV with a `#KEY=VALUE` metadata header
    Station,
}

/// Open a source file for reading. Gzip content is detected from its magic
/// bytes; large plain files are memory-mapped when `use_mmap` is set.
pub fn open_source(path: &Path, use_mmap: bool) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file);

    if reader.fill_buf()?.starts_with(&GZIP_MAGIC) {
        debug!("Reading {} as gzip", path.display());
        return Ok(Box::new(MultiGzDecoder::new(reader)));
    }

    if use_mmap && len >= MMAP_THRESHOLD_BYTES {
        debug!("Memory-mapping {} ({} bytes)", path.display(), len);
        let mmap = unsafe { Mmap::map(reader.get_ref())? };
        return Ok(Box::new(Cursor::new(mmap)));
    }

    Ok(Box::new(reader))
}

/// Text of a source file: UTF-8 when valid, Windows-1252 (a Latin-1
/// superset) otherwise.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text.strip_prefix('\u{feff}').unwrap_or(text)),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0,
    }
}

/// Parse a number written with a decimal point or a decimal comma
pub fn parse_decimal(field: &str) -> Option<f64> {
    let trimmed = field.trim();
    let value = if trimmed.contains(',') {
        trimmed.replace(',', ".").parse::<f64>().ok()
    } else {
        trimmed.parse::<f64>().ok()
    };
    value.filter(|v| v.is_finite())
}

/// Files making up one pass: the path itself, or every regular file of a
/// directory in name order.
pub fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry_path = entry?.path();
        let hidden = entry_path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'));
        if entry_path.is_file() && !hidden {
            files.push(entry_path);
        }
    }
    files.sort();
    Ok(files)
}

pub struct SourceReader {
    format: SourceFormat,
    variables: Vec<String>,
    max_workers: usize,
    use_mmap: bool,
}

impl SourceReader {
    pub fn new(variables: Vec<String>, max_workers: usize) -> Self {
        Self {
            format: SourceFormat::Auto,
            variables,
            max_workers: max_workers.max(1),
            use_mmap: true,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.variables.clone(), config.max_workers)
    }

    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    /// Read one pass. A directory is a single pass over all of its files.
    pub fn read_pass(&self, input: &Path) -> Result<SourceBatch> {
        let files = collect_inputs(input)?;
        if files.is_empty() {
            return Err(ProcessingError::MissingData(format!(
                "No input files in {}",
                input.display()
            )));
        }
        self.read_files(&files)
    }

    /// Parse files on a bounded pool; batches are concatenated in input order
    pub fn read_files(&self, files: &[PathBuf]) -> Result<SourceBatch> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers.min(files.len().max(1)))
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        let batches: Result<Vec<SourceBatch>> =
            pool.install(|| files.par_iter().map(|path| self.read_file(path)).collect());

        let mut combined = SourceBatch::new();
        for batch in batches? {
            combined.extend(batch);
        }

        info!(
            "Read {} measurements from {} file(s), {} malformed records dropped",
            combined.len(),
            files.len(),
            combined.dropped
        );
        Ok(combined)
    }

    pub fn read_file(&self, path: &Path) -> Result<SourceBatch> {
        let format = match self.format {
            SourceFormat::Auto => detect_format(path)?,
            explicit => explicit,
        };

        match format {
            SourceFormat::Station => {
                // Station files carry one series, recorded under the first variable
                let variable = self.variables.first().map(String::as_str).unwrap_or_default();
                StationReader::with_variable(variable).read_file(path)
            }
            _ => TabularReader::new(self.variables.clone())
                .with_mmap(self.use_mmap)
                .read_file(path),
        }
    }
}

/// Station files start with `KEY=VALUE` metadata; anything else is tabular
pub fn detect_format(path: &Path) -> Result<SourceFormat> {
    let mut head = Vec::with_capacity(SNIFF_BYTES);
    open_source(path, false)?
        .take(SNIFF_BYTES as u64)
        .read_to_end(&mut head)?;

    let text = decode_text(&head);
    let first_line = text.lines().map(str::trim).find(|line| !line.is_empty());

    Ok(match first_line {
        Some(line) if line.starts_with('#') || (line.contains('=') && !line.contains(';')) => {
            SourceFormat::Station
        }
        _ => SourceFormat::Tabular,
    })
}
