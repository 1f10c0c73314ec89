//! Per-cell JSON report storage.
//!
//! One file per cell, `<output_dir>/<id>.json`. Writes go through a
//! temporary file in the same directory and an atomic rename, so a reader
//! never observes a half-written report.

use crate::error::{ProcessingError, Result};
use crate::models::{CellId, CellReport, MergeOutcome};
use crate::utils::{cell_id_from_report_path, report_path};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

pub trait CellStore {
    fn exists(&self, id: CellId) -> bool;

    fn read(&self, id: CellId) -> Result<CellReport>;

    /// Replace the report of `id`
    fn write(&self, id: CellId, report: &CellReport) -> Result<()>;

    /// Add the periods of `update` missing from the stored report and
    /// return the merged report. Periods already stored are never
    /// recomputed; merging the same update twice leaves the report unchanged.
    fn merge(&self, id: CellId, update: &CellReport) -> Result<CellReport> {
        self.merge_counted(id, update).map(|(report, _)| report)
    }

    /// [`CellStore::merge`], also reporting how many periods were added
    fn merge_counted(&self, id: CellId, update: &CellReport) -> Result<(CellReport, MergeOutcome)> {
        if !self.exists(id) {
            return Err(ProcessingError::MergeTargetMissing { cell_id: id.get() });
        }

        let mut report = self.read(id)?;
        let outcome = report.merge_missing(update);
        if outcome.changed() {
            self.write(id, &report)?;
        } else {
            trace!("Cell {} already holds every period, left untouched", id);
        }
        Ok((report, outcome))
    }
}

pub struct JsonCellStore {
    dir: PathBuf,
}

impl JsonCellStore {
    /// Open a store, creating the directory when needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("Report store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: CellId) -> PathBuf {
        report_path(&self.dir, id)
    }

    /// Ids of every report in the directory, ascending
    pub fn cell_ids(&self) -> Result<Vec<CellId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if let Some(id) = cell_id_from_report_path(&path) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl CellStore for JsonCellStore {
    fn exists(&self, id: CellId) -> bool {
        self.path_for(id).is_file()
    }

    fn read(&self, id: CellId) -> Result<CellReport> {
        let path = self.path_for(id);
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProcessingError::CellNotFound { cell_id: id.get() },
            _ => ProcessingError::Io(e),
        })?;

        serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            ProcessingError::CorruptReport {
                cell_id: id.get(),
                source,
            }
        })
    }

    fn write(&self, id: CellId, report: &CellReport) -> Result<()> {
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut temp, report)?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(self.path_for(id)).map_err(|e| e.error)?;
        Ok(())
    }
}

/// In-memory store with the same contract, holding serialized reports
#[derive(Debug, Default)]
pub struct MemoryCellStore {
    reports: RefCell<BTreeMap<CellId, String>>,
}

impl MemoryCellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.borrow().is_empty()
    }

    pub fn cell_ids(&self) -> Vec<CellId> {
        self.reports.borrow().keys().copied().collect()
    }

    /// Serialized report text, as a file store would hold it
    pub fn contents(&self, id: CellId) -> Option<String> {
        self.reports.borrow().get(&id).cloned()
    }
}

impl CellStore for MemoryCellStore {
    fn exists(&self, id: CellId) -> bool {
        self.reports.borrow().contains_key(&id)
    }

    fn read(&self, id: CellId) -> Result<CellReport> {
        let reports = self.reports.borrow();
        let text = reports
            .get(&id)
            .ok_or(ProcessingError::CellNotFound { cell_id: id.get() })?;
        serde_json::from_str(text).map_err(|source| ProcessingError::CorruptReport {
            cell_id: id.get(),
            source,
        })
    }

    fn write(&self, id: CellId, report: &CellReport) -> Result<()> {
        let text = serde_json::to_string_pretty(report)?;
        self.reports.borrow_mut().insert(id, text);
        Ok(())
    }
}
