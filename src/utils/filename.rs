use crate::models::CellId;
use crate::utils::constants::REPORT_EXTENSION;
use std::path::{Path, PathBuf};

/// Path of the report file for a cell: `<dir>/<id>.json`
pub fn report_path(dir: &Path, id: CellId) -> PathBuf {
    dir.join(format!("{}.{}", id, REPORT_EXTENSION))
}

/// Cell id encoded in a report file name, if the name follows `<id>.json`
pub fn cell_id_from_report_path(path: &Path) -> Option<CellId> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(REPORT_EXTENSION) {
        return None;
    }

    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.parse::<u32>().ok())
        .and_then(CellId::new)
}
