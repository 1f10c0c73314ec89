use crate::models::CellId;

/// Counters accumulated over every pass of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub passes: usize,
    pub registry_cells: usize,
    pub records_read: usize,
    pub records_dropped: usize,
    pub records_outside_window: usize,
    pub join_misses: usize,
    pub records_aggregated: usize,
    pub cells_written: usize,
    pub cells_merged: usize,
    pub periods_added: usize,
    pub skipped: Vec<SkippedCell>,
}

#[derive(Debug, Clone)]
pub struct SkippedCell {
    pub cell_id: CellId,
    pub pass: usize,
    pub reason: String,
}

impl RunSummary {
    pub fn new(registry_cells: usize) -> Self {
        Self {
            registry_cells,
            ..Self::default()
        }
    }

    pub fn cells_skipped(&self) -> usize {
        self.skipped.len()
    }

    pub fn skip(&mut self, cell_id: CellId, pass: usize, reason: impl Into<String>) {
        self.skipped.push(SkippedCell {
            cell_id,
            pass,
            reason: reason.into(),
        });
    }

    pub fn generate_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("=== Precipitation Run Summary ===\n");
        summary.push_str(&format!("Passes: {}\n", self.passes));
        summary.push_str(&format!("Registry Cells: {}\n", self.registry_cells));
        summary.push_str(&format!("Records Read: {}\n", self.records_read));
        summary.push_str(&format!(
            "Records Aggregated: {} ({:.1}%)\n",
            self.records_aggregated,
            percentage(self.records_aggregated, self.records_read)
        ));
        summary.push_str(&format!("Malformed Records Dropped: {}\n", self.records_dropped));
        summary.push_str(&format!(
            "Outside Date Window: {}\n",
            self.records_outside_window
        ));
        summary.push_str(&format!("Unmatched Records: {}\n", self.join_misses));
        summary.push_str(&format!("\nCells Written: {}\n", self.cells_written));
        summary.push_str(&format!(
            "Cells Merged: {} ({} periods added)\n",
            self.cells_merged, self.periods_added
        ));
        summary.push_str(&format!("Cells Skipped: {}\n", self.cells_skipped()));

        if !self.skipped.is_empty() {
            summary.push_str("\nFirst 10 Skipped Cells:\n");
            for (i, skipped) in self.skipped.iter().take(10).enumerate() {
                summary.push_str(&format!(
                    "  {}. Cell {} (pass {}): {}\n",
                    i + 1,
                    skipped.cell_id,
                    skipped.pass,
                    skipped.reason
                ));
            }
        }

        summary
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}
