//! Batch orchestration: filter, join, aggregate, store.
//!
//! Pass 0 of a run writes a fresh report for every registry cell; later
//! passes only merge periods that are not stored yet. With `append` every
//! pass merges, so an earlier run's reports are extended instead of replaced.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::{CellReport, DateWindow, Measurement, ReportShape, SourceBatch};
use crate::processors::aggregator::TemporalAggregator;
use crate::processors::joiner::{JoinStrategy, RecordJoiner};
use crate::processors::registry::CellRegistry;
use crate::processors::summary::RunSummary;
use crate::utils::ProgressReporter;
use crate::writers::CellStore;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Replace every registry cell's report
    Write,
    /// Add missing periods to existing reports
    Merge,
}

impl PassMode {
    pub fn for_pass(index: usize, append: bool) -> Self {
        if index == 0 && !append {
            PassMode::Write
        } else {
            PassMode::Merge
        }
    }
}

pub struct Pipeline<'a, S: CellStore> {
    registry: &'a CellRegistry,
    store: &'a S,
    aggregator: TemporalAggregator,
    strategy: JoinStrategy,
    shape: ReportShape,
    window: DateWindow,
}

impl<'a, S: CellStore> Pipeline<'a, S> {
    pub fn new(config: &PipelineConfig, registry: &'a CellRegistry, store: &'a S) -> Result<Self> {
        Ok(Self {
            registry,
            store,
            aggregator: TemporalAggregator::from_config(config),
            strategy: config.join_strategy(),
            shape: config.report_shape()?,
            window: config.date_window(),
        })
    }

    /// Run every pass in order. Batches are pulled lazily so only one is
    /// held in memory; a reader error aborts the run.
    pub fn run<I>(&self, batches: I, append: bool, progress: &ProgressReporter) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Result<SourceBatch>>,
    {
        let mut summary = RunSummary::new(self.registry.len());

        for (index, batch) in batches.into_iter().enumerate() {
            let batch = batch?;
            let mode = PassMode::for_pass(index, append);
            self.run_pass(index, mode, &batch, &mut summary, progress)?;
        }

        Ok(summary)
    }

    pub fn run_pass(
        &self,
        pass: usize,
        mode: PassMode,
        batch: &SourceBatch,
        summary: &mut RunSummary,
        progress: &ProgressReporter,
    ) -> Result<()> {
        summary.passes += 1;
        summary.records_read += batch.len() + batch.dropped;
        summary.records_dropped += batch.dropped;

        let in_window: Vec<&Measurement> = batch
            .measurements
            .iter()
            .filter(|m| self.window.contains(m.date))
            .collect();
        summary.records_outside_window += batch.len() - in_window.len();

        let joined = RecordJoiner::new(self.registry, self.strategy).join(in_window);
        summary.join_misses += joined.misses;
        summary.records_aggregated += joined.joined.len();

        let mut aggregates = self.aggregator.aggregate_by_cell(&joined.joined);
        debug!("Pass {}: {} cells with data", pass, aggregates.len());

        match mode {
            PassMode::Write => {
                progress.begin_pass(pass, "write", self.registry.len() as u64);
                for id in self.registry.ids() {
                    let report = aggregates
                        .remove(&id)
                        .map(|aggregate| aggregate.into_report(&self.shape))
                        .unwrap_or_else(CellReport::new);

                    match self.store.write(id, &report) {
                        Ok(()) => summary.cells_written += 1,
                        Err(e) if e.is_per_cell() => summary.skip(id, pass, e.to_string()),
                        Err(e) => return Err(e),
                    }
                    progress.cell_done();
                }
            }
            PassMode::Merge => {
                progress.begin_pass(pass, "merge", aggregates.len() as u64);
                for (id, aggregate) in aggregates {
                    let update = aggregate.into_report(&self.shape);
                    match self.store.merge_counted(id, &update) {
                        Ok((_, outcome)) => {
                            summary.cells_merged += 1;
                            summary.periods_added += outcome.added_years + outcome.added_months;
                        }
                        Err(e) if e.is_per_cell() => {
                            warn!("Skipping cell {} in pass {}: {}", id, pass, e);
                            summary.skip(id, pass, e.to_string());
                        }
                        Err(e) => return Err(e),
                    }
                    progress.cell_done();
                }
            }
        }

        info!(
            "Pass {} done: {} records in, {} joined, {} misses",
            pass,
            batch.len(),
            joined.joined.len(),
            joined.misses
        );
        Ok(())
    }
}
