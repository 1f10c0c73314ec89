//! Terminal progress for registry builds and report passes.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const CELL_TEMPLATE: &str =
    "{msg}\n{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cells ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";
const TICK: Duration = Duration::from_millis(100);

pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Bar counting cells; `silent` yields a hidden bar
    pub fn new(cells: u64, message: &str, silent: bool) -> Self {
        if silent {
            return Self::silent();
        }

        let style = ProgressStyle::default_bar()
            .template(CELL_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        Self::ticking(ProgressBar::new(cells).with_style(style), message)
    }

    pub fn new_spinner(message: &str, silent: bool) -> Self {
        if silent {
            return Self::silent();
        }

        let style = ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        Self::ticking(ProgressBar::new_spinner().with_style(style), message)
    }

    /// Reporter that draws nothing; used by tests and library callers
    pub fn silent() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    fn ticking(bar: ProgressBar, message: &str) -> Self {
        bar.set_message(message.to_string());
        bar.enable_steady_tick(TICK);
        Self { bar }
    }

    /// Reset the bar for a new pass over `cells` cells
    pub fn begin_pass(&self, pass: usize, label: &str, cells: u64) {
        self.bar.set_message(format!("Pass {} ({})", pass + 1, label));
        self.bar.set_length(cells);
        self.bar.set_position(0);
    }

    pub fn cell_done(&self) {
        self.bar.inc(1);
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    pub fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish();
        }
    }
}
