use crate::error::{ProcessingError, Result};
use crate::models::{Cell, CellReport, PeriodValue};
use crate::processors::CellRegistry;
use crate::utils::constants::{ANNUAL_PREFIX, MONTHLY_PREFIX};
use crate::writers::CellStore;

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodTotal {
    pub period: String,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportStatistics {
    pub year_count: usize,
    pub latest: Option<PeriodTotal>,
    pub driest: Option<PeriodTotal>,
    pub wettest: Option<PeriodTotal>,
    pub mean_annual: Option<f64>,
}

impl ReportStatistics {
    pub fn summary(&self) -> String {
        let describe = |total: &Option<PeriodTotal>| match total {
            Some(t) => format!("{} ({:.1} mm)", t.period, t.total),
            None => "No data".to_string(),
        };

        format!(
            "Years on record: {}\n\
            - Latest: {}\n\
            - Driest: {}\n\
            - Wettest: {}\n\
            - Mean annual: {}",
            self.year_count,
            describe(&self.latest),
            describe(&self.driest),
            describe(&self.wettest),
            self.mean_annual
                .map(|mean| format!("{:.1} mm", mean))
                .unwrap_or_else(|| "No data".to_string())
        )
    }
}

/// What `info` reports for the cell nearest to a location
#[derive(Debug, Clone)]
pub struct CellInsight {
    pub cell: Cell,
    pub distance_km: f64,
    pub statistics: ReportStatistics,
    pub year: Option<String>,
    pub monthly: Vec<PeriodTotal>,
}

impl CellInsight {
    pub fn detailed_summary(&self) -> String {
        let mut summary = format!(
            "Cell {} at {:.4}, {:.4} ({:.1} km away)\n{}",
            self.cell.id,
            self.cell.lon,
            self.cell.lat,
            self.distance_km,
            self.statistics.summary()
        );

        if let Some(year) = &self.year {
            summary.push_str(&format!("\n\nMonthly totals for {}:", year));
            if self.monthly.is_empty() {
                summary.push_str("\n- No data");
            }
            for month in &self.monthly {
                summary.push_str(&format!("\n- {}: {:.1} mm", month.period, month.total));
            }
        }

        summary
    }
}

/// Reads stored reports back for one variable
pub struct ReportAnalyzer {
    variable: Option<String>,
}

impl ReportAnalyzer {
    pub fn new() -> Self {
        Self { variable: None }
    }

    /// Analyze one variable of multi-variable reports
    pub fn for_variable(variable: impl Into<String>) -> Self {
        Self {
            variable: Some(variable.into()),
        }
    }

    /// Annual totals in calendar order
    pub fn year_totals(&self, report: &CellReport) -> Vec<PeriodTotal> {
        report
            .years
            .iter()
            .filter_map(|(year, value)| {
                self.resolve(value, ANNUAL_PREFIX).map(|total| PeriodTotal {
                    period: year.clone(),
                    total,
                })
            })
            .collect()
    }

    /// Months of `year` in calendar order
    pub fn monthly_series(&self, report: &CellReport, year: &str) -> Vec<PeriodTotal> {
        report
            .months_of_year(year)
            .filter_map(|(month, value)| {
                self.resolve(value, MONTHLY_PREFIX).map(|total| PeriodTotal {
                    period: month.clone(),
                    total,
                })
            })
            .collect()
    }

    /// Latest, driest and wettest years; ties go to the earliest year
    pub fn analyze(&self, report: &CellReport) -> ReportStatistics {
        let totals = self.year_totals(report);
        let mut statistics = ReportStatistics {
            year_count: totals.len(),
            latest: totals.last().cloned(),
            ..ReportStatistics::default()
        };

        for total in &totals {
            if statistics.driest.as_ref().map_or(true, |d| total.total < d.total) {
                statistics.driest = Some(total.clone());
            }
            if statistics.wettest.as_ref().map_or(true, |w| total.total > w.total) {
                statistics.wettest = Some(total.clone());
            }
        }

        if !totals.is_empty() {
            statistics.mean_annual =
                Some(totals.iter().map(|t| t.total).sum::<f64>() / totals.len() as f64);
        }

        statistics
    }

    /// Locate the cell nearest to `lon`/`lat` and summarize its report.
    /// Without `year`, the monthly series is given for the latest year.
    pub fn analyze_nearest<S: CellStore>(
        &self,
        registry: &CellRegistry,
        store: &S,
        lon: f64,
        lat: f64,
        year: Option<&str>,
    ) -> Result<CellInsight> {
        let (cell, distance_km) = registry.nearest_by_distance(lon, lat).ok_or_else(|| {
            ProcessingError::MissingData("Registry holds no cells".to_string())
        })?;

        let report = store.read(cell.id)?;
        let statistics = self.analyze(&report);
        let year = year
            .map(String::from)
            .or_else(|| statistics.latest.as_ref().map(|t| t.period.clone()));
        let monthly = year
            .as_deref()
            .map(|year| self.monthly_series(&report, year))
            .unwrap_or_default();

        Ok(CellInsight {
            cell: cell.clone(),
            distance_km,
            statistics,
            year,
            monthly,
        })
    }

    fn resolve(&self, value: &PeriodValue, prefix: &str) -> Option<f64> {
        let variable = self.variable.as_deref();
        value.value(variable).or_else(|| {
            variable.and_then(|variable| value.value(Some(&format!("{}{}", prefix, variable))))
        })
    }
}

impl Default for ReportAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
