//! Per-cell annual and monthly sums.

use crate::config::PipelineConfig;
use crate::models::{month_key, year_key, CellId, CellReport, Measurement, PeriodValue, ReportShape};
use crate::processors::joiner::TaggedMeasurement;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

type PeriodSums = BTreeMap<String, BTreeMap<String, f64>>;

/// Running sums for one cell, keyed by period then variable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellAggregate {
    pub years: PeriodSums,
    pub months: PeriodSums,
    pub measurement_count: usize,
}

impl CellAggregate {
    fn add(&mut self, date: NaiveDate, variable: &str, value: f64) {
        *self
            .years
            .entry(year_key(date))
            .or_default()
            .entry(variable.to_string())
            .or_insert(0.0) += value;
        *self
            .months
            .entry(month_key(date))
            .or_default()
            .entry(variable.to_string())
            .or_insert(0.0) += value;
    }

    pub fn year_sum(&self, year: &str, variable: &str) -> Option<f64> {
        self.years.get(year)?.get(variable).copied()
    }

    pub fn month_sum(&self, month: &str, variable: &str) -> Option<f64> {
        self.months.get(month)?.get(variable).copied()
    }

    /// Lay the sums out as a report. A period where a variable never had a
    /// value omits that variable; in scalar shape it reads as zero.
    pub fn into_report(self, shape: &ReportShape) -> CellReport {
        CellReport {
            years: shape_periods(self.years, shape, ReportShape::year_label),
            months: shape_periods(self.months, shape, ReportShape::month_label),
        }
    }
}

fn shape_periods(
    sums: PeriodSums,
    shape: &ReportShape,
    label: fn(&ReportShape, &str) -> String,
) -> BTreeMap<String, PeriodValue> {
    sums.into_iter()
        .map(|(period, by_variable)| {
            let value = match shape {
                ReportShape::Scalar { variable } => {
                    PeriodValue::Scalar(by_variable.get(variable).copied().unwrap_or(0.0))
                }
                ReportShape::ByVariable { variables, .. } => PeriodValue::ByVariable(
                    variables
                        .iter()
                        .filter_map(|variable| {
                            by_variable
                                .get(variable)
                                .map(|sum| (label(shape, variable), *sum))
                        })
                        .collect(),
                ),
            };
            (period, value)
        })
        .collect()
}

pub struct TemporalAggregator {
    variables: Vec<String>,
    clip_negative: HashSet<String>,
}

impl TemporalAggregator {
    pub fn new(variables: Vec<String>) -> Self {
        Self {
            variables,
            clip_negative: HashSet::new(),
        }
    }

    /// Replace negative values of these variables by zero before summing
    pub fn with_clip_negative<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clip_negative = variables.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.variables.clone()).with_clip_negative(config.clip_negative.iter().cloned())
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    fn prepare(&self, variable: &str, value: f64) -> f64 {
        if value < 0.0 && self.clip_negative.contains(variable) {
            0.0
        } else {
            value
        }
    }

    /// Fold measurements of a single cell
    pub fn aggregate<'a, I>(&self, measurements: I) -> CellAggregate
    where
        I: IntoIterator<Item = &'a Measurement>,
    {
        let mut aggregate = CellAggregate::default();
        for measurement in measurements {
            self.accumulate(&mut aggregate, measurement);
        }
        aggregate
    }

    /// Group tagged measurements by cell and fold each group
    pub fn aggregate_by_cell(&self, joined: &[TaggedMeasurement<'_>]) -> BTreeMap<CellId, CellAggregate> {
        let mut by_cell: BTreeMap<CellId, CellAggregate> = BTreeMap::new();
        for tagged in joined {
            self.accumulate(by_cell.entry(tagged.cell_id).or_default(), tagged.measurement);
        }
        by_cell
    }

    fn accumulate(&self, aggregate: &mut CellAggregate, measurement: &Measurement) {
        aggregate.measurement_count += 1;
        for variable in &self.variables {
            if let Some(value) = measurement.value(variable) {
                aggregate.add(measurement.date, variable, self.prepare(variable, value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rain(date: NaiveDate, value: f64) -> Measurement {
        Measurement::new(2.0, 48.0, date).with_value("PRELIQ_Q", value)
    }

    fn scalar_shape() -> ReportShape {
        ReportShape::for_variables(&["PRELIQ_Q".to_string()], false).unwrap()
    }

    #[test]
    fn test_annual_and_monthly_sums() {
        let aggregator = TemporalAggregator::new(vec!["PRELIQ_Q".to_string()]);
        let data = vec![
            rain(day(2020, 1, 15), 5.0),
            rain(day(2020, 2, 10), 3.0),
            rain(day(2021, 1, 1), 1.0),
        ];

        let report = aggregator.aggregate(&data).into_report(&scalar_shape());

        assert_eq!(report.years["2020"], PeriodValue::Scalar(8.0));
        assert_eq!(report.years["2021"], PeriodValue::Scalar(1.0));
        assert_eq!(report.months["2020-01"], PeriodValue::Scalar(5.0));
        assert_eq!(report.months["2020-02"], PeriodValue::Scalar(3.0));
        assert_eq!(report.months["2021-01"], PeriodValue::Scalar(1.0));
        assert_eq!(report.months.len(), 3);
    }

    #[test]
    fn test_annual_equals_sum_of_months() {
        let aggregator = TemporalAggregator::new(vec!["PRELIQ_Q".to_string()]);
        let data: Vec<Measurement> = (1..=12)
            .flat_map(|m| (1..=3).map(move |d| rain(day(2019, m, d), m as f64 * 0.5 + d as f64)))
            .collect();

        let aggregate = aggregator.aggregate(&data);
        let months_total: f64 = (1..=12)
            .filter_map(|m| aggregate.month_sum(&format!("2019-{:02}", m), "PRELIQ_Q"))
            .sum();
        let year_total = aggregate.year_sum("2019", "PRELIQ_Q").unwrap();
        assert!((year_total - months_total).abs() < 1e-9);
    }

    #[test]
    fn test_negative_values_clipped_before_summation() {
        let aggregator = TemporalAggregator::new(vec!["PE_Q".to_string(), "PRELIQ_Q".to_string()])
            .with_clip_negative(["PE_Q"]);
        let data = vec![
            Measurement::new(2.0, 48.0, day(2020, 3, 1))
                .with_value("PE_Q", 4.0)
                .with_value("PRELIQ_Q", -1.0),
            Measurement::new(2.0, 48.0, day(2020, 3, 2))
                .with_value("PE_Q", -2.5)
                .with_value("PRELIQ_Q", 2.0),
        ];

        let aggregate = aggregator.aggregate(&data);
        assert_eq!(aggregate.year_sum("2020", "PE_Q"), Some(4.0));
        // Not in the clip set: negatives count
        assert_eq!(aggregate.year_sum("2020", "PRELIQ_Q"), Some(1.0));
    }

    #[test]
    fn test_by_variable_shape_with_prefixed_labels() {
        let variables = vec!["PE_Q".to_string(), "PRELIQ_Q".to_string()];
        let aggregator = TemporalAggregator::new(variables.clone());
        let data = vec![Measurement::new(2.0, 48.0, day(2022, 6, 1))
            .with_value("PE_Q", 1.5)
            .with_value("PRELIQ_Q", 2.5)];

        let shape = ReportShape::for_variables(&variables, true).unwrap();
        let report = aggregator.aggregate(&data).into_report(&shape);

        let expected_year: BTreeMap<String, f64> = [
            ("annual_PE_Q".to_string(), 1.5),
            ("annual_PRELIQ_Q".to_string(), 2.5),
        ]
        .into_iter()
        .collect();
        assert_eq!(report.years["2022"], PeriodValue::ByVariable(expected_year));
        assert_eq!(report.months["2022-06"].value(Some("monthly_PE_Q")), Some(1.5));
    }

    #[test]
    fn test_aggregate_by_cell_groups_and_orders() {
        let aggregator = TemporalAggregator::new(vec!["PRELIQ_Q".to_string()]);
        let data = vec![rain(day(2020, 1, 1), 1.0), rain(day(2020, 1, 2), 2.0), rain(day(2020, 1, 3), 4.0)];
        let a = CellId::new(1).unwrap();
        let b = CellId::new(2).unwrap();
        let joined = vec![
            TaggedMeasurement { cell_id: b, measurement: &data[0] },
            TaggedMeasurement { cell_id: a, measurement: &data[1] },
            TaggedMeasurement { cell_id: b, measurement: &data[2] },
        ];

        let by_cell = aggregator.aggregate_by_cell(&joined);
        assert_eq!(by_cell.keys().copied().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(by_cell[&b].year_sum("2020", "PRELIQ_Q"), Some(5.0));
        assert_eq!(by_cell[&b].measurement_count, 2);
        assert_eq!(by_cell[&a].year_sum("2020", "PRELIQ_Q"), Some(2.0));
    }

    #[test]
    fn test_missing_values_are_not_zero_filled() {
        let aggregator = TemporalAggregator::new(vec!["PE_Q".to_string(), "PRELIQ_Q".to_string()]);
        let data = vec![Measurement::new(2.0, 48.0, day(2020, 5, 1)).with_value("PRELIQ_Q", 3.0)];

        let aggregate = aggregator.aggregate(&data);
        assert_eq!(aggregate.year_sum("2020", "PE_Q"), None);
        assert_eq!(aggregate.year_sum("2020", "PRELIQ_Q"), Some(3.0));
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let aggregator = TemporalAggregator::new(vec!["PRELIQ_Q".to_string()]);
        let mut data = vec![
            rain(day(2020, 1, 1), 0.25),
            rain(day(2020, 7, 9), 0.5),
            rain(day(2021, 2, 3), 0.125),
        ];
        let forward = aggregator.aggregate(&data).into_report(&scalar_shape());
        data.reverse();
        let backward = aggregator.aggregate(&data).into_report(&scalar_shape());
        assert_eq!(forward, backward);
    }
}
