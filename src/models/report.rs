use crate::error::{ProcessingError, Result};
use crate::utils::constants::{ANNUAL_PREFIX, MONTHLY_PREFIX};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Year period key, e.g. `"2024"`
pub fn year_key(date: NaiveDate) -> String {
    date.format("%Y").to_string()
}

/// Month period key, e.g. `"2024-03"`
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Value stored for one period: a bare number when a single variable is
/// summarized, a map of labels to numbers otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeriodValue {
    Scalar(f64),
    ByVariable(BTreeMap<String, f64>),
}

impl PeriodValue {
    /// Numeric value for `label`; scalars ignore the label, maps with a
    /// single entry answer without one.
    pub fn value(&self, label: Option<&str>) -> Option<f64> {
        match (self, label) {
            (PeriodValue::Scalar(value), _) => Some(*value),
            (PeriodValue::ByVariable(values), Some(label)) => values.get(label).copied(),
            (PeriodValue::ByVariable(values), None) if values.len() == 1 => {
                values.values().next().copied()
            }
            (PeriodValue::ByVariable(_), None) => None,
        }
    }
}

/// How aggregated sums are laid out in a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportShape {
    Scalar { variable: String },
    ByVariable { variables: Vec<String>, prefixed: bool },
}

impl ReportShape {
    /// Resolve the shape from the summarized variables: one variable gives
    /// bare numbers, several give per-variable maps.
    pub fn for_variables(variables: &[String], prefixed: bool) -> Result<Self> {
        match variables {
            [] => Err(ProcessingError::Config(
                "At least one variable must be summarized".to_string(),
            )),
            [variable] => Ok(ReportShape::Scalar {
                variable: variable.clone(),
            }),
            _ => Ok(ReportShape::ByVariable {
                variables: variables.to_vec(),
                prefixed,
            }),
        }
    }

    pub fn year_label(&self, variable: &str) -> String {
        self.label(ANNUAL_PREFIX, variable)
    }

    pub fn month_label(&self, variable: &str) -> String {
        self.label(MONTHLY_PREFIX, variable)
    }

    fn label(&self, prefix: &str, variable: &str) -> String {
        match self {
            ReportShape::ByVariable { prefixed: true, .. } => format!("{}{}", prefix, variable),
            _ => variable.to_string(),
        }
    }
}

/// Persisted summary of one cell
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellReport {
    #[serde(default)]
    pub years: BTreeMap<String, PeriodValue>,
    #[serde(default)]
    pub months: BTreeMap<String, PeriodValue>,
}

/// Period keys added by a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added_years: usize,
    pub added_months: usize,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.added_years > 0 || self.added_months > 0
    }
}

impl CellReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty() && self.months.is_empty()
    }

    /// Insert the periods of `update` that this report does not hold yet.
    /// Existing periods are never touched.
    pub fn merge_missing(&mut self, update: &CellReport) -> MergeOutcome {
        MergeOutcome {
            added_years: insert_missing(&mut self.years, &update.years),
            added_months: insert_missing(&mut self.months, &update.months),
        }
    }

    /// Months of `year` in calendar order
    pub fn months_of_year<'a>(
        &'a self,
        year: &str,
    ) -> impl Iterator<Item = (&'a String, &'a PeriodValue)> + 'a {
        let prefix = format!("{}-", year);
        self.months
            .iter()
            .filter(move |(key, _)| key.starts_with(&prefix))
    }
}

fn insert_missing(
    target: &mut BTreeMap<String, PeriodValue>,
    update: &BTreeMap<String, PeriodValue>,
) -> usize {
    let mut added = 0;
    for (key, value) in update {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report(years: &[(&str, f64)], months: &[(&str, f64)]) -> CellReport {
        CellReport {
            years: years
                .iter()
                .map(|(k, v)| (k.to_string(), PeriodValue::Scalar(*v)))
                .collect(),
            months: months
                .iter()
                .map(|(k, v)| (k.to_string(), PeriodValue::Scalar(*v)))
                .collect(),
        }
    }

    #[test]
    fn test_period_keys() {
        let date = NaiveDate::from_ymd_opt(2020, 2, 9).unwrap();
        assert_eq!(year_key(date), "2020");
        assert_eq!(month_key(date), "2020-02");

        let early = NaiveDate::from_ymd_opt(987, 11, 1).unwrap();
        assert_eq!(year_key(early), "0987");
        assert_eq!(month_key(early), "0987-11");
    }

    #[test]
    fn test_period_value_shapes_round_trip_through_json() {
        let json = r#"{"years":{"2020":10.0},"months":{"2020-01":{"PE_Q":-1.5,"PRELIQ_Q":8.0}}}"#;
        let parsed: CellReport = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.years["2020"], PeriodValue::Scalar(10.0));
        match &parsed.months["2020-01"] {
            PeriodValue::ByVariable(values) => assert_eq!(values["PRELIQ_Q"], 8.0),
            other => panic!("expected variable map, got {:?}", other),
        }
        assert_eq!(serde_json::to_string(&parsed).unwrap(), json);
    }

    #[test]
    fn test_period_value_lookup() {
        assert_eq!(PeriodValue::Scalar(4.0).value(Some("ignored")), Some(4.0));

        let mut values = BTreeMap::new();
        values.insert("annual_PE_Q".to_string(), 2.0);
        let single = PeriodValue::ByVariable(values.clone());
        assert_eq!(single.value(None), Some(2.0));

        values.insert("annual_PRELIQ_Q".to_string(), 7.0);
        let several = PeriodValue::ByVariable(values);
        assert_eq!(several.value(None), None);
        assert_eq!(several.value(Some("annual_PRELIQ_Q")), Some(7.0));
    }

    #[test]
    fn test_report_shape_resolution() {
        let one = vec!["PRELIQ_Q".to_string()];
        assert_eq!(
            ReportShape::for_variables(&one, true).unwrap(),
            ReportShape::Scalar {
                variable: "PRELIQ_Q".to_string()
            }
        );

        let two = vec!["PRELIQ_Q".to_string(), "PE_Q".to_string()];
        let shape = ReportShape::for_variables(&two, true).unwrap();
        assert_eq!(shape.year_label("PE_Q"), "annual_PE_Q");
        assert_eq!(shape.month_label("PE_Q"), "monthly_PE_Q");

        let plain = ReportShape::for_variables(&two, false).unwrap();
        assert_eq!(plain.month_label("PE_Q"), "PE_Q");

        assert!(ReportShape::for_variables(&[], false).is_err());
    }

    #[test]
    fn test_merge_disjoint_is_union() {
        let mut existing = report(&[("2020", 10.0)], &[("2020-01", 8.0), ("2020-02", 2.0)]);
        let update = report(&[("2021", 5.0)], &[("2021-01", 5.0)]);

        let outcome = existing.merge_missing(&update);

        assert_eq!(outcome.added_years, 1);
        assert_eq!(outcome.added_months, 1);
        assert_eq!(
            existing,
            report(
                &[("2020", 10.0), ("2021", 5.0)],
                &[("2020-01", 8.0), ("2020-02", 2.0), ("2021-01", 5.0)]
            )
        );
    }

    #[test]
    fn test_merge_keeps_first_written_value() {
        let mut existing = report(&[("2020", 10.0)], &[("2020-12", 3.0)]);
        let original = existing.clone();
        let overlapping = report(&[("2020", 99.0)], &[("2020-12", 42.0)]);

        let outcome = existing.merge_missing(&overlapping);

        assert!(!outcome.changed());
        assert_eq!(existing, original);
    }

    #[test]
    fn test_months_of_year_in_order() {
        let r = report(
            &[],
            &[("2021-01", 1.0), ("2020-12", 3.0), ("2020-02", 2.0), ("2020-01", 1.0)],
        );
        let keys: Vec<&String> = r.months_of_year("2020").map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["2020-01", "2020-02", "2020-12"]);
    }
}
