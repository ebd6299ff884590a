use crate::domain::round2;
use chrono::NaiveDate;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostPoint {
    pub date: NaiveDate,
    #[serde(rename = "cost")]
    pub amount: f64,
}

impl CostPoint {
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self { date, amount }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contributor {
    pub name: String,
    pub amount: f64,
}

/// Contributor amounts kept sorted by amount, highest first. Serializes as a JSON object
/// whose key order follows that ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContributorBreakdown(Vec<Contributor>);

impl ContributorBreakdown {
    pub fn from_totals(totals: BTreeMap<String, f64>) -> Self {
        let mut items: Vec<Contributor> = totals
            .into_iter()
            .map(|(name, amount)| Contributor { name, amount })
            .collect();
        // Stable sort keeps name order for equal amounts.
        items.sort_by(|a, b| b.amount.total_cmp(&a.amount));
        Self(items)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contributor> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn top(&self) -> Option<&Contributor> {
        self.0.first()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|c| c.name == name).map(|c| c.amount)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|c| c.name == name)
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().map(|c| c.amount).sum()
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.0
            .iter()
            .map(|c| (c.name.clone(), c.amount))
            .collect()
    }
}

impl Serialize for ContributorBreakdown {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|c| (&c.name, c.amount)))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostSeries {
    pub points: Vec<CostPoint>,
    pub contributors: ContributorBreakdown,
    pub total: f64,
}

impl CostSeries {
    pub fn new(points: Vec<CostPoint>, contributors: ContributorBreakdown) -> Self {
        let total = points.iter().map(|p| p.amount).sum();
        Self {
            points,
            contributors,
            total,
        }
    }

    pub fn from_amounts(start: NaiveDate, amounts: &[f64]) -> Self {
        let points = start
            .iter_days()
            .zip(amounts.iter().copied())
            .map(|(date, amount)| CostPoint::new(date, amount))
            .collect();
        Self::new(points, ContributorBreakdown::default())
    }

    pub fn amounts(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.amount).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// Per-account payload shape consumed by the dashboard front end.
impl Serialize for CostSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let top_service = self
            .contributors
            .top()
            .map(|c| c.name.as_str())
            .unwrap_or("N/A");

        let mut s = serializer.serialize_struct("CostSeries", 5)?;
        s.serialize_field("total_cost", &round2(self.total))?;
        s.serialize_field("by_service", &self.contributors)?;
        s.serialize_field("daily_costs", &self.points)?;
        s.serialize_field("top_service", top_service)?;
        s.serialize_field("service_count", &self.contributors.len())?;
        s.end()
    }
}

/// Outcome of fetching one billing source. A failed source keeps its slot so it can be
/// reported, but contributes nothing to aggregates.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceResult {
    Available(CostSeries),
    Unavailable { error: String },
}

impl SourceResult {
    pub fn series(&self) -> Option<&CostSeries> {
        match self {
            SourceResult::Available(series) => Some(series),
            SourceResult::Unavailable { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SourceResult::Available(_) => None,
            SourceResult::Unavailable { error } => Some(error),
        }
    }
}

impl Serialize for SourceResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SourceResult::Available(series) => series.serialize(serializer),
            SourceResult::Unavailable { error } => {
                let mut s = serializer.serialize_struct("SourceError", 2)?;
                s.serialize_field("error", error)?;
                s.serialize_field("total_cost", &0.0)?;
                s.end()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedSource {
    pub name: String,
    pub result: SourceResult,
}

impl NamedSource {
    pub fn available(name: impl Into<String>, series: CostSeries) -> Self {
        Self {
            name: name.into(),
            result: SourceResult::Available(series),
        }
    }

    pub fn unavailable(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: SourceResult::Unavailable {
                error: error.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn total_matches_sum_of_points() {
        let series = CostSeries::from_amounts(date(1), &[1.25, 2.5, 3.75, 0.0, 10.1]);
        let sum: f64 = series.amounts().iter().sum();
        assert!((series.total - sum).abs() < 1e-6);
        assert_eq!(series.points[4].date, date(5));
    }

    #[test]
    fn breakdown_orders_by_amount_descending() {
        let mut totals = BTreeMap::new();
        totals.insert("Amazon S3".to_string(), 10.0);
        totals.insert("Amazon EC2".to_string(), 50.0);
        totals.insert("AWS Lambda".to_string(), 25.0);
        let breakdown = ContributorBreakdown::from_totals(totals);

        let names: Vec<_> = breakdown.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Amazon EC2", "AWS Lambda", "Amazon S3"]);

        let encoded = serde_json::to_string(&breakdown).unwrap();
        assert_eq!(
            encoded,
            r#"{"Amazon EC2":50.0,"AWS Lambda":25.0,"Amazon S3":10.0}"#
        );
    }

    #[test]
    fn series_serializes_as_account_payload() {
        let mut totals = BTreeMap::new();
        totals.insert("Amazon EC2".to_string(), 3.0);
        let series = CostSeries::new(
            vec![CostPoint::new(date(1), 1.0), CostPoint::new(date(2), 2.0)],
            ContributorBreakdown::from_totals(totals),
        );

        let v = serde_json::to_value(&series).unwrap();
        assert_eq!(
            v,
            json!({
                "total_cost": 3.0,
                "by_service": {"Amazon EC2": 3.0},
                "daily_costs": [
                    {"date": "2026-03-01", "cost": 1.0},
                    {"date": "2026-03-02", "cost": 2.0}
                ],
                "top_service": "Amazon EC2",
                "service_count": 1
            })
        );
    }

    #[test]
    fn unavailable_source_serializes_error_marker() {
        let source = SourceResult::Unavailable {
            error: "access denied".to_string(),
        };
        let v = serde_json::to_value(&source).unwrap();
        assert_eq!(v, json!({"error": "access denied", "total_cost": 0.0}));
        assert!(source.series().is_none());
    }
}
