use crate::domain::cost::{ContributorBreakdown, CostSeries, NamedSource};
use crate::domain::{round1, round2};
use crate::time::AnalysisWindow;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

const IMBALANCE_RATIO: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedCosts {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub period_days: i64,
    #[serde(rename = "accounts", serialize_with = "serialize_sources")]
    pub sources: Vec<NamedSource>,
    #[serde(rename = "total_all_accounts", serialize_with = "serialize_cents")]
    pub grand_total: f64,
    #[serde(rename = "services")]
    pub contributors: ContributorBreakdown,
}

impl CombinedCosts {
    pub fn representative(&self) -> Option<&NamedSource> {
        self.sources.first()
    }

    pub fn available(&self) -> impl Iterator<Item = (&str, &CostSeries)> {
        self.sources
            .iter()
            .filter_map(|s| s.result.series().map(|series| (s.name.as_str(), series)))
    }
}

pub(crate) fn serialize_sources<S: Serializer>(sources: &[NamedSource], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(sources.iter().map(|s| (&s.name, &s.result)))
}

pub(crate) fn serialize_cents<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round2(*value))
}

pub fn combine(window: &AnalysisWindow, sources: Vec<NamedSource>) -> CombinedCosts {
    let mut grand_total = 0.0;
    let mut merged: BTreeMap<String, f64> = BTreeMap::new();

    for source in &sources {
        let Some(series) = source.result.series() else {
            tracing::warn!(
                source = %source.name,
                error = source.result.error().unwrap_or_default(),
                "billing source unavailable; excluded from totals"
            );
            continue;
        };
        grand_total += series.total;
        for contributor in series.contributors.iter() {
            let entry = merged.entry(contributor.name.clone()).or_insert(0.0);
            *entry = round2(*entry + contributor.amount);
        }
    }

    CombinedCosts {
        start_date: window.start,
        end_date: window.end,
        period_days: window.days(),
        sources,
        grand_total,
        contributors: ContributorBreakdown::from_totals(merged),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Up,
    Down,
}

impl ChangeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeDirection::Up => "up",
            ChangeDirection::Down => "down",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub previous_period_cost: f64,
    pub change_percent: f64,
    pub change_direction: ChangeDirection,
}

/// Change against the preceding window of the same length. Omitted unless both totals are
/// positive.
pub fn compare_periods(current_total: f64, previous_total: f64) -> Option<PeriodComparison> {
    if current_total <= 0.0 || previous_total <= 0.0 {
        return None;
    }
    let change = (current_total - previous_total) / previous_total * 100.0;
    Some(PeriodComparison {
        previous_period_cost: round2(previous_total),
        change_percent: round2(change),
        change_direction: if change > 0.0 {
            ChangeDirection::Up
        } else {
            ChangeDirection::Down
        },
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceShare {
    #[serde(rename = "account")]
    pub name: String,
    #[serde(rename = "total_cost", serialize_with = "serialize_cents")]
    pub total: f64,
    pub percentage: f64,
    pub service_count: usize,
    pub top_service: String,
    #[serde(flatten)]
    pub previous: Option<PeriodComparison>,
}

/// One entry per available source, in configured order. `previous` holds the same sources
/// fetched over the preceding window; a source missing or failed there gets no comparison.
pub fn source_shares(combined: &CombinedCosts, previous: &[NamedSource]) -> Vec<SourceShare> {
    combined
        .available()
        .map(|(name, series)| {
            let percentage = if combined.grand_total > 0.0 {
                round1(series.total / combined.grand_total * 100.0)
            } else {
                0.0
            };
            let prior = previous
                .iter()
                .find(|p| p.name == name)
                .and_then(|p| p.result.series())
                .and_then(|prior| compare_periods(series.total, prior.total));

            SourceShare {
                name: name.to_string(),
                total: series.total,
                percentage,
                service_count: series.contributors.len(),
                top_service: series
                    .contributors
                    .top()
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "N/A".to_string()),
                previous: prior,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossSourceInsight {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub accounts_affected: Vec<String>,
}

pub fn cross_source_insights(combined: &CombinedCosts) -> Vec<CrossSourceInsight> {
    let mut insights = Vec::new();
    let available: Vec<_> = combined.available().collect();

    let mut positive: Vec<(&str, f64)> = available
        .iter()
        .map(|(name, series)| (*name, series.total))
        .filter(|(_, total)| *total > 0.0)
        .collect();
    positive.sort_by(|a, b| b.1.total_cmp(&a.1));

    if let (Some(highest), Some(lowest)) = (positive.first(), positive.last()) {
        if positive.len() >= 2 {
            let ratio = highest.1 / lowest.1;
            if ratio > IMBALANCE_RATIO {
                insights.push(CrossSourceInsight {
                    kind: "cost_imbalance".to_string(),
                    severity: "medium".to_string(),
                    title: format!("{} costs {ratio:.1}x more than {}", highest.0, lowest.0),
                    description: "Investigate if workload distribution is appropriate".to_string(),
                    service: None,
                    accounts_affected: vec![highest.0.to_string(), lowest.0.to_string()],
                });
            }
        }
    }

    if available.len() >= 2 {
        let names: Vec<String> = available.iter().map(|(name, _)| name.to_string()).collect();
        for contributor in combined.contributors.iter() {
            let everywhere = available
                .iter()
                .all(|(_, series)| series.contributors.contains(&contributor.name));
            if everywhere {
                insights.push(CrossSourceInsight {
                    kind: "shared_service_opportunity".to_string(),
                    severity: "low".to_string(),
                    title: format!("{} used in all accounts", contributor.name),
                    description: "Consider shared/centralized resources to reduce duplicate costs"
                        .to_string(),
                    service: Some(contributor.name.clone()),
                    accounts_affected: names.clone(),
                });
            }
        }
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cost::CostPoint;
    use serde_json::json;

    fn window() -> AnalysisWindow {
        AnalysisWindow::ending_on(NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(), 7).unwrap()
    }

    fn series(total: f64, contributors: &[(&str, f64)]) -> CostSeries {
        let totals = contributors
            .iter()
            .map(|(name, amount)| (name.to_string(), *amount))
            .collect();
        CostSeries::new(
            vec![CostPoint::new(window().start, total)],
            ContributorBreakdown::from_totals(totals),
        )
    }

    #[test]
    fn combine_skips_failed_sources() {
        let combined = combine(
            &window(),
            vec![
                NamedSource::available("prod", series(300.0, &[("Amazon EC2", 200.0), ("Amazon S3", 100.0)])),
                NamedSource::unavailable("legacy", "access denied"),
                NamedSource::available("dev", series(90.0, &[("Amazon EC2", 60.0), ("AWS Lambda", 30.0)])),
            ],
        );

        assert_eq!(combined.grand_total, 390.0);
        assert_eq!(combined.period_days, 7);
        assert_eq!(combined.sources.len(), 3);
        assert_eq!(combined.sources[1].result.error(), Some("access denied"));
        assert_eq!(combined.representative().map(|s| s.name.as_str()), Some("prod"));

        let names: Vec<_> = combined.contributors.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Amazon EC2", "Amazon S3", "AWS Lambda"]);
        assert_eq!(combined.contributors.get("Amazon EC2"), Some(260.0));

        let v = serde_json::to_value(&combined).unwrap();
        assert_eq!(v["accounts"]["legacy"], json!({"error": "access denied", "total_cost": 0.0}));
        assert_eq!(v["total_all_accounts"], json!(390.0));
        assert_eq!(v["start_date"], json!("2026-03-01"));
    }

    #[test]
    fn imbalance_names_highest_and_lowest() {
        let combined = combine(
            &window(),
            vec![
                NamedSource::available("A", series(300.0, &[("Amazon EC2", 300.0)])),
                NamedSource::available("B", series(90.0, &[("Amazon RDS", 90.0)])),
            ],
        );
        let insights = cross_source_insights(&combined);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, "cost_imbalance");
        assert_eq!(insights[0].title, "A costs 3.3x more than B");
        assert_eq!(insights[0].accounts_affected, ["A", "B"]);
    }

    #[test]
    fn ratio_of_exactly_three_is_balanced() {
        let combined = combine(
            &window(),
            vec![
                NamedSource::available("A", series(300.0, &[("Amazon EC2", 300.0)])),
                NamedSource::available("B", series(100.0, &[("Amazon RDS", 100.0)])),
            ],
        );
        assert!(cross_source_insights(&combined).is_empty());
    }

    #[test]
    fn shared_contributors_follow_imbalance() {
        let combined = combine(
            &window(),
            vec![
                NamedSource::available("prod", series(400.0, &[("Amazon EC2", 300.0), ("Amazon S3", 100.0)])),
                NamedSource::available("dev", series(50.0, &[("Amazon EC2", 40.0), ("Amazon S3", 10.0)])),
                NamedSource::unavailable("broken", "timeout"),
            ],
        );
        let insights = cross_source_insights(&combined);
        let kinds: Vec<_> = insights.iter().map(|i| i.kind.as_str()).collect();
        assert_eq!(
            kinds,
            ["cost_imbalance", "shared_service_opportunity", "shared_service_opportunity"]
        );
        assert_eq!(insights[1].service.as_deref(), Some("Amazon EC2"));
        assert_eq!(insights[1].accounts_affected, ["prod", "dev"]);
        assert_eq!(insights[2].title, "Amazon S3 used in all accounts");
    }

    #[test]
    fn period_change_needs_positive_totals() {
        let up = compare_periods(1234.56, 1100.0).unwrap();
        assert_eq!(up.previous_period_cost, 1100.0);
        assert_eq!(up.change_percent, 12.23);
        assert_eq!(up.change_direction, ChangeDirection::Up);

        let flat = compare_periods(50.0, 50.0).unwrap();
        assert_eq!(flat.change_percent, 0.0);
        assert_eq!(flat.change_direction, ChangeDirection::Down);

        assert!(compare_periods(50.0, 0.0).is_none());
        assert!(compare_periods(0.0, 50.0).is_none());
    }

    #[test]
    fn shares_split_combined_total_and_compare_previous() {
        let combined = combine(
            &window(),
            vec![
                NamedSource::available("prod", series(300.0, &[("Amazon EC2", 200.0), ("Amazon S3", 100.0)])),
                NamedSource::unavailable("legacy", "access denied"),
                NamedSource::available("dev", series(100.0, &[("AWS Lambda", 100.0)])),
            ],
        );
        let previous = vec![
            NamedSource::available("prod", series(400.0, &[("Amazon EC2", 400.0)])),
            NamedSource::available("dev", series(0.0, &[])),
        ];

        let shares = source_shares(&combined, &previous);
        let names: Vec<_> = shares.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["prod", "dev"]);

        assert_eq!(shares[0].percentage, 75.0);
        assert_eq!(shares[0].service_count, 2);
        assert_eq!(shares[0].top_service, "Amazon EC2");
        let prod_change = shares[0].previous.as_ref().unwrap();
        assert_eq!(prod_change.change_percent, -25.0);
        assert_eq!(prod_change.change_direction, ChangeDirection::Down);

        assert_eq!(shares[1].percentage, 25.0);
        assert!(shares[1].previous.is_none());

        let v = serde_json::to_value(&shares).unwrap();
        assert_eq!(
            v[0],
            json!({
                "account": "prod",
                "total_cost": 300.0,
                "percentage": 75.0,
                "service_count": 2,
                "top_service": "Amazon EC2",
                "previous_period_cost": 400.0,
                "change_percent": -25.0,
                "change_direction": "down"
            })
        );
        assert!(v[1].get("change_percent").is_none());
    }

    #[test]
    fn shares_of_zero_total_are_zero() {
        let combined = combine(
            &window(),
            vec![NamedSource::available("idle", series(0.0, &[]))],
        );
        let shares = source_shares(&combined, &[]);
        assert_eq!(shares[0].percentage, 0.0);
        assert_eq!(shares[0].top_service, "N/A");
        assert!(shares[0].previous.is_none());
    }

    #[test]
    fn single_source_has_no_insights() {
        let combined = combine(
            &window(),
            vec![NamedSource::available("prod", series(10.0, &[("Amazon EC2", 10.0)]))],
        );
        assert!(cross_source_insights(&combined).is_empty());
    }
}
