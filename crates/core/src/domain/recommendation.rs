use crate::domain::{round1, round2, timestamp};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Pending,
    Implemented,
    Rejected,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Implemented => "implemented",
            RecommendationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(RecommendationStatus::Pending),
            "implemented" => Ok(RecommendationStatus::Implemented),
            "rejected" => Ok(RecommendationStatus::Rejected),
            other => anyhow::bail!("unknown recommendation status: {other:?}"),
        }
    }
}

/// Risk of applying a recommendation. Values outside the known vocabulary are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Other(String),
}

impl RiskLevel {
    pub fn as_str(&self) -> &str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Other(raw) => raw,
        }
    }
}

impl From<String> for RiskLevel {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "medium" => RiskLevel::Medium,
            "high" => RiskLevel::High,
            _ => RiskLevel::Other(raw),
        }
    }
}

impl From<RiskLevel> for String {
    fn from(risk: RiskLevel) -> Self {
        risk.as_str().to_string()
    }
}

/// Implementation effort. `quick win` and `<1 hour` are accepted spellings of a quick win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Effort {
    QuickWin,
    Medium,
    Complex,
    Other(String),
}

impl Effort {
    pub fn as_str(&self) -> &str {
        match self {
            Effort::QuickWin => "quick_win",
            Effort::Medium => "medium",
            Effort::Complex => "complex",
            Effort::Other(raw) => raw,
        }
    }
}

impl From<String> for Effort {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "quick_win" | "quick win" | "<1 hour" => Effort::QuickWin,
            "medium" => Effort::Medium,
            "complex" => Effort::Complex,
            _ => Effort::Other(raw),
        }
    }
}

impl From<Effort> for String {
    fn from(effort: Effort) -> Self {
        effort.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecommendation {
    pub title: String,
    pub recommendation_type: String,
    pub estimated_monthly_savings: f64,
    pub account_name: String,
    pub description: String,
    pub risk_level: RiskLevel,
    pub effort: Effort,
}

impl NewRecommendation {
    pub fn new(
        title: impl Into<String>,
        recommendation_type: impl Into<String>,
        estimated_monthly_savings: f64,
    ) -> Self {
        Self {
            title: title.into(),
            recommendation_type: recommendation_type.into(),
            estimated_monthly_savings,
            account_name: "default".to_string(),
            description: String::new(),
            risk_level: RiskLevel::Medium,
            effort: Effort::Medium,
        }
    }

    pub fn with_account(mut self, account_name: impl Into<String>) -> Self {
        self.account_name = account_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_risk(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    pub fn with_effort(mut self, effort: Effort) -> Self {
        self.effort = effort;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    #[serde(rename = "created_date", with = "timestamp")]
    pub created_at: NaiveDateTime,
    pub account_name: String,
    pub recommendation_type: String,
    pub title: String,
    pub description: String,
    pub estimated_monthly_savings: f64,
    pub risk_level: RiskLevel,
    pub effort: Effort,
    pub status: RecommendationStatus,
    #[serde(rename = "implemented_date", with = "timestamp::option")]
    pub implemented_at: Option<NaiveDateTime>,
    pub actual_monthly_savings: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSnapshot {
    pub id: i64,
    pub snapshot_date: NaiveDate,
    pub account_name: String,
    pub total_cost: f64,
    pub period_days: i64,
    #[serde(rename = "service_breakdown")]
    pub contributor_breakdown: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoiTotals {
    pub total: i64,
    pub implemented: i64,
    pub rejected: i64,
    pub pending: i64,
    pub total_estimated: f64,
    pub implemented_estimated: f64,
    pub total_actual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiSummary {
    pub total_recommendations: i64,
    pub implemented: i64,
    pub rejected: i64,
    pub pending: i64,
    pub implementation_rate: f64,
    pub total_estimated_savings: f64,
    pub implemented_estimated_savings: f64,
    pub total_actual_savings: f64,
    pub forecast_accuracy: f64,
    pub annual_projected_savings: f64,
}

impl RoiSummary {
    pub fn from_totals(totals: RoiTotals, measured: &[(f64, f64)]) -> Self {
        let implementation_rate = if totals.total > 0 {
            totals.implemented as f64 / totals.total as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_recommendations: totals.total,
            implemented: totals.implemented,
            rejected: totals.rejected,
            pending: totals.pending,
            implementation_rate: round1(implementation_rate),
            total_estimated_savings: round2(totals.total_estimated),
            implemented_estimated_savings: round2(totals.implemented_estimated),
            total_actual_savings: round2(totals.total_actual),
            forecast_accuracy: round1(forecast_accuracy(measured)),
            annual_projected_savings: round2(totals.total_actual * 12.0),
        }
    }
}

/// `100 - mean(|est - act|) / mean(est) * 100`, or 0 when nothing was measured or the mean
/// estimate is zero.
pub fn forecast_accuracy(measured: &[(f64, f64)]) -> f64 {
    if measured.is_empty() {
        return 0.0;
    }
    let n = measured.len() as f64;
    let mean_diff = measured.iter().map(|(est, act)| (est - act).abs()).sum::<f64>() / n;
    let mean_estimate = measured.iter().map(|(est, _)| est).sum::<f64>() / n;
    if mean_estimate == 0.0 {
        return 0.0;
    }
    100.0 - mean_diff / mean_estimate * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_matches_mean_absolute_error_over_mean_estimate() {
        let accuracy = forecast_accuracy(&[(100.0, 90.0), (50.0, 60.0)]);
        assert!((accuracy - (100.0 - 10.0 / 75.0 * 100.0)).abs() < 1e-9);
        assert_eq!(round1(accuracy), 86.7);
    }

    #[test]
    fn accuracy_is_zero_without_measurements() {
        assert_eq!(forecast_accuracy(&[]), 0.0);
        assert_eq!(forecast_accuracy(&[(0.0, 5.0)]), 0.0);
    }

    #[test]
    fn empty_totals_produce_all_zero_summary() {
        let roi = RoiSummary::from_totals(RoiTotals::default(), &[]);
        assert_eq!(roi.total_recommendations, 0);
        assert_eq!(roi.implementation_rate, 0.0);
        assert_eq!(roi.forecast_accuracy, 0.0);
        assert_eq!(roi.annual_projected_savings, 0.0);
    }

    #[test]
    fn summary_derives_rate_and_annual_projection() {
        let totals = RoiTotals {
            total: 3,
            implemented: 1,
            rejected: 0,
            pending: 2,
            total_estimated: 635.0,
            implemented_estimated: 420.0,
            total_actual: 400.0,
        };
        let roi = RoiSummary::from_totals(totals, &[(420.0, 400.0)]);
        assert_eq!(roi.implementation_rate, 33.3);
        assert_eq!(roi.annual_projected_savings, 4800.0);
        assert_eq!(roi.forecast_accuracy, 95.2);
    }

    #[test]
    fn lenient_vocabularies_keep_unknown_values() {
        assert_eq!(RiskLevel::from("LOW".to_string()), RiskLevel::Low);
        assert_eq!(Effort::from("quick win".to_string()), Effort::QuickWin);
        assert_eq!(Effort::from("<1 hour".to_string()), Effort::QuickWin);
        let other = Effort::from("a weekend".to_string());
        assert_eq!(other.as_str(), "a weekend");
        assert!("archived".parse::<RecommendationStatus>().is_err());
        assert_eq!(
            "implemented".parse::<RecommendationStatus>().unwrap(),
            RecommendationStatus::Implemented
        );
    }
}
