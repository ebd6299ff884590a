use crate::analytics::{mean, population_stddev, MIN_POINTS};
use crate::domain::cost::CostSeries;
use crate::domain::{round1, round2};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

const STABLE_GROWTH_PERCENT: f64 = 5.0;
const RUN_RATE_DAYS: u32 = 30;
const HIGH_OVERAGE_PERCENT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    Stable,
    Increasing,
    Decreasing,
    InsufficientData,
}

impl TrendLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::Stable => "stable",
            TrendLabel::Increasing => "increasing",
            TrendLabel::Decreasing => "decreasing",
            TrendLabel::InsufficientData => "insufficient_data",
        }
    }

    fn from_growth(growth_percent: f64) -> Self {
        if growth_percent.abs() < STABLE_GROWTH_PERCENT {
            TrendLabel::Stable
        } else if growth_percent > 0.0 {
            TrendLabel::Increasing
        } else {
            TrendLabel::Decreasing
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    #[serde(rename = "trend")]
    pub label: TrendLabel,
    pub average_daily: f64,
    #[serde(rename = "growth_rate")]
    pub growth_rate_percent: f64,
    #[serde(rename = "volatility")]
    pub volatility_percent: f64,
    pub min_daily: f64,
    pub max_daily: f64,
    pub total_period: f64,
}

impl TrendStats {
    fn insufficient() -> Self {
        Self {
            label: TrendLabel::InsufficientData,
            average_daily: 0.0,
            growth_rate_percent: 0.0,
            volatility_percent: 0.0,
            min_daily: 0.0,
            max_daily: 0.0,
            total_period: 0.0,
        }
    }
}

pub fn analyze_trend(series: &CostSeries) -> TrendStats {
    let amounts = series.amounts();
    if amounts.len() < MIN_POINTS {
        return TrendStats::insufficient();
    }

    let average = mean(&amounts);
    let mid = amounts.len() / 2;
    let first_half = mean(&amounts[..mid]);
    let second_half = mean(&amounts[mid..]);

    let growth = if first_half > 0.0 {
        (second_half - first_half) * 100.0 / first_half
    } else {
        0.0
    };

    let volatility = if average > 0.0 {
        population_stddev(&amounts, average) / average * 100.0
    } else {
        0.0
    };

    let min = amounts.iter().copied().fold(f64::INFINITY, f64::min);
    let max = amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    TrendStats {
        label: TrendLabel::from_growth(growth),
        average_daily: round2(average),
        growth_rate_percent: round2(growth),
        volatility_percent: round2(volatility),
        min_daily: round2(min),
        max_daily: round2(max),
        total_period: round2(amounts.iter().sum()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_volatility(volatility_percent: f64) -> Self {
        if volatility_percent < 10.0 {
            Confidence::High
        } else if volatility_percent < 25.0 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub forecast_days: u32,
    pub projected_total: f64,
    pub projected_daily_avg: f64,
    pub monthly_run_rate: f64,
    pub confidence: Confidence,
    #[serde(rename = "trend")]
    pub trend_label: TrendLabel,
    #[serde(rename = "growth_rate")]
    pub growth_rate_percent: f64,
    #[serde(rename = "volatility")]
    pub volatility_percent: f64,
    pub assumptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsufficientData {
    pub error: String,
    pub min_days_required: usize,
}

impl InsufficientData {
    fn for_forecast() -> Self {
        Self {
            error: "Insufficient data for forecasting".to_string(),
            min_days_required: MIN_POINTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Forecast {
    Ready(ForecastResult),
    InsufficientData(InsufficientData),
}

impl Forecast {
    pub fn result(&self) -> Option<&ForecastResult> {
        match self {
            Forecast::Ready(result) => Some(result),
            Forecast::InsufficientData(_) => None,
        }
    }
}

/// Projects spend over `horizon_days` from the series average, with growth damped by half.
/// A projection that would go negative is floored at zero and noted in the assumptions.
pub fn forecast(series: &CostSeries, horizon_days: u32) -> Forecast {
    if series.len() < MIN_POINTS {
        return Forecast::InsufficientData(InsufficientData::for_forecast());
    }

    let trend = analyze_trend(series);
    let raw_daily = trend.average_daily * (1.0 + trend.growth_rate_percent / 2.0 / 100.0);
    let projected_daily = raw_daily.max(0.0);

    let mut assumptions = vec![
        format!("Based on {} days of historical data", series.len()),
        format!("Assumes {} trend continues", trend.label.as_str()),
        format!("Current growth rate: {:+.1}%", trend.growth_rate_percent),
        format!("Volatility: {:.1}%", trend.volatility_percent),
    ];
    if raw_daily < 0.0 {
        assumptions.push(format!(
            "Projected daily spend floored at $0.00 (unfloored projection ${raw_daily:.2})"
        ));
    }

    Forecast::Ready(ForecastResult {
        forecast_days: horizon_days,
        projected_total: round2(projected_daily * horizon_days as f64),
        projected_daily_avg: round2(projected_daily),
        monthly_run_rate: round2(projected_daily * RUN_RATE_DAYS as f64),
        confidence: Confidence::from_volatility(trend.volatility_percent),
        trend_label: trend.label,
        growth_rate_percent: trend.growth_rate_percent,
        volatility_percent: trend.volatility_percent,
        assumptions,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BudgetPosition {
    Over {
        overage: f64,
        overage_percent: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        days_until_exceeded: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        estimated_date: Option<NaiveDate>,
        recommendation: String,
    },
    Under {
        buffer: f64,
        buffer_percent: f64,
        status: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub alert: bool,
    pub severity: AlertSeverity,
    pub monthly_budget: f64,
    pub projected_spend: f64,
    #[serde(flatten)]
    pub position: BudgetPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BudgetCheck {
    Checked(BudgetAlert),
    InsufficientData(InsufficientData),
}

impl BudgetCheck {
    pub fn alert(&self) -> Option<&BudgetAlert> {
        match self {
            BudgetCheck::Checked(alert) => Some(alert),
            BudgetCheck::InsufficientData(_) => None,
        }
    }
}

/// Compares the 30-day run rate against `monthly_budget`. Alerts only when the run rate is
/// strictly above the budget; the breach date counts from `as_of`.
pub fn budget_check(series: &CostSeries, monthly_budget: f64, as_of: NaiveDate) -> BudgetCheck {
    let projection = match forecast(series, RUN_RATE_DAYS) {
        Forecast::Ready(result) => result,
        Forecast::InsufficientData(missing) => return BudgetCheck::InsufficientData(missing),
    };

    let projected = projection.monthly_run_rate;

    if projected > monthly_budget {
        let overage = projected - monthly_budget;
        let overage_percent = if monthly_budget > 0.0 {
            overage / monthly_budget * 100.0
        } else {
            100.0
        };

        let daily = projection.projected_daily_avg;
        let days_until_exceeded = if daily > 0.0 {
            Some((monthly_budget / daily).floor() as i64)
        } else {
            None
        };
        let estimated_date = days_until_exceeded.and_then(|days| {
            if days >= 0 {
                as_of.checked_add_days(Days::new(days.unsigned_abs()))
            } else {
                as_of.checked_sub_days(Days::new(days.unsigned_abs()))
            }
        });

        return BudgetCheck::Checked(BudgetAlert {
            alert: true,
            severity: if overage_percent > HIGH_OVERAGE_PERCENT {
                AlertSeverity::High
            } else {
                AlertSeverity::Medium
            },
            monthly_budget,
            projected_spend: projected,
            position: BudgetPosition::Over {
                overage: round2(overage),
                overage_percent: round1(overage_percent),
                days_until_exceeded,
                estimated_date,
                recommendation: format!(
                    "Take action now to reduce daily spend by ${:.2}/day",
                    overage / RUN_RATE_DAYS as f64
                ),
            },
        });
    }

    let buffer = monthly_budget - projected;
    let buffer_percent = if monthly_budget > 0.0 {
        buffer / monthly_budget * 100.0
    } else {
        0.0
    };

    BudgetCheck::Checked(BudgetAlert {
        alert: false,
        severity: AlertSeverity::Low,
        monthly_budget,
        projected_spend: projected,
        position: BudgetPosition::Under {
            buffer: round2(buffer),
            buffer_percent: round1(buffer_percent),
            status: "On track - within budget".to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
    }

    fn series(amounts: &[f64]) -> CostSeries {
        CostSeries::from_amounts(start(), amounts)
    }

    fn ready(f: Forecast) -> ForecastResult {
        match f {
            Forecast::Ready(result) => result,
            other => panic!("expected forecast, got {other:?}"),
        }
    }

    fn checked(b: BudgetCheck) -> BudgetAlert {
        match b {
            BudgetCheck::Checked(alert) => alert,
            other => panic!("expected budget alert, got {other:?}"),
        }
    }

    #[test]
    fn short_series_is_insufficient_everywhere() {
        let short = series(&[5.0; 6]);
        let stats = analyze_trend(&short);
        assert_eq!(stats.label, TrendLabel::InsufficientData);
        assert_eq!(stats.average_daily, 0.0);

        let f = forecast(&short, 30);
        assert_eq!(
            serde_json::to_value(&f).unwrap(),
            json!({"error": "Insufficient data for forecasting", "min_days_required": 7})
        );
        assert!(budget_check(&short, 100.0, start()).alert().is_none());
    }

    #[test]
    fn growth_of_exactly_five_percent_is_not_stable() {
        let up = analyze_trend(&series(&[20.0, 20.0, 20.0, 20.0, 21.0, 21.0, 21.0, 21.0]));
        assert_eq!(up.growth_rate_percent, 5.0);
        assert_eq!(up.label, TrendLabel::Increasing);

        let down = analyze_trend(&series(&[20.0, 20.0, 20.0, 20.0, 19.0, 19.0, 19.0, 19.0]));
        assert_eq!(down.growth_rate_percent, -5.0);
        assert_eq!(down.label, TrendLabel::Decreasing);

        let flat = analyze_trend(&series(&[20.0; 8]));
        assert_eq!(flat.label, TrendLabel::Stable);
        assert_eq!(flat.volatility_percent, 0.0);
    }

    #[test]
    fn seven_points_split_three_four() {
        let stats = analyze_trend(&series(&[10.0, 10.0, 10.0, 20.0, 20.0, 20.0, 20.0]));
        assert_eq!(stats.growth_rate_percent, 100.0);
        assert_eq!(stats.min_daily, 10.0);
        assert_eq!(stats.max_daily, 20.0);
        assert_eq!(stats.total_period, 110.0);
    }

    #[test]
    fn zero_first_half_means_zero_growth() {
        let stats = analyze_trend(&series(&[0.0, 0.0, 0.0, 5.0, 5.0, 5.0, 5.0]));
        assert_eq!(stats.growth_rate_percent, 0.0);
        assert_eq!(stats.label, TrendLabel::Stable);
    }

    #[test]
    fn run_rate_ignores_horizon() {
        let s = series(&[10.0, 11.0, 12.0, 10.0, 11.0, 12.0, 10.0, 11.0, 14.0, 15.0]);
        let week = ready(forecast(&s, 7));
        let quarter = ready(forecast(&s, 90));
        assert_eq!(week.monthly_run_rate, quarter.monthly_run_rate);
        assert_eq!(week.forecast_days, 7);
        assert_eq!(week.assumptions.len(), 4);
        assert_eq!(week.assumptions[0], "Based on 10 days of historical data");
    }

    #[test]
    fn constant_series_has_high_confidence() {
        let f = ready(forecast(&series(&[10.0; 10]), 30));
        assert_eq!(f.projected_daily_avg, 10.0);
        assert_eq!(f.projected_total, 300.0);
        assert_eq!(f.monthly_run_rate, 300.0);
        assert_eq!(f.confidence, Confidence::High);
        assert_eq!(f.assumptions[2], "Current growth rate: +0.0%");
    }

    #[test]
    fn collapsing_series_stays_positive_after_damping() {
        let f = ready(forecast(
            &series(&[100.0, 100.0, 100.0, 100.0, 1.0, 1.0, 1.0, 1.0]),
            30,
        ));
        assert_eq!(f.growth_rate_percent, -99.0);
        assert!(f.projected_daily_avg > 0.0);
        assert_eq!(f.assumptions.len(), 4);
    }

    #[test]
    fn credits_driving_projection_negative_are_floored() {
        // refunds outweigh spend in the second half
        let f = ready(forecast(
            &series(&[10.0, 10.0, 10.0, -8.0, -8.0, -8.0, -8.0]),
            30,
        ));
        assert_eq!(f.projected_daily_avg, 0.0);
        assert_eq!(f.projected_total, 0.0);
        assert_eq!(f.monthly_run_rate, 0.0);
        assert_eq!(f.assumptions.len(), 5);
        assert!(f.assumptions[4].starts_with("Projected daily spend floored at $0.00"));
    }

    #[test]
    fn budget_equal_to_run_rate_does_not_alert() {
        let s = series(&[10.0; 10]);
        let alert = checked(budget_check(&s, 300.0, start()));
        assert!(!alert.alert);
        assert_eq!(alert.severity, AlertSeverity::Low);
        match alert.position {
            BudgetPosition::Under { buffer, .. } => assert_eq!(buffer, 0.0),
            other => panic!("expected buffer, got {other:?}"),
        }
    }

    #[test]
    fn small_overage_is_medium_with_breach_date() {
        let s = series(&[10.0; 10]);
        let alert = checked(budget_check(&s, 299.0, start()));
        assert!(alert.alert);
        assert_eq!(alert.severity, AlertSeverity::Medium);
        match alert.position {
            BudgetPosition::Over {
                days_until_exceeded,
                estimated_date,
                ..
            } => {
                assert_eq!(days_until_exceeded, Some(29));
                assert_eq!(estimated_date, NaiveDate::from_ymd_opt(2026, 3, 2));
            }
            other => panic!("expected overage, got {other:?}"),
        }
    }

    #[test]
    fn large_overage_is_high() {
        let alert = checked(budget_check(&series(&[10.0; 10]), 200.0, start()));
        assert_eq!(alert.severity, AlertSeverity::High);
        let v = serde_json::to_value(&alert).unwrap();
        assert_eq!(v["overage"], json!(100.0));
        assert_eq!(v["overage_percent"], json!(50.0));
        assert_eq!(v["days_until_exceeded"], json!(20));
        assert_eq!(v["estimated_date"], json!("2026-02-21"));
    }

    #[test]
    fn unreachable_breach_date_is_omitted() {
        let alert = checked(budget_check(&series(&[0.5; 10]), -1e18, start()));
        match alert.position {
            BudgetPosition::Over {
                days_until_exceeded,
                estimated_date,
                ..
            } => {
                assert!(days_until_exceeded.is_some_and(|d| d < 0));
                assert_eq!(estimated_date, None);
            }
            other => panic!("expected overage, got {other:?}"),
        }
    }

    #[test]
    fn zero_spend_never_breaches() {
        let alert = checked(budget_check(&series(&[0.0; 7]), -1.0, start()));
        assert!(alert.alert);
        match alert.position {
            BudgetPosition::Over {
                days_until_exceeded,
                estimated_date,
                overage_percent,
                ..
            } => {
                assert_eq!(days_until_exceeded, None);
                assert_eq!(estimated_date, None);
                assert_eq!(overage_percent, 100.0);
            }
            other => panic!("expected overage, got {other:?}"),
        }
    }
}
