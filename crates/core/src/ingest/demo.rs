use crate::domain::recommendation::{Effort, NewRecommendation, RiskLevel};
use crate::domain::round2;
use crate::ingest::provider::BillingSource;
use crate::ingest::types::{DailyCostRecord, DailyCostResponse};
use crate::time::AnalysisWindow;
use anyhow::Result;
use std::collections::BTreeMap;

/// Shape of one synthetic account: daily base spend, relative drift across the window, and
/// a 3-day jitter amplitude. `weights` split each day across services.
#[derive(Debug, Clone)]
pub struct DemoProfile {
    pub name: &'static str,
    pub base: f64,
    pub drift: f64,
    pub jitter: f64,
    pub weights: &'static [(&'static str, f64)],
}

const PROD: DemoProfile = DemoProfile {
    name: "prod",
    base: 280.0,
    drift: 0.25,
    jitter: 1.5,
    weights: &[
        ("Amazon EC2", 860.25),
        ("Amazon RDS", 420.10),
        ("Amazon S3", 180.60),
        ("AWS Lambda", 95.40),
        ("NAT Gateway", 72.25),
        ("AWS KMS", 33.10),
    ],
};

const STAGING: DemoProfile = DemoProfile {
    name: "staging",
    base: 85.0,
    drift: 0.05,
    jitter: 0.6,
    weights: &[
        ("Amazon EC2", 210.40),
        ("Amazon RDS", 98.15),
        ("Amazon S3", 55.30),
        ("AWS Lambda", 22.90),
        ("NAT Gateway", 18.60),
    ],
};

const DEV: DemoProfile = DemoProfile {
    name: "dev",
    base: 35.0,
    drift: -0.03,
    jitter: 0.4,
    weights: &[
        ("Amazon EC2", 75.50),
        ("Amazon S3", 28.15),
        ("AWS Lambda", 16.30),
        ("Amazon CloudWatch", 9.80),
    ],
};

const MIN_DAILY: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct DemoBillingSource {
    profile: DemoProfile,
}

impl DemoBillingSource {
    pub fn new(profile: DemoProfile) -> Self {
        Self { profile }
    }

    pub fn all() -> Vec<Box<dyn BillingSource>> {
        [PROD, STAGING, DEV]
            .into_iter()
            .map(|p| Box::new(DemoBillingSource::new(p)) as Box<dyn BillingSource>)
            .collect()
    }

    pub fn daily_amounts(&self, days: usize) -> Vec<f64> {
        let p = &self.profile;
        let span = days.saturating_sub(1).max(1) as f64;
        (0..days)
            .map(|i| {
                let wave = ((i % 7) as f64 - 3.0) * 0.12;
                let trend = p.drift * (i as f64 / span);
                let jitter = p.jitter * ((i % 3) as f64 - 1.0);
                round2((p.base + p.base * (wave + trend) + jitter).max(MIN_DAILY))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl BillingSource for DemoBillingSource {
    fn source_name(&self) -> &str {
        self.profile.name
    }

    async fn fetch_daily_costs(&self, window: &AnalysisWindow) -> Result<DailyCostResponse> {
        let weight_sum: f64 = self.profile.weights.iter().map(|(_, w)| w).sum();
        let dates: Vec<_> = window.dates().collect();
        let amounts = self.daily_amounts(dates.len());

        let days = dates
            .into_iter()
            .zip(amounts)
            .map(|(date, amount)| {
                let costs: BTreeMap<String, f64> = self
                    .profile
                    .weights
                    .iter()
                    .map(|(name, w)| (name.to_string(), amount * w / weight_sum))
                    .collect();
                DailyCostRecord { date, costs }
            })
            .collect();

        Ok(DailyCostResponse {
            start_date: window.start,
            end_date: window.end,
            days,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DemoRecommendation {
    pub recommendation: NewRecommendation,
    pub actual_savings: Option<f64>,
}

pub fn demo_recommendations() -> Vec<DemoRecommendation> {
    vec![
        DemoRecommendation {
            recommendation: NewRecommendation::new(
                "Downsize EC2 m5.4xlarge to m5.xlarge (prod)",
                "EC2_rightsizing",
                420.0,
            )
            .with_account("demo")
            .with_description("CPU < 15% over 30 days; safe resize during maintenance window")
            .with_risk(RiskLevel::Low)
            .with_effort(Effort::QuickWin),
            actual_savings: Some(400.0),
        },
        DemoRecommendation {
            recommendation: NewRecommendation::new(
                "Add S3 lifecycle policy to enable Intelligent-Tiering (prod)",
                "S3_lifecycle",
                120.0,
            )
            .with_account("demo")
            .with_description("80% objects untouched for 45+ days")
            .with_risk(RiskLevel::Low)
            .with_effort(Effort::QuickWin),
            actual_savings: None,
        },
        DemoRecommendation {
            recommendation: NewRecommendation::new(
                "Consolidate NAT gateways across AZs (staging/dev)",
                "network_optimization",
                95.0,
            )
            .with_account("demo")
            .with_description("Low traffic in non-prod; use single NAT gateway")
            .with_risk(RiskLevel::Medium)
            .with_effort(Effort::Medium),
            actual_savings: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window(days: u32) -> AnalysisWindow {
        AnalysisWindow::ending_on(NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(), days).unwrap()
    }

    #[test]
    fn prod_week_follows_wave_drift_and_jitter() {
        let prod = DemoBillingSource::new(PROD);
        let amounts = prod.daily_amounts(7);
        // day 0: 280 + 280 * (-0.36) - 1.5
        assert_eq!(amounts[0], 177.7);
        // day 3: wave 0, drift 0.125, jitter -1.5
        assert_eq!(amounts[3], 313.5);
        assert_eq!(amounts[6], 449.3);
        assert_eq!(amounts.len(), 7);
    }

    #[test]
    fn single_day_window_does_not_divide_by_zero() {
        let dev = DemoBillingSource::new(DEV);
        let amounts = dev.daily_amounts(1);
        assert_eq!(amounts.len(), 1);
        assert!(amounts[0] >= MIN_DAILY);
    }

    #[tokio::test]
    async fn export_covers_window_and_splits_by_weight() {
        let w = window(14);
        let source = DemoBillingSource::new(STAGING);
        let resp = source.fetch_daily_costs(&w).await.unwrap();
        assert_eq!(resp.days.len(), 14);
        assert!(crate::ingest::provider::validate(&resp, &w).is_ok());

        let expected: f64 = source.daily_amounts(14).iter().sum();
        let series = resp.into_series();
        assert!((series.total - expected).abs() < 0.05);
        assert_eq!(series.contributors.len(), 5);
        assert_eq!(
            series.contributors.top().map(|c| c.name.as_str()),
            Some("Amazon EC2")
        );
    }

    #[test]
    fn seeds_one_implemented_recommendation() {
        let seeds = demo_recommendations();
        assert_eq!(seeds.len(), 3);
        assert_eq!(seeds.iter().filter(|s| s.actual_savings.is_some()).count(), 1);
        assert!(seeds.iter().all(|s| s.recommendation.account_name == "demo"));
    }
}
