use crate::analytics::aggregate::{
    combine, cross_source_insights, serialize_cents, serialize_sources, source_shares,
    CrossSourceInsight, SourceShare,
};
use crate::analytics::anomaly::{detect_anomalies, AnomalyReport, DEFAULT_Z_THRESHOLD};
use crate::analytics::trend::{budget_check, forecast, BudgetCheck, Forecast};
use crate::config::{RunMode, Settings};
use crate::domain::cost::{ContributorBreakdown, CostPoint, CostSeries, NamedSource};
use crate::domain::recommendation::{Recommendation, RecommendationStatus, RoiSummary};
use crate::domain::round2;
use crate::ingest::demo::{demo_recommendations, DemoBillingSource};
use crate::ingest::{collect, parse_accounts, BillingSource, HttpJsonBillingSource};
use crate::remediation::{create_remediation_plan, RemediationItem};
use crate::storage::SavingsLedger;
use crate::time::AnalysisWindow;
use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

pub const FORECAST_DAYS: u32 = 30;
pub const PENDING_LIMIT: usize = 5;
const DEMO_BUDGET_HEADROOM: f64 = 1.1;
const DEMO_IMPLEMENTED_NOTE: &str = "Implemented in demo environment";

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRequest {
    pub mode: RunMode,
    pub days: u32,
    pub monthly_budget: f64,
    pub end: NaiveDate,
    /// Day the budget breach date counts from.
    pub as_of: NaiveDate,
}

impl DashboardRequest {
    pub fn window(&self) -> anyhow::Result<AnalysisWindow> {
        AnalysisWindow::ending_on(self.end, self.days)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadMeta {
    pub mode: RunMode,
    pub days: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadTotals {
    #[serde(serialize_with = "serialize_cents")]
    pub total_spend: f64,
    pub accounts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardPayload {
    pub meta: PayloadMeta,
    pub totals: PayloadTotals,
    #[serde(serialize_with = "serialize_sources")]
    pub accounts: Vec<NamedSource>,
    pub services: ContributorBreakdown,
    pub account_shares: Vec<SourceShare>,
    pub daily_costs: Vec<CostPoint>,
    pub forecast: Forecast,
    pub budget: BudgetCheck,
    pub anomalies: AnomalyReport,
    pub roi: RoiSummary,
    pub pending_recommendations: Vec<Recommendation>,
    pub remediation_plan: Vec<RemediationItem>,
    #[serde(skip)]
    pub insights: Vec<CrossSourceInsight>,
    #[serde(skip)]
    pub effective_budget: f64,
}

impl DashboardPayload {
    pub fn representative_series(&self) -> Option<&CostSeries> {
        self.accounts.first().and_then(|s| s.result.series())
    }
}

pub fn sources_for(
    settings: &Settings,
    mode: RunMode,
    accounts: &str,
) -> anyhow::Result<Vec<Box<dyn BillingSource>>> {
    match mode {
        RunMode::Demo => Ok(DemoBillingSource::all()),
        RunMode::Live => parse_accounts(accounts)
            .into_iter()
            .map(|account| {
                let name = account.name.clone();
                HttpJsonBillingSource::from_settings(settings, account)
                    .map(|s| Box::new(s) as Box<dyn BillingSource>)
                    .with_context(|| format!("failed to configure billing source {name}"))
            })
            .collect(),
    }
}

async fn seed_demo_ledger(ledger: &SavingsLedger) -> anyhow::Result<()> {
    ledger.reset().await.context("failed to reset demo ledger")?;
    for seed in demo_recommendations() {
        let id = ledger.add_recommendation(&seed.recommendation).await?;
        if let Some(actual) = seed.actual_savings {
            ledger
                .mark_implemented(id, Some(actual), Some(DEMO_IMPLEMENTED_NOTE))
                .await?;
        }
    }
    Ok(())
}

pub async fn build_payload(
    request: &DashboardRequest,
    ledger: &SavingsLedger,
    sources: &[Box<dyn BillingSource>],
) -> anyhow::Result<DashboardPayload> {
    let window = request.window()?;
    let combined = combine(&window, collect(sources, &window).await);
    let insights = cross_source_insights(&combined);

    let previous_window = window.preceding()?;
    let previous = collect(sources, &previous_window).await;
    let account_shares = source_shares(&combined, &previous);

    let series = combined
        .representative()
        .and_then(|s| s.result.series())
        .cloned()
        .unwrap_or_default();

    let mut monthly_budget = request.monthly_budget;
    if request.mode == RunMode::Demo && monthly_budget < combined.grand_total {
        monthly_budget = round2(combined.grand_total * DEMO_BUDGET_HEADROOM);
        tracing::info!(
            requested = request.monthly_budget,
            effective = monthly_budget,
            "demo budget raised above total spend"
        );
    }

    if request.mode == RunMode::Demo {
        seed_demo_ledger(ledger).await?;
    }

    let roi = ledger.roi_summary().await?;
    let mut pending = ledger
        .recommendations(Some(RecommendationStatus::Pending))
        .await?;
    pending.truncate(PENDING_LIMIT);
    let remediation_plan = create_remediation_plan(&pending);

    tracing::info!(
        mode = request.mode.as_str(),
        days = request.days,
        accounts = combined.sources.len(),
        total = combined.grand_total,
        pending = pending.len(),
        "dashboard payload built"
    );

    Ok(DashboardPayload {
        meta: PayloadMeta {
            mode: request.mode,
            days: request.days,
            start_date: combined.start_date,
            end_date: combined.end_date,
        },
        totals: PayloadTotals {
            total_spend: combined.grand_total,
            accounts: combined.sources.len(),
        },
        daily_costs: series.points.clone(),
        forecast: forecast(&series, FORECAST_DAYS),
        budget: budget_check(&series, monthly_budget, request.as_of),
        anomalies: detect_anomalies(&series, DEFAULT_Z_THRESHOLD),
        roi,
        pending_recommendations: pending,
        remediation_plan,
        insights,
        account_shares,
        effective_budget: monthly_budget,
        accounts: combined.sources,
        services: combined.contributors,
    })
}
