use crate::analytics::anomaly::AnomalyStatus;
use crate::analytics::trend::BudgetPosition;
use crate::config::RunMode;
use crate::dashboard::DashboardPayload;
use crate::domain::cost::SourceResult;
use anyhow::Context;
use chrono::NaiveDateTime;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 70;
const TOP_SERVICES_PER_ACCOUNT: usize = 3;

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
}

pub fn render_report(payload: &DashboardPayload, generated_at: NaiveDateTime) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "AI COST OPTIMIZATION REPORT");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(
        out,
        "Period: {} to {}",
        payload.meta.start_date, payload.meta.end_date
    );
    let _ = writeln!(out, "Accounts: {}", payload.totals.accounts);
    let _ = writeln!(out, "Total Spend: ${:.2}", payload.totals.total_spend);
    if payload.meta.mode == RunMode::Demo {
        let _ = writeln!(out, "Mode: DEMO (sample data)");
    }
    out.push('\n');

    section(&mut out, "PER-ACCOUNT SUMMARY");
    for source in &payload.accounts {
        match &source.result {
            SourceResult::Unavailable { error } => {
                let _ = writeln!(out, "{}: ERROR - {error}", source.name);
            }
            SourceResult::Available(series) => {
                let share = payload
                    .account_shares
                    .iter()
                    .find(|s| s.name == source.name);
                match share {
                    Some(share) => {
                        let _ = writeln!(
                            out,
                            "{}: ${:.2} ({:.1}% of combined)",
                            source.name, series.total, share.percentage
                        );
                        let _ = writeln!(
                            out,
                            "  Services: {} | Top Service: {}",
                            share.service_count, share.top_service
                        );
                        if let Some(prior) = &share.previous {
                            let _ = writeln!(
                                out,
                                "  Trend: {} {:.1}% vs previous {} days (${:.2})",
                                prior.change_direction.as_str(),
                                prior.change_percent.abs(),
                                payload.meta.days,
                                prior.previous_period_cost
                            );
                        }
                    }
                    None => {
                        let _ = writeln!(out, "{}: ${:.2}", source.name, series.total);
                    }
                }
                for c in series.contributors.iter().take(TOP_SERVICES_PER_ACCOUNT) {
                    let _ = writeln!(out, "  - {}: ${:.2}", c.name, c.amount);
                }
            }
        }
    }
    out.push('\n');

    section(&mut out, "COST FORECAST");
    match payload.forecast.result() {
        Some(f) => {
            let _ = writeln!(
                out,
                "Projected {}-Day Spend: ${:.2}",
                f.forecast_days, f.projected_total
            );
            let _ = writeln!(out, "Monthly Run Rate: ${:.2}", f.monthly_run_rate);
            let _ = writeln!(out, "Confidence: {}", f.confidence.as_str());
            let _ = writeln!(
                out,
                "Trend: {} ({:+.1}%)",
                f.trend_label.as_str(),
                f.growth_rate_percent
            );
        }
        None => {
            let _ = writeln!(out, "Forecast unavailable (insufficient data)");
        }
    }
    out.push('\n');

    section(&mut out, "BUDGET STATUS");
    match payload.budget.alert() {
        Some(alert) => match &alert.position {
            BudgetPosition::Over {
                overage,
                overage_percent,
                estimated_date,
                ..
            } => {
                let _ = writeln!(out, "Status: ALERT ({})", alert.severity.as_str());
                let _ = writeln!(out, "Projected Spend: ${:.2}", alert.projected_spend);
                let _ = writeln!(out, "Overage: ${overage:.2} ({overage_percent:.1}%)");
                match estimated_date {
                    Some(date) => {
                        let _ = writeln!(out, "Estimated Exceed Date: {date}");
                    }
                    None => {
                        let _ = writeln!(out, "Estimated Exceed Date: not reached at current rate");
                    }
                }
            }
            BudgetPosition::Under {
                buffer,
                buffer_percent,
                ..
            } => {
                let _ = writeln!(out, "Status: On track");
                let _ = writeln!(out, "Projected Spend: ${:.2}", alert.projected_spend);
                let _ = writeln!(out, "Buffer: ${buffer:.2} ({buffer_percent:.1}%)");
            }
        },
        None => {
            let _ = writeln!(out, "Budget check unavailable");
        }
    }
    out.push('\n');

    section(&mut out, "ANOMALY DETECTION");
    if payload.anomalies.summary.status() == AnomalyStatus::InsufficientData {
        let _ = writeln!(out, "Insufficient data to detect anomalies.");
    } else if payload.anomalies.anomalies.is_empty() {
        let _ = writeln!(out, "No anomalies detected.");
    } else {
        for a in &payload.anomalies.anomalies {
            let _ = writeln!(
                out,
                "- {}: ${:.2} (z={:.2}, {})",
                a.date,
                a.amount,
                a.z_score,
                a.severity.as_str()
            );
        }
    }
    out.push('\n');

    if !payload.insights.is_empty() {
        section(&mut out, "CROSS-ACCOUNT INSIGHTS");
        for insight in &payload.insights {
            let _ = writeln!(out, "- {}", insight.title);
            if !insight.description.is_empty() {
                let _ = writeln!(out, "  {}", insight.description);
            }
        }
        out.push('\n');
    }

    let roi = &payload.roi;
    section(&mut out, "SAVINGS TRACKER (ROI)");
    let _ = writeln!(out, "Total Recommendations: {}", roi.total_recommendations);
    let _ = writeln!(out, "Implemented: {}", roi.implemented);
    let _ = writeln!(out, "Pending: {}", roi.pending);
    let _ = writeln!(
        out,
        "Estimated Savings: ${:.2}/month",
        roi.total_estimated_savings
    );
    let _ = writeln!(out, "Actual Savings: ${:.2}/month", roi.total_actual_savings);
    let _ = writeln!(
        out,
        "Annual Projection: ${:.2}/year",
        roi.annual_projected_savings
    );
    out.push('\n');

    if !payload.pending_recommendations.is_empty() {
        section(&mut out, "TOP PENDING RECOMMENDATIONS");
        for rec in &payload.pending_recommendations {
            let _ = writeln!(
                out,
                "- {} (${:.2}/month)",
                rec.title, rec.estimated_monthly_savings
            );
            let _ = writeln!(
                out,
                "  Risk: {} | Effort: {}",
                rec.risk_level.as_str(),
                rec.effort.as_str()
            );
        }
        out.push('\n');
    }

    out
}

pub fn report_file_name(generated_at: NaiveDateTime) -> String {
    format!(
        "advanced_cost_report_{}.txt",
        generated_at.format("%Y%m%d_%H%M%S")
    )
}

pub fn write_report(
    dir: &Path,
    payload: &DashboardPayload,
    generated_at: NaiveDateTime,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create reports directory {}", dir.display()))?;
    let path = dir.join(report_file_name(generated_at));
    std::fs::write(&path, render_report(payload, generated_at))
        .with_context(|| format!("failed to write report {}", path.display()))?;
    Ok(path)
}
