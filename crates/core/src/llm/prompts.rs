use crate::analytics::trend::{analyze_trend, TrendLabel, TrendStats};
use crate::analytics::MIN_POINTS;
use crate::domain::cost::CostSeries;
use crate::llm::{LlmClient, TextRequest};
use crate::remediation::{RemediationDetails, RemediationItem};
use std::fmt::Write as _;

pub const FORECAST_MAX_TOKENS: u32 = 1500;
const TOP_CONTRIBUTORS: usize = 5;

const TERRAFORM_BASE: &str = "You are a Terraform expert. Generate production-ready Terraform code for this AWS cost optimization.

REQUIREMENTS:
- Use Terraform AWS provider
- Include all necessary resource blocks
- Add comments explaining the change
- Include data sources if needed
- Follow Terraform best practices
- Make it idempotent and safe
";

const HCL_ONLY: &str = "Output ONLY valid Terraform HCL code, no explanations before or after.";

pub fn forecast_prompt(
    series: &CostSeries,
    trend: &TrendStats,
    period_days: i64,
    horizon_days: u32,
) -> String {
    let mut prompt = format!(
        "You are a FinOps forecasting expert. Analyze this AWS cost data and provide a forecast.

HISTORICAL DATA ({period_days} days):
- Total Spend: ${total:.2}
- Average Daily: ${avg:.2}
- Trend: {label} ({growth:+.1}% growth rate)
- Volatility: {vol:.1}%
- Range: ${min:.2} - ${max:.2} per day

TOP SERVICES:
",
        total = series.total,
        avg = trend.average_daily,
        label = trend.label.as_str(),
        growth = trend.growth_rate_percent,
        vol = trend.volatility_percent,
        min = trend.min_daily,
        max = trend.max_daily,
    );

    for (i, c) in series.contributors.iter().take(TOP_CONTRIBUTORS).enumerate() {
        let share = if series.total > 0.0 {
            c.amount / series.total * 100.0
        } else {
            0.0
        };
        let _ = writeln!(prompt, "{}. {}: ${:.2} ({share:.1}%)", i + 1, c.name, c.amount);
    }

    let _ = write!(
        prompt,
        "
FORECAST REQUIREMENTS:
Provide a {horizon_days}-day cost forecast with:

1. **PREDICTED SPEND**
   - Projected total for next {horizon_days} days
   - Confidence level (High/Medium/Low)
   - Key assumptions

2. **TREND ANALYSIS**
   - Will costs increase, decrease, or stay stable?
   - Why? (seasonal patterns, growth trends, anomalies)
   - Risk factors that could change the forecast

3. **BUDGET ALERT**
   - If current trend continues, when will you hit $X milestones?
   - Monthly run rate projection
   - Comparison to current spend

4. **RECOMMENDATIONS**
   - Actions to take if forecast is accurate
   - Early warning signs to watch for
   - Cost control measures

Be specific with dollar amounts and dates. Explain your reasoning.
Format clearly with headers and bullet points.
"
    );
    prompt
}

pub async fn forecast_narrative(
    client: Option<&dyn LlmClient>,
    series: &CostSeries,
    period_days: i64,
    horizon_days: u32,
) -> String {
    let Some(client) = client else {
        return "LLM provider not configured. Cannot generate AI forecast.".to_string();
    };
    let trend = analyze_trend(series);
    if series.len() < MIN_POINTS || trend.label == TrendLabel::InsufficientData {
        return "Insufficient historical data for forecasting.".to_string();
    }

    let prompt = forecast_prompt(series, &trend, period_days, horizon_days);
    match client
        .generate_text(TextRequest::new(prompt, FORECAST_MAX_TOKENS))
        .await
    {
        Ok(text) => {
            tracing::info!(provider = %client.provider(), horizon_days, "AI forecast generated");
            text
        }
        Err(err) => {
            tracing::error!(provider = %client.provider(), error = %format!("{err:#}"), "AI forecast failed");
            format!("Error generating forecast: {err}")
        }
    }
}

pub fn terraform_prompt(item: &RemediationItem) -> String {
    let body = match &item.details {
        RemediationDetails::VolumeCleanup { volume_ids, reason } => format!(
            "OPTIMIZATION: Delete unused EBS volumes

Details:
- Volume IDs: {volume_ids:?}
- Reason: {reason}

Generate Terraform code that:
1. Creates null_resource with local-exec provisioner
2. Uses AWS CLI to delete volumes (safer than terraform destroy)
3. Includes confirmation check (manual approval step)
4. Comments explaining what will be deleted
"
        ),
        RemediationDetails::SnapshotCleanup {
            snapshot_ids,
            reason,
        } => format!(
            "OPTIMIZATION: Delete old RDS snapshots

Details:
- Snapshot IDs: {snapshot_ids:?}
- Reason: {reason}

Generate Terraform code that:
1. Uses null_resource with local-exec
2. AWS CLI commands to delete snapshots
3. Includes date check (only delete if >90 days old)
4. Dry-run option
"
        ),
        RemediationDetails::Lifecycle {
            bucket_name,
            current_class,
            target_class,
            transition_days,
        } => {
            let bucket = if bucket_name.is_empty() {
                "example-bucket"
            } else {
                bucket_name
            };
            format!(
                "OPTIMIZATION: Add S3 lifecycle policy

Details:
- Bucket name: {bucket}
- Current storage class: {current_class}
- Target class: {target_class}
- Transition days: {transition_days}

Generate Terraform code that:
1. References existing S3 bucket via data source
2. Creates aws_s3_bucket_lifecycle_configuration resource
3. Implements tiering rules (STANDARD -> INTELLIGENT_TIERING -> GLACIER)
4. Includes expiration for old versions
5. Comments explaining cost impact
"
            )
        }
    };

    format!("{TERRAFORM_BASE}\n\n{body}\n{HCL_ONLY}\n")
}
