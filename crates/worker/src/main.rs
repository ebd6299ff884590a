use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spendwatch_core::config::{RunMode, Settings};
use spendwatch_core::dashboard::{build_payload, sources_for, DashboardRequest, FORECAST_DAYS};
use spendwatch_core::llm::prompts::forecast_narrative;
use spendwatch_core::remediation::{draft_terraform, save_terraform};
use spendwatch_core::report::{render_report, write_report};
use spendwatch_core::storage::SavingsLedger;
use spendwatch_core::time::resolve_window;

const MAX_TERRAFORM_DRAFTS: usize = 3;

#[derive(Debug, Parser)]
#[command(name = "spendwatch_worker")]
struct Args {
    /// Use the synthetic demo accounts and a fresh demo ledger.
    #[arg(long)]
    demo: bool,

    /// Days of billing history to analyze. Defaults to DAYS_TO_ANALYZE.
    #[arg(long)]
    days: Option<u32>,

    /// Monthly budget in dollars. Defaults to MONTHLY_BUDGET.
    #[arg(long)]
    budget: Option<f64>,

    /// Account list, `name:profile,name2`. Defaults to AWS_ACCOUNTS.
    #[arg(long)]
    accounts: Option<String>,

    /// Exclusive end of the analysis window (YYYY-MM-DD). Defaults to today (UTC).
    #[arg(long)]
    end_date: Option<String>,

    /// Ask the configured LLM for a narrative forecast.
    #[arg(long)]
    ai_forecast: bool,

    /// Print the remediation plan for pending quick wins.
    #[arg(long)]
    auto_remediate: bool,

    /// With --auto-remediate, draft Terraform for the first plan items.
    #[arg(long)]
    generate_terraform: bool,

    /// Save the text report under --reports-dir. Implied by --demo.
    #[arg(long)]
    report: bool,

    #[arg(long, default_value = "reports")]
    reports_dir: PathBuf,

    #[arg(long, default_value = "terraform_generated")]
    terraform_dir: PathBuf,
}

impl Args {
    fn saves_report(&self) -> bool {
        self.report || self.demo
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(&settings, &args).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "analysis run failed");
        return Err(err);
    }
    Ok(())
}

async fn run(settings: &Settings, args: &Args) -> anyhow::Result<()> {
    let mode = if args.demo { RunMode::Demo } else { RunMode::Live };
    let days = args.days.unwrap_or(settings.days_to_analyze);
    let accounts = args.accounts.as_deref().unwrap_or(settings.accounts.as_str());
    let now = chrono::Utc::now();
    let window = resolve_window(args.end_date.as_deref(), days, now)?;

    tracing::info!(
        mode = mode.as_str(),
        days,
        start = %window.start,
        end = %window.end,
        "starting cost analysis"
    );

    let ledger = SavingsLedger::open(settings.ledger_path(mode))
        .await
        .context("failed to open savings ledger")?;
    let sources = sources_for(settings, mode, accounts)?;

    let request = DashboardRequest {
        mode,
        days,
        monthly_budget: args.budget.unwrap_or(settings.monthly_budget),
        end: window.end,
        as_of: now.date_naive(),
    };
    let payload = build_payload(&request, &ledger, &sources).await?;

    for source in &payload.accounts {
        if let Some(series) = source.result.series() {
            ledger
                .add_cost_snapshot(
                    series.total,
                    &source.name,
                    window.days(),
                    Some(&series.contributors),
                )
                .await?;
        }
    }

    println!("{}", render_report(&payload, chrono::Utc::now().naive_utc()));

    let llm = if args.ai_forecast || args.generate_terraform {
        spendwatch_core::llm::from_settings(settings)?
    } else {
        None
    };

    if args.ai_forecast {
        match payload.representative_series() {
            Some(series) => {
                let text =
                    forecast_narrative(llm.as_deref(), series, window.days(), FORECAST_DAYS).await;
                println!("AI-POWERED DETAILED FORECAST\n{}\n{text}\n", "=".repeat(70));
            }
            None => tracing::warn!("no series available for AI forecast"),
        }
    }

    if args.auto_remediate {
        println!("REMEDIATION PLAN\n{}", "=".repeat(70));
        if payload.remediation_plan.is_empty() {
            println!("No automatable recommendations pending.");
        }
        for item in &payload.remediation_plan {
            println!(
                "- #{} {} (auto_safe={})",
                item.recommendation_id,
                item.optimization_type.as_str(),
                item.auto_safe
            );
        }

        if args.generate_terraform {
            for item in payload.remediation_plan.iter().take(MAX_TERRAFORM_DRAFTS) {
                let code = draft_terraform(llm.as_deref(), item, settings.llm_max_tokens).await;
                let path = save_terraform(&args.terraform_dir, &item.terraform_file_name(), &code)?;
                tracing::info!(path = %path.display(), "terraform draft written");
                println!("Generated: {}", path.display());
            }
            if !payload.remediation_plan.is_empty() {
                println!("DRY RUN: review the generated Terraform before applying.");
            }
        }
    } else if args.generate_terraform {
        tracing::warn!("--generate-terraform has no effect without --auto-remediate");
    }

    if args.saves_report() {
        let path = write_report(&args.reports_dir, &payload, chrono::Utc::now().naive_utc())?;
        tracing::info!(path = %path.display(), "report saved");
        println!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
