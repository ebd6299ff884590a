mod cache;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use cache::{SummaryCache, SummaryKey};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spendwatch_core::config::{RunMode, Settings};
use spendwatch_core::dashboard::{build_payload, sources_for, DashboardRequest};
use spendwatch_core::domain::contract::RecommendationInput;
use spendwatch_core::domain::recommendation::{
    CostSnapshot, Recommendation, RecommendationStatus, RoiSummary,
};
use spendwatch_core::storage::SavingsLedger;
use spendwatch_core::time::MAX_WINDOW_DAYS;

const DEFAULT_SNAPSHOT_LIMIT: i64 = 30;

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

    let demo = open_ledger(&settings, RunMode::Demo).await;
    let live = open_ledger(&settings, RunMode::Live).await;

    let state = AppState {
        cache: Arc::new(SummaryCache::new(Duration::from_secs(
            settings.summary_cache_ttl_secs,
        ))),
        settings: Arc::new(settings),
        demo,
        live,
        build_lock: Arc::new(tokio::sync::Mutex::new(())),
    };
    let port = state.settings.port;

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/summary", get(get_summary))
        .route("/api/roi", get(get_roi))
        .route(
            "/api/recommendations",
            get(list_recommendations).post(create_recommendation),
        )
        .route(
            "/api/recommendations/:id/implement",
            post(implement_recommendation),
        )
        .route("/api/recommendations/:id/reject", post(reject_recommendation))
        .route("/api/snapshots/:account", get(get_snapshots))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// A ledger that cannot be opened leaves the API up in degraded mode; its routes answer 503.
async fn open_ledger(settings: &Settings, mode: RunMode) -> Option<SavingsLedger> {
    let path = settings.ledger_path(mode);
    match SavingsLedger::open(path).await {
        Ok(ledger) => Some(ledger),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(
                mode = mode.as_str(),
                path = %path.display(),
                error = %format!("{e:#}"),
                "ledger unavailable; starting API in degraded mode"
            );
            None
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    settings: Arc<Settings>,
    cache: Arc<SummaryCache>,
    demo: Option<SavingsLedger>,
    live: Option<SavingsLedger>,
    // Demo builds reset the demo ledger; one build at a time.
    build_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    fn mode(&self, raw: Option<&str>) -> Result<RunMode, StatusCode> {
        match raw {
            Some(raw) => raw.parse().map_err(|_| StatusCode::BAD_REQUEST),
            None => Ok(self.settings.dashboard_mode),
        }
    }

    fn ledger(&self, mode: RunMode) -> Result<&SavingsLedger, StatusCode> {
        match mode {
            RunMode::Demo => self.demo.as_ref(),
            RunMode::Live => self.live.as_ref(),
        }
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

fn internal(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %format!("{e:#}"), "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

#[derive(Debug, Deserialize)]
struct SummaryParams {
    mode: Option<String>,
    days: Option<u32>,
    budget: Option<f64>,
    accounts: Option<String>,
}

fn check_summary_params(days: u32, budget: f64) -> Result<(), StatusCode> {
    if !(1..=MAX_WINDOW_DAYS).contains(&days) || !budget.is_finite() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}

async fn get_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mode = state.mode(params.mode.as_deref())?;
    let days = params.days.unwrap_or(state.settings.days_to_analyze);
    let budget = params.budget.unwrap_or(state.settings.monthly_budget);
    check_summary_params(days, budget)?;
    let accounts = params
        .accounts
        .unwrap_or_else(|| state.settings.accounts.clone());

    let key = SummaryKey::new(mode, days, budget, &accounts);
    if let Some(hit) = state.cache.get(&key) {
        return Ok(Json(hit.as_ref().clone()));
    }

    let ledger = state.ledger(mode)?;
    let sources = sources_for(&state.settings, mode, &accounts).map_err(|e| {
        tracing::warn!(error = %format!("{e:#}"), "billing sources not configured");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    let today = chrono::Utc::now().date_naive();
    let request = DashboardRequest {
        mode,
        days,
        monthly_budget: budget,
        end: today,
        as_of: today,
    };

    let payload = {
        let _guard = state.build_lock.lock().await;
        build_payload(&request, ledger, &sources)
            .await
            .map_err(internal)?
    };
    let value = serde_json::to_value(&payload).map_err(|e| internal(e.into()))?;
    let cached = state.cache.insert(key, value);
    Ok(Json(cached.as_ref().clone()))
}

#[derive(Debug, Deserialize)]
struct LedgerParams {
    mode: Option<String>,
    status: Option<String>,
    limit: Option<i64>,
}

async fn get_roi(
    State(state): State<AppState>,
    Query(params): Query<LedgerParams>,
) -> Result<Json<RoiSummary>, StatusCode> {
    let ledger = state.ledger(state.mode(params.mode.as_deref())?)?;
    let roi = ledger.roi_summary().await.map_err(internal)?;
    Ok(Json(roi))
}

async fn list_recommendations(
    State(state): State<AppState>,
    Query(params): Query<LedgerParams>,
) -> Result<Json<Vec<Recommendation>>, StatusCode> {
    let ledger = state.ledger(state.mode(params.mode.as_deref())?)?;
    let status = params
        .status
        .as_deref()
        .map(str::parse::<RecommendationStatus>)
        .transpose()
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    let recs = ledger.recommendations(status).await.map_err(internal)?;
    Ok(Json(recs))
}

async fn create_recommendation(
    State(state): State<AppState>,
    Query(params): Query<LedgerParams>,
    Json(input): Json<RecommendationInput>,
) -> Result<(StatusCode, Json<Recommendation>), StatusCode> {
    let ledger = state.ledger(state.mode(params.mode.as_deref())?)?;
    let new = input.validate_and_into_new().map_err(|e| {
        tracing::warn!(error = %e, "rejected recommendation input");
        StatusCode::UNPROCESSABLE_ENTITY
    })?;

    let id = ledger.add_recommendation(&new).await.map_err(internal)?;
    let rec = ledger
        .recommendation(id)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok((StatusCode::CREATED, Json(rec)))
}

#[derive(Debug, Deserialize)]
struct ImplementBody {
    #[serde(default)]
    actual_savings: Option<f64>,
    #[serde(default)]
    notes: Option<String>,
}

async fn implement_recommendation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<LedgerParams>,
    Json(body): Json<ImplementBody>,
) -> Result<Json<Recommendation>, StatusCode> {
    let ledger = state.ledger(state.mode(params.mode.as_deref())?)?;
    let found = ledger
        .mark_implemented(id, body.actual_savings, body.notes.as_deref())
        .await
        .map_err(internal)?;
    if !found {
        return Err(StatusCode::NOT_FOUND);
    }
    fetch_recommendation(ledger, id).await
}

#[derive(Debug, Deserialize)]
struct RejectBody {
    reason: String,
}

async fn reject_recommendation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<LedgerParams>,
    Json(body): Json<RejectBody>,
) -> Result<Json<Recommendation>, StatusCode> {
    let ledger = state.ledger(state.mode(params.mode.as_deref())?)?;
    let found = ledger
        .mark_rejected(id, &body.reason)
        .await
        .map_err(internal)?;
    if !found {
        return Err(StatusCode::NOT_FOUND);
    }
    fetch_recommendation(ledger, id).await
}

async fn fetch_recommendation(
    ledger: &SavingsLedger,
    id: i64,
) -> Result<Json<Recommendation>, StatusCode> {
    ledger
        .recommendation(id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn get_snapshots(
    State(state): State<AppState>,
    Path(account): Path<String>,
    Query(params): Query<LedgerParams>,
) -> Result<Json<Vec<CostSnapshot>>, StatusCode> {
    let ledger = state.ledger(state.mode(params.mode.as_deref())?)?;
    let limit = params.limit.unwrap_or(DEFAULT_SNAPSHOT_LIMIT);
    if limit < 0 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let snapshots = ledger
        .cost_trend(&account, limit)
        .await
        .map_err(internal)?;
    Ok(Json(snapshots))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
