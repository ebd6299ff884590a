use crate::domain::cost::ContributorBreakdown;
use crate::domain::recommendation::{
    CostSnapshot, Effort, NewRecommendation, Recommendation, RecommendationStatus, RiskLevel,
    RoiSummary, RoiTotals,
};
use crate::domain::timestamp;
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqlitePool;
use std::collections::BTreeMap;
use std::path::Path;

const SNAPSHOT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Persistent store of recommendations and cost snapshots. Every call is a single
/// statement; nothing spans calls, and concurrent writers simply overwrite each other.
#[derive(Debug, Clone)]
pub struct SavingsLedger {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct RecommendationRow {
    id: i64,
    created_date: String,
    account_name: Option<String>,
    recommendation_type: String,
    title: String,
    description: Option<String>,
    estimated_monthly_savings: Option<f64>,
    risk_level: Option<String>,
    effort: Option<String>,
    status: Option<String>,
    implemented_date: Option<String>,
    actual_monthly_savings: Option<f64>,
    notes: Option<String>,
}

impl TryFrom<RecommendationRow> for Recommendation {
    type Error = anyhow::Error;

    fn try_from(row: RecommendationRow) -> anyhow::Result<Self> {
        let status = match row.status.as_deref() {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("recommendation {} has a bad status", row.id))?,
            None => RecommendationStatus::Pending,
        };

        Ok(Recommendation {
            id: row.id,
            created_at: timestamp::parse(&row.created_date)
                .with_context(|| format!("recommendation {} has a bad created_date", row.id))?,
            account_name: row.account_name.unwrap_or_else(|| "default".to_string()),
            recommendation_type: row.recommendation_type,
            title: row.title,
            description: row.description.unwrap_or_default(),
            estimated_monthly_savings: row.estimated_monthly_savings.unwrap_or(0.0),
            risk_level: row.risk_level.map(RiskLevel::from).unwrap_or(RiskLevel::Medium),
            effort: row.effort.map(Effort::from).unwrap_or(Effort::Medium),
            status,
            implemented_at: row
                .implemented_date
                .as_deref()
                .map(timestamp::parse)
                .transpose()
                .with_context(|| format!("recommendation {} has a bad implemented_date", row.id))?,
            actual_monthly_savings: row.actual_monthly_savings,
            notes: row.notes,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    id: i64,
    snapshot_date: String,
    account_name: Option<String>,
    total_cost: f64,
    period_days: Option<i64>,
    service_breakdown: Option<String>,
}

impl TryFrom<SnapshotRow> for CostSnapshot {
    type Error = anyhow::Error;

    fn try_from(row: SnapshotRow) -> anyhow::Result<Self> {
        let snapshot_date = NaiveDate::parse_from_str(row.snapshot_date.trim(), SNAPSHOT_DATE_FORMAT)
            .with_context(|| format!("snapshot {} has a bad snapshot_date", row.id))?;

        let contributor_breakdown = row
            .service_breakdown
            .as_deref()
            .map(serde_json::from_str::<BTreeMap<String, f64>>)
            .transpose()
            .with_context(|| format!("snapshot {} has a bad service_breakdown", row.id))?;

        Ok(CostSnapshot {
            id: row.id,
            snapshot_date,
            account_name: row.account_name.unwrap_or_else(|| "default".to_string()),
            total_cost: row.total_cost,
            period_days: row.period_days.unwrap_or(0),
            contributor_breakdown,
        })
    }
}

impl SavingsLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let pool = super::connect(path).await?;
        super::migrate(&pool).await?;
        tracing::debug!(path = %path.display(), "savings ledger opened");
        Ok(Self { pool })
    }

    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = super::connect_in_memory().await?;
        super::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn reset(&self) -> anyhow::Result<()> {
        for statement in [
            "DELETE FROM recommendations",
            "DELETE FROM cost_snapshots",
            "DELETE FROM sqlite_sequence WHERE name IN ('recommendations', 'cost_snapshots')",
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("ledger reset failed: {statement}"))?;
        }
        tracing::info!("savings ledger reset");
        Ok(())
    }

    pub async fn add_recommendation(&self, new: &NewRecommendation) -> anyhow::Result<i64> {
        let created = timestamp::format(&Utc::now().naive_utc());

        let id = sqlx::query(
            "INSERT INTO recommendations \
             (created_date, account_name, recommendation_type, title, description, \
              estimated_monthly_savings, risk_level, effort, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending')",
        )
        .bind(created)
        .bind(&new.account_name)
        .bind(&new.recommendation_type)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.estimated_monthly_savings)
        .bind(new.risk_level.as_str())
        .bind(new.effort.as_str())
        .execute(&self.pool)
        .await
        .context("insert recommendation failed")?
        .last_insert_rowid();

        tracing::info!(
            id,
            title = %new.title,
            estimated = new.estimated_monthly_savings,
            "recommendation recorded"
        );
        Ok(id)
    }

    pub async fn mark_implemented(
        &self,
        id: i64,
        actual_monthly_savings: Option<f64>,
        notes: Option<&str>,
    ) -> anyhow::Result<bool> {
        let implemented = timestamp::format(&Utc::now().naive_utc());

        let res = sqlx::query(
            "UPDATE recommendations \
             SET status = 'implemented', implemented_date = ?1, actual_monthly_savings = ?2, notes = ?3 \
             WHERE id = ?4",
        )
        .bind(implemented)
        .bind(actual_monthly_savings)
        .bind(notes.unwrap_or_default())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("update recommendation (implemented) failed")?;

        let found = res.rows_affected() > 0;
        if found {
            tracing::info!(id, actual = ?actual_monthly_savings, "recommendation implemented");
        } else {
            tracing::warn!(id, "implement: recommendation not found");
        }
        Ok(found)
    }

    pub async fn mark_rejected(&self, id: i64, reason: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE recommendations SET status = 'rejected', notes = ?1 WHERE id = ?2")
            .bind(reason)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("update recommendation (rejected) failed")?;

        let found = res.rows_affected() > 0;
        if !found {
            tracing::warn!(id, "reject: recommendation not found");
        }
        Ok(found)
    }

    pub async fn add_cost_snapshot(
        &self,
        total_cost: f64,
        account_name: &str,
        period_days: i64,
        breakdown: Option<&ContributorBreakdown>,
    ) -> anyhow::Result<i64> {
        let snapshot_date = Utc::now().date_naive().format(SNAPSHOT_DATE_FORMAT).to_string();
        let breakdown_json = breakdown
            .filter(|b| !b.is_empty())
            .map(serde_json::to_string)
            .transpose()
            .context("failed to encode service breakdown")?;

        let id = sqlx::query(
            "INSERT INTO cost_snapshots \
             (snapshot_date, account_name, total_cost, period_days, service_breakdown) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(snapshot_date)
        .bind(account_name)
        .bind(total_cost)
        .bind(period_days)
        .bind(breakdown_json)
        .execute(&self.pool)
        .await
        .context("insert cost snapshot failed")?
        .last_insert_rowid();

        tracing::debug!(id, account = account_name, total_cost, "cost snapshot recorded");
        Ok(id)
    }

    pub async fn roi_summary(&self) -> anyhow::Result<RoiSummary> {
        let (total, implemented, rejected, pending, total_estimated, implemented_estimated, total_actual): (
            i64,
            i64,
            i64,
            i64,
            f64,
            f64,
            f64,
        ) = sqlx::query_as(
            "SELECT \
                COUNT(*), \
                COALESCE(SUM(CASE WHEN status = 'implemented' THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN status = 'rejected' THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0), \
                TOTAL(estimated_monthly_savings), \
                TOTAL(CASE WHEN status = 'implemented' THEN estimated_monthly_savings END), \
                TOTAL(CASE WHEN status = 'implemented' THEN actual_monthly_savings END) \
             FROM recommendations",
        )
        .fetch_one(&self.pool)
        .await
        .context("roi aggregate query failed")?;

        let measured: Vec<(Option<f64>, f64)> = sqlx::query_as(
            "SELECT estimated_monthly_savings, actual_monthly_savings FROM recommendations \
             WHERE status = 'implemented' AND actual_monthly_savings IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .context("roi accuracy query failed")?;
        let measured: Vec<(f64, f64)> = measured
            .into_iter()
            .map(|(est, act)| (est.unwrap_or(0.0), act))
            .collect();

        let totals = RoiTotals {
            total,
            implemented,
            rejected,
            pending,
            total_estimated,
            implemented_estimated,
            total_actual,
        };
        Ok(RoiSummary::from_totals(totals, &measured))
    }

    pub async fn recommendations(
        &self,
        status: Option<RecommendationStatus>,
    ) -> anyhow::Result<Vec<Recommendation>> {
        let rows: Vec<RecommendationRow> = sqlx::query_as(
            "SELECT id, created_date, account_name, recommendation_type, title, description, \
                    estimated_monthly_savings, risk_level, effort, status, implemented_date, \
                    actual_monthly_savings, notes \
             FROM recommendations \
             WHERE ?1 IS NULL OR status = ?1 \
             ORDER BY created_date DESC, id DESC",
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .context("select recommendations failed")?;

        rows.into_iter().map(Recommendation::try_from).collect()
    }

    pub async fn recommendation(&self, id: i64) -> anyhow::Result<Option<Recommendation>> {
        let row: Option<RecommendationRow> = sqlx::query_as(
            "SELECT id, created_date, account_name, recommendation_type, title, description, \
                    estimated_monthly_savings, risk_level, effort, status, implemented_date, \
                    actual_monthly_savings, notes \
             FROM recommendations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("select recommendation failed")?;

        row.map(Recommendation::try_from).transpose()
    }

    pub async fn cost_trend(
        &self,
        account_name: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<CostSnapshot>> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            "SELECT id, snapshot_date, account_name, total_cost, period_days, service_breakdown \
             FROM cost_snapshots \
             WHERE account_name = ?1 \
             ORDER BY snapshot_date DESC, id DESC \
             LIMIT ?2",
        )
        .bind(account_name)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .context("select cost snapshots failed")?;

        rows.into_iter().map(CostSnapshot::try_from).collect()
    }
}
