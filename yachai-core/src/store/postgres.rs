use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{ReportStore, StoreError};
use crate::models::{ClaimReport, FinalVerdict, NewReport};

const SCHEMA: &str = include_str!("../../migrations/001_claim_reports.sql");

/// PostgreSQL-backed store. Ids come from a `BIGSERIAL`, so concurrent
/// inserts never collide; each verdict update touches one row.
#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: i64,
    text: String,
    created_at: DateTime<Utc>,
    score: i32,
    verdict: String,
    justification: String,
    final_verdict: Option<String>,
}

impl ReportRow {
    fn into_domain(self) -> Result<ClaimReport, StoreError> {
        let final_verdict = self
            .final_verdict
            .map(|label| {
                label
                    .parse::<FinalVerdict>()
                    .map_err(|e| StoreError::InvalidValue(e.to_string()))
            })
            .transpose()?;

        Ok(ClaimReport {
            id: self.id,
            text: self.text,
            timestamp: self.created_at,
            score: self.score,
            verdict: self.verdict,
            justification: self.justification,
            final_verdict,
        })
    }
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `claim_reports` table and indexes if missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn insert(&self, report: NewReport) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO claim_reports (text, score, verdict, justification)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&report.text)
        .bind(report.score.clamp(0, 100))
        .bind(&report.verdict)
        .bind(&report.justification)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id = row.0, "Inserted report");
        Ok(row.0)
    }

    async fn list_all(&self) -> Result<Vec<ClaimReport>, StoreError> {
        let rows: Vec<ReportRow> = sqlx::query_as(
            r#"
            SELECT id, text, created_at, score, verdict, justification, final_verdict
            FROM claim_reports
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReportRow::into_domain).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<ClaimReport>, StoreError> {
        let row: Option<ReportRow> = sqlx::query_as(
            r#"
            SELECT id, text, created_at, score, verdict, justification, final_verdict
            FROM claim_reports
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReportRow::into_domain).transpose()
    }

    async fn update_final_verdict(&self, id: i64, verdict: FinalVerdict) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE claim_reports SET final_verdict = $1 WHERE id = $2")
            .bind(verdict.label())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        tracing::debug!(id, verdict = %verdict, "Updated final verdict");
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<ClaimReport>, StoreError> {
        let rows: Vec<ReportRow> = sqlx::query_as(
            r#"
            SELECT id, text, created_at, score, verdict, justification, final_verdict
            FROM claim_reports
            WHERE final_verdict IS NULL
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReportRow::into_domain).collect()
    }

    async fn health(&self) -> Result<String, StoreError> {
        Ok(crate::db::health_check(&self.pool).await?)
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
