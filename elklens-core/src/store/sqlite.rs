// SQLite-backed report store shared by the CLI and the web server

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::model::{AnalysisResult, Batch, BatchId, BatchReport};
use crate::store::ReportStore;

pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    /// Opens (creating if missing) the database at `path` in WAL mode and
    /// applies the schema.
    pub async fn open<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        info!("Opening report store at {}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipelineError::storage(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.create_schema().await?;
        Ok(store)
    }

    async fn create_schema(&self) -> PipelineResult<()> {
        let schema_sql = include_str!("../../migrations/001_initial_schema.sql");

        for statement in split_statements(schema_sql) {
            debug!("Executing: {}", &statement[..statement.len().min(80)]);
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// Splits the schema file into statements, dropping `--` comments.
fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let line = match line.find("--") {
            Some(pos) => &line[..pos],
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        current.push_str(line);
        current.push(' ');

        if line.ends_with(';') {
            let statement = current.trim().trim_end_matches(';').trim().to_string();
            if !statement.is_empty() {
                statements.push(statement);
            }
            current.clear();
        }
    }
    statements
}

#[async_trait::async_trait]
impl ReportStore for SqliteReportStore {
    async fn put_batch(&self, batch: &Batch) -> PipelineResult<()> {
        let document = serde_json::to_string(batch)?;
        sqlx::query(
            "INSERT INTO batches (batch_id, entry_count, created_at, document) VALUES (?, ?, ?, ?)
             ON CONFLICT(batch_id) DO UPDATE SET entry_count = excluded.entry_count,
                 created_at = excluded.created_at, document = excluded.document",
        )
        .bind(batch.batch_id().as_str())
        .bind(batch.len() as i64)
        .bind(batch.created_at().to_rfc3339())
        .bind(document)
        .execute(&self.pool)
        .await?;

        debug!("Stored batch {}", batch.batch_id());
        Ok(())
    }

    async fn get_batch(&self, batch_id: &BatchId) -> PipelineResult<Batch> {
        let row: Option<(String,)> = sqlx::query_as("SELECT document FROM batches WHERE batch_id = ?")
            .bind(batch_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((document,)) => Ok(serde_json::from_str(&document)?),
            None => Err(PipelineError::not_found(format!("batch {}", batch_id))),
        }
    }

    async fn put(&self, report: &BatchReport, results: &[AnalysisResult]) -> PipelineResult<()> {
        let document = serde_json::to_string(report)?;
        let generated_at = report.timestamp.to_rfc3339();
        let updated_at = Utc::now().to_rfc3339();
        let mut transaction = self.pool.begin().await?;

        // Write before any read so racing puts queue on the busy timeout
        let updated = sqlx::query(
            "UPDATE batch_reports SET total_errors = ?, high_severity = ?, generated_at = ?,
                 updated_at = ?, document = ?
             WHERE batch_id = ?",
        )
        .bind(report.total_errors as i64)
        .bind(report.summary.high_severity as i64)
        .bind(&generated_at)
        .bind(&updated_at)
        .bind(&document)
        .bind(report.batch_id.as_str())
        .execute(&mut *transaction)
        .await?
        .rows_affected();

        if updated == 0 {
            sqlx::query(
                "INSERT INTO batch_reports (batch_id, total_errors, high_severity, generated_at, updated_at, document)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(report.batch_id.as_str())
            .bind(report.total_errors as i64)
            .bind(report.summary.high_severity as i64)
            .bind(&generated_at)
            .bind(&updated_at)
            .bind(&document)
            .execute(&mut *transaction)
            .await?;
        }

        sqlx::query("DELETE FROM analysis_results WHERE batch_id = ?")
            .bind(report.batch_id.as_str())
            .execute(&mut *transaction)
            .await?;

        for result in results {
            sqlx::query(
                "INSERT INTO analysis_results (batch_id, entry_ref, error_type, severity, document)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(report.batch_id.as_str())
            .bind(result.entry_ref.0 as i64)
            .bind(&result.error_type)
            .bind(result.severity.as_str())
            .bind(serde_json::to_string(result)?)
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;

        if updated > 0 {
            info!("Overwrote existing report for batch {}", report.batch_id);
        } else {
            debug!("Stored report for batch {}", report.batch_id);
        }
        Ok(())
    }

    async fn get(&self, batch_id: &BatchId) -> PipelineResult<BatchReport> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT document FROM batch_reports WHERE batch_id = ?")
                .bind(batch_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((document,)) => Ok(serde_json::from_str(&document)?),
            None => Err(PipelineError::not_found(format!("analysis for batch {}", batch_id))),
        }
    }

    async fn get_results(&self, batch_id: &BatchId) -> PipelineResult<Vec<AnalysisResult>> {
        let mut transaction = self.pool.begin().await?;

        let report: Option<(String,)> =
            sqlx::query_as("SELECT batch_id FROM batch_reports WHERE batch_id = ?")
                .bind(batch_id.as_str())
                .fetch_optional(&mut *transaction)
                .await?;
        if report.is_none() {
            return Err(PipelineError::not_found(format!("analysis for batch {}", batch_id)));
        }

        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT document FROM analysis_results WHERE batch_id = ? ORDER BY entry_ref",
        )
        .bind(batch_id.as_str())
        .fetch_all(&mut *transaction)
        .await?;
        transaction.commit().await?;

        rows.into_iter()
            .map(|(document,)| serde_json::from_str(&document).map_err(PipelineError::from))
            .collect()
    }
}
