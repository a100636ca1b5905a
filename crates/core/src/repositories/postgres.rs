//! PostgreSQL-backed stores.
//!
//! Summary saves run in one transaction holding a transaction-scoped advisory lock keyed on
//! `(patient_id, summary_type)`, so the read-max-version / deactivate / insert sequence is
//! serialised per key across every process sharing the database. The unique
//! `(patient_id, summary_type, version)` constraint and the partial unique index on active rows
//! back this up: if a writer that bypasses the lock wins a race, the loser's insert fails with a
//! unique violation and the save is retried from scratch a bounded number of times.

use crate::constants::{MAX_SAVE_ATTEMPTS, PATIENTS_TABLE, SUMMARIES_TABLE};
use crate::repositories::records::{PatientListing, PatientRecordSource, StoredPatient};
use crate::repositories::summaries::{NewSummary, Summary, SummaryStore};
use crate::{PatientId, SummaryError, SummaryResult};
use ehrsim_types::{SummaryType, UnknownSummaryType};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Schema statements, applied in order by [`ensure_schema`]. Every statement is idempotent.
pub const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS patients (
        id BIGSERIAL PRIMARY KEY,
        synthea_id TEXT NOT NULL UNIQUE,
        data JSONB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS patient_summaries (
        id BIGSERIAL PRIMARY KEY,
        patient_id BIGINT NOT NULL REFERENCES patients (id),
        summary_type TEXT NOT NULL CHECK (summary_type IN ('historical', 'current')),
        content TEXT NOT NULL,
        version INTEGER NOT NULL CHECK (version > 0),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        changes_highlighted TEXT,
        CONSTRAINT patient_summaries_version_key UNIQUE (patient_id, summary_type, version)
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS patient_summaries_one_active
        ON patient_summaries (patient_id, summary_type)
        WHERE is_active",
];

/// Create the tables and indexes if they do not already exist.
///
/// # Errors
///
/// Returns [`SummaryError::Database`] if any statement fails.
pub async fn ensure_schema(pool: &PgPool) -> SummaryResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(
        tables = ?[PATIENTS_TABLE, SUMMARIES_TABLE],
        "database schema ready"
    );
    Ok(())
}

fn advisory_lock_key(patient_id: PatientId, summary_type: SummaryType) -> String {
    format!("summary:{patient_id}:{summary_type}")
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

fn summary_from_row(row: &PgRow) -> SummaryResult<Summary> {
    let summary_type: String = row.try_get("summary_type")?;
    let summary_type = summary_type
        .parse()
        .map_err(|e: UnknownSummaryType| SummaryError::CorruptRow(e.to_string()))?;

    Ok(Summary {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        summary_type,
        content: row.try_get("content")?,
        version: row.try_get("version")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        highlighted_content: row.try_get("changes_highlighted")?,
    })
}

const SUMMARY_COLUMNS: &str =
    "id, patient_id, summary_type, content, version, is_active, created_at, changes_highlighted";

/// Summary store over the `patient_summaries` table.
#[derive(Clone)]
pub struct PgSummaryStore {
    pool: PgPool,
}

impl PgSummaryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn try_save(&self, summary: &NewSummary) -> Result<PgRow, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(advisory_lock_key(summary.patient_id, summary.summary_type))
            .execute(&mut *tx)
            .await?;

        let latest: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(version) FROM patient_summaries
             WHERE patient_id = $1 AND summary_type = $2",
        )
        .bind(summary.patient_id)
        .bind(summary.summary_type.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let version = latest.unwrap_or(0) + 1;

        sqlx::query(
            "UPDATE patient_summaries SET is_active = FALSE
             WHERE patient_id = $1 AND summary_type = $2 AND is_active",
        )
        .bind(summary.patient_id)
        .bind(summary.summary_type.as_str())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!(
            "INSERT INTO patient_summaries
                 (patient_id, summary_type, content, version, is_active, changes_highlighted)
             VALUES ($1, $2, $3, $4, TRUE, $5)
             RETURNING {SUMMARY_COLUMNS}"
        ))
        .bind(summary.patient_id)
        .bind(summary.summary_type.as_str())
        .bind(summary.content.as_str())
        .bind(version)
        .bind(summary.highlighted_content.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }
}

#[async_trait::async_trait]
impl SummaryStore for PgSummaryStore {
    async fn get_active(
        &self,
        patient_id: PatientId,
        summary_type: SummaryType,
    ) -> SummaryResult<Option<Summary>> {
        let row = sqlx::query(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM patient_summaries
             WHERE patient_id = $1 AND summary_type = $2 AND is_active"
        ))
        .bind(patient_id)
        .bind(summary_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(summary_from_row).transpose()
    }

    async fn get_history(
        &self,
        patient_id: PatientId,
        summary_type: SummaryType,
    ) -> SummaryResult<Vec<Summary>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM patient_summaries
             WHERE patient_id = $1 AND summary_type = $2
             ORDER BY version DESC"
        ))
        .bind(patient_id)
        .bind(summary_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(summary_from_row).collect()
    }

    async fn save(&self, summary: NewSummary) -> SummaryResult<Summary> {
        for attempt in 1..=MAX_SAVE_ATTEMPTS {
            match self.try_save(&summary).await {
                Ok(row) => {
                    let saved = summary_from_row(&row)?;
                    tracing::info!(
                        patient_id = saved.patient_id,
                        summary_type = %saved.summary_type,
                        version = saved.version,
                        "saved summary"
                    );
                    return Ok(saved);
                }
                Err(err) if is_unique_violation(&err) => {
                    tracing::warn!(
                        patient_id = summary.patient_id,
                        summary_type = %summary.summary_type,
                        attempt,
                        "summary version conflict, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SummaryError::ConcurrentSave {
            patient_id: summary.patient_id,
            summary_type: summary.summary_type,
        })
    }
}

/// Record source over the `patients` table.
#[derive(Clone)]
pub struct PgPatientRecords {
    pool: PgPool,
}

impl PgPatientRecords {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a record, or replace the data of an existing record with the same Synthea id.
    /// Returns the patient id.
    pub async fn upsert(&self, synthea_id: &str, data: &Value) -> SummaryResult<PatientId> {
        let id: PatientId = sqlx::query_scalar(
            "INSERT INTO patients (synthea_id, data) VALUES ($1, $2)
             ON CONFLICT (synthea_id) DO UPDATE SET data = EXCLUDED.data
             RETURNING id",
        )
        .bind(synthea_id)
        .bind(data)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

#[async_trait::async_trait]
impl PatientRecordSource for PgPatientRecords {
    async fn get_patient(&self, id: PatientId) -> SummaryResult<Option<StoredPatient>> {
        let row = sqlx::query("SELECT id, synthea_id, data FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(StoredPatient {
                id: row.try_get("id")?,
                synthea_id: row.try_get("synthea_id")?,
                data: row.try_get("data")?,
            })),
            None => Ok(None),
        }
    }

    async fn list_patients(&self) -> SummaryResult<Vec<PatientListing>> {
        let rows = sqlx::query("SELECT id, synthea_id FROM patients ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> SummaryResult<PatientListing> {
                Ok(PatientListing {
                    id: row.try_get("id")?,
                    synthea_id: row.try_get("synthea_id")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_lock_key_is_per_patient_and_type() {
        assert_eq!(
            advisory_lock_key(12, SummaryType::Current),
            "summary:12:current"
        );
        assert_ne!(
            advisory_lock_key(12, SummaryType::Current),
            advisory_lock_key(12, SummaryType::Historical)
        );
    }

    #[test]
    fn schema_enforces_versioning_constraints() {
        let summaries = SCHEMA[1];
        assert!(summaries.contains("UNIQUE (patient_id, summary_type, version)"));
        assert!(summaries.contains("CHECK (version > 0)"));
        assert!(SCHEMA[2].contains("WHERE is_active"));
        assert!(SCHEMA.iter().all(|s| s.contains("IF NOT EXISTS")));
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    // The tests below run against a live database and are skipped when DATABASE_URL is unset.

    static SCHEMA_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(12)
            .connect(&url)
            .await
            .expect("connect to DATABASE_URL");
        let _guard = SCHEMA_LOCK.lock().await;
        ensure_schema(&pool).await.expect("schema");
        Some(pool)
    }

    async fn fresh_patient(pool: &PgPool, label: &str) -> PatientId {
        let synthea_id = format!(
            "store-test-{label}-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_micros()
        );
        PgPatientRecords::new(pool.clone())
            .upsert(&synthea_id, &serde_json::json!({"resourceType": "Bundle", "entry": []}))
            .await
            .expect("upsert patient")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sequential_saves_version_and_deactivate() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let patient_id = fresh_patient(&pool, "sequential").await;
        let store = PgSummaryStore::new(pool);

        for (expected, content) in [(1, "First."), (2, "Second."), (3, "Third.")] {
            let saved = store
                .save(
                    NewSummary::new(patient_id, SummaryType::Current, content, None)
                        .expect("valid summary"),
                )
                .await
                .expect("save");
            assert_eq!(saved.version, expected);
            assert!(saved.is_active);
        }

        let active = store
            .get_active(patient_id, SummaryType::Current)
            .await
            .expect("active")
            .expect("one active summary");
        assert_eq!(active.version, 3);
        assert_eq!(active.content, "Third.");

        let history = store
            .get_history(patient_id, SummaryType::Current)
            .await
            .expect("history");
        let versions: Vec<i32> = history.iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![3, 2, 1]);
        assert_eq!(history.iter().filter(|s| s.is_active).count(), 1);

        let historical = store
            .get_active(patient_id, SummaryType::Historical)
            .await
            .expect("historical");
        assert!(historical.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_saves_get_distinct_versions() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let patient_id = fresh_patient(&pool, "concurrent").await;
        let store = PgSummaryStore::new(pool);

        const SAVES: i32 = 10;
        let mut handles = Vec::new();
        for i in 0..SAVES {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save(
                        NewSummary::new(
                            patient_id,
                            SummaryType::Historical,
                            &format!("summary {i}"),
                            None,
                        )
                        .expect("valid summary"),
                    )
                    .await
                    .expect("save")
                    .version
            }));
        }

        let mut versions = Vec::new();
        for handle in handles {
            versions.push(handle.await.expect("task joins"));
        }
        versions.sort_unstable();
        assert_eq!(versions, (1..=SAVES).collect::<Vec<i32>>());

        let history = store
            .get_history(patient_id, SummaryType::Historical)
            .await
            .expect("history");
        assert_eq!(history.len(), SAVES as usize);
        assert_eq!(history.iter().filter(|s| s.is_active).count(), 1);
        assert_eq!(history[0].version, SAVES);
        assert!(history[0].is_active);
    }
}
