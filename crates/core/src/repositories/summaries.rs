//! Versioned summary storage.
//!
//! Summaries are append-only per `(patient_id, summary_type)`: every save creates the next
//! version and makes it the single active row, deactivating its predecessor in the same atomic
//! step. Rows are never mutated otherwise and never deleted.

use crate::{PatientId, SummaryResult};
use chrono::{DateTime, Utc};
use ehrsim_types::{NonEmptyText, SummaryType};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// One stored version of a patient summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub id: i64,
    pub patient_id: PatientId,
    pub summary_type: SummaryType,
    pub content: String,
    pub version: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub highlighted_content: Option<String>,
}

/// A validated summary waiting to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSummary {
    pub patient_id: PatientId,
    pub summary_type: SummaryType,
    pub content: NonEmptyText,
    pub highlighted_content: Option<String>,
}

impl NewSummary {
    /// Validate raw input into a [`NewSummary`].
    ///
    /// Blank highlighted content is stored as absent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SummaryError::EmptyContent`] if `content` is empty after trimming.
    pub fn new(
        patient_id: PatientId,
        summary_type: SummaryType,
        content: &str,
        highlighted_content: Option<String>,
    ) -> SummaryResult<Self> {
        Ok(Self {
            patient_id,
            summary_type,
            content: NonEmptyText::new(content)?,
            highlighted_content: highlighted_content.filter(|h| !h.trim().is_empty()),
        })
    }
}

/// Storage for versioned summaries.
///
/// Implementations must make `save` atomic per `(patient_id, summary_type)`: concurrent saves for
/// the same key are serialised so that versions never collide and at most one row is active.
#[async_trait::async_trait]
pub trait SummaryStore: Send + Sync {
    /// The active summary for the key, if any has been saved.
    async fn get_active(
        &self,
        patient_id: PatientId,
        summary_type: SummaryType,
    ) -> SummaryResult<Option<Summary>>;

    /// Every version for the key, newest first.
    async fn get_history(
        &self,
        patient_id: PatientId,
        summary_type: SummaryType,
    ) -> SummaryResult<Vec<Summary>>;

    /// Store `summary` as the next active version and return the stored row.
    async fn save(&self, summary: NewSummary) -> SummaryResult<Summary>;
}

#[derive(Default)]
struct InMemoryState {
    next_id: i64,
    rows: HashMap<(PatientId, SummaryType), Vec<Summary>>,
}

/// Process-local summary store.
///
/// All operations go through one async mutex, which makes every save trivially atomic. Used by
/// tests and the standalone development server.
#[derive(Default)]
pub struct InMemorySummaryStore {
    state: Mutex<InMemoryState>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SummaryStore for InMemorySummaryStore {
    async fn get_active(
        &self,
        patient_id: PatientId,
        summary_type: SummaryType,
    ) -> SummaryResult<Option<Summary>> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .get(&(patient_id, summary_type))
            .and_then(|rows| rows.iter().find(|s| s.is_active))
            .cloned())
    }

    async fn get_history(
        &self,
        patient_id: PatientId,
        summary_type: SummaryType,
    ) -> SummaryResult<Vec<Summary>> {
        let state = self.state.lock().await;
        let mut history = state
            .rows
            .get(&(patient_id, summary_type))
            .cloned()
            .unwrap_or_default();
        history.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(history)
    }

    async fn save(&self, summary: NewSummary) -> SummaryResult<Summary> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = state.next_id;

        let rows = state
            .rows
            .entry((summary.patient_id, summary.summary_type))
            .or_default();
        let version = rows.iter().map(|s| s.version).max().unwrap_or(0) + 1;
        for row in rows.iter_mut() {
            row.is_active = false;
        }

        let saved = Summary {
            id,
            patient_id: summary.patient_id,
            summary_type: summary.summary_type,
            content: summary.content.into_inner(),
            version,
            is_active: true,
            created_at: Utc::now(),
            highlighted_content: summary.highlighted_content,
        };
        rows.push(saved.clone());

        tracing::debug!(
            patient_id = saved.patient_id,
            summary_type = %saved.summary_type,
            version = saved.version,
            "saved summary"
        );
        Ok(saved)
    }
}
