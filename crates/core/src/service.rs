//! Summary orchestration.
//!
//! [`SummaryService`] ties the pure components together: it fetches the stored record, reduces
//! it to a digest, scores it against the active summary, composes the prompt, calls the
//! configured [`SummaryGenerator`] under a timeout and highlights the result. Generated drafts
//! are returned to the caller and only persisted through an explicit [`SummaryService::save`].
//!
//! ## Pure Data Operations
//!
//! No HTTP concerns live here. Status-code mapping belongs in `api-rest`.

use crate::config::CoreConfig;
use crate::digest::ClinicalDataReducer;
use crate::generation::{GenerationError, SummaryGenerator};
use crate::highlight::highlight;
use crate::prompt::{compose, PromptTemplate};
use crate::repositories::records::{PatientListing, PatientRecordSource, StoredPatient};
use crate::repositories::summaries::{NewSummary, Summary, SummaryStore};
use crate::significance::{SignificanceAssessment, SignificanceScorer};
use crate::{PatientId, SummaryError, SummaryResult};
use ehrsim_types::SummaryType;
use serde::Serialize;
use std::sync::Arc;

/// A generated, unsaved summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryDraft {
    pub patient_id: PatientId,
    pub summary_type: SummaryType,
    pub summary: String,
    /// Change-highlighted HTML; only produced for current summaries.
    pub highlighted_html: Option<String>,
    pub has_previous: bool,
    /// The digest the model was given.
    pub digest: String,
    /// Significance guidance; only produced for current summaries.
    pub assessment: Option<SignificanceAssessment>,
    pub template: PromptTemplate,
}

/// The active summary of each type for one patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActiveSummaries {
    pub historical: Option<Summary>,
    pub current: Option<Summary>,
}

/// Service for generating, saving and reading patient summaries.
#[derive(Clone)]
pub struct SummaryService {
    cfg: Arc<CoreConfig>,
    reducer: ClinicalDataReducer,
    scorer: SignificanceScorer,
    records: Arc<dyn PatientRecordSource>,
    summaries: Arc<dyn SummaryStore>,
    generator: Arc<dyn SummaryGenerator>,
}

impl SummaryService {
    /// Creates a new summary service.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Core configuration (window, timeout, significance keywords, digest limits)
    /// * `records` - Source of stored patient records
    /// * `summaries` - Versioned summary store
    /// * `generator` - Generative model backend
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::InvalidConfig`] if the significance configuration is invalid.
    pub fn new(
        cfg: Arc<CoreConfig>,
        records: Arc<dyn PatientRecordSource>,
        summaries: Arc<dyn SummaryStore>,
        generator: Arc<dyn SummaryGenerator>,
    ) -> SummaryResult<Self> {
        let scorer = SignificanceScorer::new(cfg.significance().clone())?;
        let reducer = ClinicalDataReducer::new(*cfg.digest_limits());
        Ok(Self {
            cfg,
            reducer,
            scorer,
            records,
            summaries,
            generator,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    async fn require_patient(&self, patient_id: PatientId) -> SummaryResult<StoredPatient> {
        self.records
            .get_patient(patient_id)
            .await?
            .ok_or(SummaryError::PatientNotFound(patient_id))
    }

    fn window_for(&self, summary_type: SummaryType) -> Option<usize> {
        match summary_type {
            SummaryType::Historical => None,
            SummaryType::Current => Some(self.cfg.current_window()),
        }
    }

    pub async fn list_patients(&self) -> SummaryResult<Vec<PatientListing>> {
        self.records.list_patients().await
    }

    /// Fetch a stored patient record.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::PatientNotFound`] if no record exists.
    pub async fn get_patient(&self, patient_id: PatientId) -> SummaryResult<StoredPatient> {
        self.require_patient(patient_id).await
    }

    /// The digest the model would see for a summary of `summary_type`.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::PatientNotFound`] if no record exists.
    pub async fn digest(
        &self,
        patient_id: PatientId,
        summary_type: SummaryType,
    ) -> SummaryResult<String> {
        let patient = self.require_patient(patient_id).await?;
        let bundle = patient.bundle();
        Ok(self
            .reducer
            .reduce(Some(&bundle), self.window_for(summary_type)))
    }

    /// Generate a new summary without saving it.
    ///
    /// Historical summaries use the whole record and the historical template. Current summaries
    /// use the configured trailing window, are scored against the active current summary, and
    /// come back with change-highlighted HTML.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`SummaryError::PatientNotFound`] if no record exists
    /// - [`SummaryError::Generation`] if the model fails, times out or returns blank text
    /// - [`SummaryError::Database`] if a store lookup fails
    pub async fn summarise(
        &self,
        patient_id: PatientId,
        summary_type: SummaryType,
    ) -> SummaryResult<SummaryDraft> {
        let patient = self.require_patient(patient_id).await?;

        let previous = match summary_type {
            SummaryType::Current => self
                .summaries
                .get_active(patient_id, summary_type)
                .await?
                .map(|s| s.content),
            SummaryType::Historical => None,
        };
        let previous = previous.as_deref();

        let bundle = patient.bundle();
        let digest = self
            .reducer
            .reduce(Some(&bundle), self.window_for(summary_type));
        tracing::debug!(patient_id, %summary_type, chars = digest.len(), "digest built");

        let assessment = match summary_type {
            SummaryType::Current => Some(self.scorer.assess(previous, &digest)),
            SummaryType::Historical => None,
        };

        let prompt = compose(summary_type, &digest, previous, assessment.as_ref());
        tracing::info!(
            patient_id,
            %summary_type,
            template = ?prompt.template,
            score = ?assessment.as_ref().map(|a| a.score),
            generator = self.generator.name(),
            "generating summary"
        );

        let timeout = self.cfg.generation_timeout();
        let generated = tokio::time::timeout(timeout, self.generator.generate(&prompt))
            .await
            .map_err(|_| GenerationError::Timeout(timeout))
            .and_then(|result| result)
            .and_then(|text| {
                if text.trim().is_empty() {
                    Err(GenerationError::EmptyResponse)
                } else {
                    Ok(text)
                }
            });

        let summary = match generated {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(patient_id, %summary_type, error = %err, "summary generation failed");
                return Err(err.into());
            }
        };

        let highlighted_html = match summary_type {
            SummaryType::Current => Some(highlight(previous, &summary)),
            SummaryType::Historical => None,
        };

        tracing::info!(
            patient_id,
            %summary_type,
            band = ?assessment.as_ref().and_then(|a| a.band),
            "summary generated"
        );

        Ok(SummaryDraft {
            patient_id,
            summary_type,
            summary,
            highlighted_html,
            has_previous: previous.is_some_and(|p| !p.trim().is_empty()),
            digest,
            assessment,
            template: prompt.template,
        })
    }

    /// Save `content` as the next active version.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::EmptyContent`] for blank content, before the store is touched,
    /// [`SummaryError::PatientNotFound`] if no record exists, or a storage error.
    pub async fn save(
        &self,
        patient_id: PatientId,
        summary_type: SummaryType,
        content: &str,
        highlighted_content: Option<String>,
    ) -> SummaryResult<Summary> {
        let summary = NewSummary::new(patient_id, summary_type, content, highlighted_content)?;
        self.require_patient(patient_id).await?;
        self.summaries.save(summary).await
    }

    pub async fn active_summaries(&self, patient_id: PatientId) -> SummaryResult<ActiveSummaries> {
        Ok(ActiveSummaries {
            historical: self
                .summaries
                .get_active(patient_id, SummaryType::Historical)
                .await?,
            current: self
                .summaries
                .get_active(patient_id, SummaryType::Current)
                .await?,
        })
    }

    /// All versions of one summary type, newest first.
    pub async fn history(
        &self,
        patient_id: PatientId,
        summary_type: SummaryType,
    ) -> SummaryResult<Vec<Summary>> {
        self.summaries.get_history(patient_id, summary_type).await
    }
}
