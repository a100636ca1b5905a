//! Request and response bodies shared by the HTTP surfaces.
//!
//! Every type derives `serde` and `utoipa::ToSchema` so the same definitions drive both the JSON
//! wire format and the OpenAPI document. Conversions from core types live next to the DTOs.

use ehrsim_core::repositories::records::{PatientListing, StoredPatient};
use ehrsim_core::repositories::summaries::Summary;
use ehrsim_core::significance::SignificanceAssessment;
use ehrsim_core::{ActiveSummaries, SummaryDraft};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_summary_type() -> String {
    "historical".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

// ============================================================================
// Patients
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientListItem {
    pub id: i64,
    pub synthea_id: String,
}

impl From<PatientListing> for PatientListItem {
    fn from(listing: PatientListing) -> Self {
        Self {
            id: listing.id,
            synthea_id: listing.synthea_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientRecordRes {
    pub id: i64,
    pub synthea_id: String,
    /// The stored FHIR bundle, unchanged.
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

impl From<StoredPatient> for PatientRecordRes {
    fn from(patient: StoredPatient) -> Self {
        Self {
            id: patient.id,
            synthea_id: patient.synthea_id,
            data: patient.data,
        }
    }
}

/// Query string for the digest endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DigestQuery {
    #[serde(default = "default_summary_type")]
    pub summary_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DigestRes {
    pub patient_id: i64,
    pub summary_type: String,
    pub digest: String,
}

// ============================================================================
// Summaries
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SummarizeReq {
    /// `historical` (default) or `current`.
    #[serde(default = "default_summary_type")]
    pub summary_type: String,
}

impl Default for SummarizeReq {
    fn default() -> Self {
        Self {
            summary_type: default_summary_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct IndicatorRes {
    pub indicator: String,
    /// `critical`, `significant` or `routine`.
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AssessmentRes {
    pub score: i32,
    /// `None` for the initial assessment.
    pub band: Option<String>,
    pub matched_indicators: Vec<IndicatorRes>,
    /// Guidance block as sent to the model.
    pub guidance: String,
}

impl From<SignificanceAssessment> for AssessmentRes {
    fn from(assessment: SignificanceAssessment) -> Self {
        let guidance = assessment.render();
        Self {
            score: assessment.score,
            band: assessment.band.map(|band| band.as_str().to_string()),
            matched_indicators: assessment
                .matched_indicators
                .into_iter()
                .map(|m| IndicatorRes {
                    kind: m.kind.as_str().to_string(),
                    indicator: m.indicator,
                })
                .collect(),
            guidance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SummarizeRes {
    pub summary: String,
    /// Only present for current summaries.
    pub highlighted_html: Option<String>,
    pub has_previous: bool,
    pub digest: String,
    pub assessment: Option<AssessmentRes>,
}

impl From<SummaryDraft> for SummarizeRes {
    fn from(draft: SummaryDraft) -> Self {
        Self {
            summary: draft.summary,
            highlighted_html: draft.highlighted_html,
            has_previous: draft.has_previous,
            digest: draft.digest,
            assessment: draft.assessment.map(AssessmentRes::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActiveSummaryRes {
    pub content: String,
    pub highlighted_html: Option<String>,
    pub version: i32,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl From<Summary> for ActiveSummaryRes {
    fn from(summary: Summary) -> Self {
        Self {
            content: summary.content,
            highlighted_html: summary.highlighted_content,
            version: summary.version,
            created_at: summary.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActiveSummariesRes {
    pub historical: Option<ActiveSummaryRes>,
    pub current: Option<ActiveSummaryRes>,
}

impl From<ActiveSummaries> for ActiveSummariesRes {
    fn from(active: ActiveSummaries) -> Self {
        Self {
            historical: active.historical.map(ActiveSummaryRes::from),
            current: active.current.map(ActiveSummaryRes::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryItem {
    pub version: i32,
    pub content: String,
    pub created_at: String,
}

impl From<Summary> for HistoryItem {
    fn from(summary: Summary) -> Self {
        Self {
            version: summary.version,
            content: summary.content,
            created_at: summary.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SaveSummaryReq {
    #[serde(rename = "type", default)]
    pub summary_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub highlighted_html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SaveSummaryRes {
    pub status: String,
    pub version: i32,
}
