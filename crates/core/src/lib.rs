//! # EHR Simulator Core
//!
//! Core logic for incremental clinical summaries.
//!
//! This crate contains the summary pipeline and its storage:
//! - [`digest`]: reduce a FHIR bundle to a compact clinical digest
//! - [`significance`]: score how much a digest should change an existing summary
//! - [`prompt`]: compose the model prompt from one of three templates
//! - [`highlight`]: mark new sentences in a generated summary
//! - [`repositories`]: patient records and versioned summaries (in-memory and PostgreSQL)
//! - [`service`]: orchestration of the above around a [`generation::SummaryGenerator`]
//!
//! **No API concerns**: HTTP servers, DTOs and status-code mapping belong in `api-rest` and
//! `api-shared`; concrete model clients belong in `ehrsim-llm`.

pub mod config;
pub mod constants;
pub mod digest;
pub mod error;
pub mod generation;
pub mod highlight;
pub mod prompt;
pub mod repositories;
pub mod service;
pub mod significance;

pub use config::CoreConfig;
pub use error::{SummaryError, SummaryResult};
pub use generation::{GenerationError, SummaryGenerator};
pub use service::{ActiveSummaries, SummaryDraft, SummaryService};

// Re-export validated types so downstream crates need only depend on the core.
pub use ehrsim_types::{NonEmptyText, SummaryType, TextError, UnknownSummaryType};

/// Database identifier of a stored patient record.
pub type PatientId = i64;
