//! FHIR wire/boundary support for the EHR simulator.
//!
//! Patient records arrive as synthetic FHIR bundles (Synthea output) and are stored verbatim as
//! JSON. This crate provides a tolerant, read-only view over those bundles:
//! - [`Bundle`]: the ordered list of resources in a record
//! - [`Resource`] / [`Element`]: field access by JSON pointer with scalar rendering
//!
//! This crate is NOT a FHIR validator. Missing or oddly-typed fields are reported as
//! absent so that callers can substitute their own fallbacks.

pub mod bundle;

pub use bundle::{Bundle, Element, Resource};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
