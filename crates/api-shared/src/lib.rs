//! # API Shared
//!
//! Shared definitions for the EHR simulator APIs.
//!
//! Contains:
//! - Wire DTOs with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and the `ehrsim-run` server binary.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
