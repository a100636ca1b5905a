//! Storage for patient records and versioned summaries.
//!
//! Each concern has a trait with an in-process implementation (tests and the standalone
//! development server) and a PostgreSQL implementation in [`postgres`].

pub mod postgres;
pub mod records;
pub mod summaries;
