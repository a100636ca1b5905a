//! Constants used throughout the EHR simulator core crate.
//!
//! Literal texts that end up inside prompts or rendered HTML live here so that every component
//! renders them identically.

/// Default number of trailing record entries used for current summaries.
pub const DEFAULT_CURRENT_WINDOW: usize = 10;

/// Default upper bound on one generation request.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;

/// Digest returned for an absent or empty patient record.
pub const NO_CLINICAL_DATA: &str = "No clinical data available.";

/// Digest returned when a record has entries but none of them produce a digest line.
pub const NO_RELEVANT_CLINICAL_DATA: &str = "No relevant clinical data found in patient record.";

/// Assessment text used when there is no previous summary to compare against.
pub const INITIAL_ASSESSMENT: &str = "Initial summary - no previous data to compare.";

/// Rendered when an assessment matched no indicators.
pub const NO_INDICATORS_DETECTED: &str = "No specific clinical change indicators detected.";

/// CSS class of the wrapper element around highlighted summaries.
pub const SUMMARY_CONTENT_CLASS: &str = "summary-content";

/// CSS class marking new or changed sentences.
pub const HIGHLIGHT_NEW_CLASS: &str = "highlight-new";

/// Number of attempts a store makes when a concurrent writer claims the same version.
pub const MAX_SAVE_ATTEMPTS: u32 = 3;

/// Table holding stored patient records.
pub const PATIENTS_TABLE: &str = "patients";

/// Table holding versioned summaries.
pub const SUMMARIES_TABLE: &str = "patient_summaries";
