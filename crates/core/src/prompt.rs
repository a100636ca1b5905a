//! Prompt composition.
//!
//! Builds the system/user message pair sent to the generative model. Exactly one of three
//! templates applies:
//!
//! - [`PromptTemplate::Historical`] for historical summaries
//! - [`PromptTemplate::CurrentInitial`] for a current summary with no predecessor
//! - [`PromptTemplate::CurrentIncremental`] for a current summary updating a predecessor
//!
//! The composer never contacts a model; see [`crate::generation`].

use crate::significance::SignificanceAssessment;
use ehrsim_types::SummaryType;
use serde::Serialize;

const HISTORICAL_INSTRUCTIONS: &str = "You are a senior clinical assistant with extensive experience in patient care documentation. \n\
Analyze the following patient record statistics and create a comprehensive historical overview for a clinician. \n\
Focus on significant medical conditions, treatment patterns, and overall health trajectory. \n\
Use clear, professional medical language appropriate for clinical documentation.";

const CURRENT_INITIAL_INSTRUCTIONS: &str = "You are a senior clinical assistant creating an initial current summary for a patient. \n\
Analyze the recent patient activity data and create a comprehensive current status summary for the clinical team. \n\
Focus on current conditions, recent interventions, and immediate care needs.";

const CURRENT_INCREMENTAL_INSTRUCTIONS: &str = "You are a senior clinical assistant performing an incremental update to a patient summary. \n\
\n\
CRITICAL INSTRUCTIONS:\n\
1. PRESERVE CONTINUITY: Maintain all existing clinical assessments, recommendations, and care plans unless the new data provides clear evidence requiring changes.\n\
2. INCREMENTAL APPROACH: Only add new information or modify existing information when clinically significant changes are present.\n\
3. EVIDENCE-BASED CHANGES: Only alter previous recommendations if new data shows:\n   \
- Significant improvement or deterioration in patient condition\n   \
- New diagnostic findings that change the clinical picture\n   \
- Treatment responses that warrant care plan modifications\n\
4. MAINTAIN PROFESSIONAL TONE: Use consistent clinical language and formatting.\n\
5. HIGHLIGHT UPDATES: Clearly indicate what is new or changed while preserving the overall summary structure.\n\
\n\
PROCESS:\n\
- Review the previous summary thoroughly\n\
- Analyze new patient data for clinically significant changes\n\
- Consider the clinical significance assessment provided\n\
- Preserve all stable clinical information and ongoing care plans\n\
- Add new findings and updates where appropriate\n\
- Only modify recommendations when clinically justified by new evidence";

const UPDATE_INSTRUCTIONS: &str = "INSTRUCTIONS FOR UPDATE:\n\
1. Start with the existing summary as your foundation\n\
2. Review the clinical significance assessment above to guide your approach\n\
3. Preserve all stable conditions, ongoing treatments, and current care plans\n\
4. Add new findings, observations, or changes in patient status\n\
5. Only modify existing recommendations if the clinical significance assessment and new data provide clear justification\n\
6. Maintain the professional clinical documentation format\n\
7. Ensure the updated summary flows naturally and provides a complete current picture\n\
8. If modifications are made, ensure they are evidence-based and clinically appropriate\n\
\n\
Provide the complete updated clinical summary:";

/// Which template a prompt was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    Historical,
    CurrentInitial,
    CurrentIncremental,
}

impl PromptTemplate {
    /// Pick the template for a summary type. A blank previous summary counts as absent.
    pub fn select(summary_type: SummaryType, previous: Option<&str>) -> Self {
        match (summary_type, non_blank(previous)) {
            (SummaryType::Historical, _) => PromptTemplate::Historical,
            (SummaryType::Current, None) => PromptTemplate::CurrentInitial,
            (SummaryType::Current, Some(_)) => PromptTemplate::CurrentIncremental,
        }
    }
}

/// Instruction payload for one generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptPayload {
    pub template: PromptTemplate,
    pub system_instructions: String,
    pub user_content: String,
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

/// Compose the prompt for a summary request.
///
/// # Arguments
///
/// * `summary_type` - Kind of summary being generated.
/// * `digest` - Clinical digest of the patient record.
/// * `previous` - The active summary being updated, if any. Only used for current summaries.
/// * `assessment` - Significance guidance for incremental updates. Ignored by the other
///   templates and omitted from the prompt when `None`.
pub fn compose(
    summary_type: SummaryType,
    digest: &str,
    previous: Option<&str>,
    assessment: Option<&SignificanceAssessment>,
) -> PromptPayload {
    let template = PromptTemplate::select(summary_type, previous);

    let (system_instructions, user_content) = match (template, non_blank(previous)) {
        (PromptTemplate::CurrentIncremental, Some(previous)) => {
            let mut user = format!(
                "PREVIOUS CLINICAL SUMMARY:\n{previous}\n\nNEW PATIENT DATA TO INTEGRATE:\n{digest}\n\n"
            );
            if let Some(assessment) = assessment {
                user.push_str(&assessment.render());
                user.push_str("\n\n");
            }
            user.push_str(UPDATE_INSTRUCTIONS);
            (CURRENT_INCREMENTAL_INSTRUCTIONS, user)
        }
        (PromptTemplate::CurrentInitial, _) | (PromptTemplate::CurrentIncremental, None) => (
            CURRENT_INITIAL_INSTRUCTIONS,
            format!("Recent Patient Data: {digest}"),
        ),
        (PromptTemplate::Historical, _) => {
            (HISTORICAL_INSTRUCTIONS, format!("Patient Data: {digest}"))
        }
    };

    PromptPayload {
        template,
        system_instructions: system_instructions.to_string(),
        user_content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::significance::SignificanceScorer;

    const DIGEST: &str = "Patient: Sarah Williams (female, DOB: 1980-05-12)";

    #[test]
    fn historical_ignores_previous_summary() {
        let payload = compose(
            SummaryType::Historical,
            DIGEST,
            Some("Earlier summary"),
            None,
        );

        assert_eq!(payload.template, PromptTemplate::Historical);
        assert_eq!(payload.user_content, format!("Patient Data: {DIGEST}"));
        assert!(payload
            .system_instructions
            .contains("comprehensive historical overview"));
        assert!(!payload.user_content.contains("Earlier summary"));
    }

    #[test]
    fn current_without_previous_uses_initial_template() {
        for previous in [None, Some(""), Some(" \n ")] {
            let payload = compose(SummaryType::Current, DIGEST, previous, None);
            assert_eq!(payload.template, PromptTemplate::CurrentInitial);
            assert_eq!(payload.user_content, format!("Recent Patient Data: {DIGEST}"));
            assert!(payload
                .system_instructions
                .contains("initial current summary"));
        }
    }

    #[test]
    fn incremental_embeds_previous_digest_and_assessment() {
        let previous = "Patient stable on metformin.";
        let digest = "Active Conditions: Sepsis (status: active, onset: 2024-01-02)";
        let assessment = SignificanceScorer::default().assess(Some(previous), digest);
        let payload = compose(SummaryType::Current, digest, Some(previous), Some(&assessment));

        assert_eq!(payload.template, PromptTemplate::CurrentIncremental);
        assert!(payload.system_instructions.contains("PRESERVE CONTINUITY"));

        let user = &payload.user_content;
        let prev_at = user.find("PREVIOUS CLINICAL SUMMARY:\nPatient stable on metformin.");
        let data_at = user.find(&format!("NEW PATIENT DATA TO INTEGRATE:\n{digest}"));
        let assess_at = user.find("CLINICAL SIGNIFICANCE ASSESSMENT:");
        let instr_at = user.find("INSTRUCTIONS FOR UPDATE:");
        assert!(prev_at < data_at && data_at < assess_at && assess_at < instr_at);
        assert!(prev_at.is_some());
        assert!(user.contains("Critical indicator detected: sepsis"));
        assert!(user.ends_with("Provide the complete updated clinical summary:"));
    }

    #[test]
    fn incremental_without_assessment_omits_block() {
        let payload = compose(SummaryType::Current, DIGEST, Some("Old summary."), None);
        assert_eq!(payload.template, PromptTemplate::CurrentIncremental);
        assert!(!payload.user_content.contains("CLINICAL SIGNIFICANCE ASSESSMENT"));
        assert!(payload
            .user_content
            .contains("\n\nINSTRUCTIONS FOR UPDATE:\n1. Start with the existing summary"));
    }
}
