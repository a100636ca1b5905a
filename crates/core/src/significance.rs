//! Clinical significance scoring.
//!
//! Estimates how much a new clinical digest should change an existing summary by counting
//! keyword indicators. The score is heuristic guidance for the prompt composer; it never
//! forces a particular rewrite.
//!
//! Matching is case-insensitive substring search, so a keyword also matches inside longer
//! words ("stable" matches "unstable"). Each keyword counts at most once regardless of how often
//! it occurs. Critical keywords only count when they are new, that is absent from the previous
//! summary; significant and routine keywords always count.

use crate::constants::{INITIAL_ASSESSMENT, NO_INDICATORS_DETECTED};
use crate::{SummaryError, SummaryResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// Bands and indicators
// ============================================================================

/// Coarse significance level derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignificanceBand {
    Routine,
    Low,
    Moderate,
    High,
}

impl SignificanceBand {
    /// Wire name, matching the serde representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            SignificanceBand::Routine => "ROUTINE",
            SignificanceBand::Low => "LOW",
            SignificanceBand::Moderate => "MODERATE",
            SignificanceBand::High => "HIGH",
        }
    }

    /// Fixed recommendation sentence for the band.
    pub const fn recommendation(self) -> &'static str {
        match self {
            SignificanceBand::High => {
                "HIGH SIGNIFICANCE: Major modifications to previous recommendations may be warranted. Carefully review and update care plans as needed."
            }
            SignificanceBand::Moderate => {
                "MODERATE SIGNIFICANCE: Some modifications to previous recommendations may be appropriate. Add new information while preserving stable elements."
            }
            SignificanceBand::Low => {
                "LOW SIGNIFICANCE: Minimal modifications needed. Focus on adding new information while preserving existing assessments and recommendations."
            }
            SignificanceBand::Routine => {
                "ROUTINE UPDATE: Maintain previous recommendations unless specifically contraindicated. Add routine monitoring information."
            }
        }
    }
}

/// Which keyword set an indicator came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Critical,
    Significant,
    Routine,
}

impl IndicatorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            IndicatorKind::Critical => "critical",
            IndicatorKind::Significant => "significant",
            IndicatorKind::Routine => "routine",
        }
    }

    /// Score contribution of one matched keyword of this kind.
    pub const fn weight(self) -> i32 {
        match self {
            IndicatorKind::Critical => 3,
            IndicatorKind::Significant => 2,
            IndicatorKind::Routine => -1,
        }
    }

    const fn note_prefix(self) -> &'static str {
        match self {
            IndicatorKind::Critical => "Critical indicator detected",
            IndicatorKind::Significant => "Significant clinical change",
            IndicatorKind::Routine => "Routine/stable indicator",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedIndicator {
    pub indicator: String,
    pub kind: IndicatorKind,
}

impl MatchedIndicator {
    /// Human-readable note, for example `Critical indicator detected: sepsis`.
    pub fn note(&self) -> String {
        format!("{}: {}", self.kind.note_prefix(), self.indicator)
    }
}

/// Result of scoring one digest against a previous summary.
///
/// `band` is `None` for the initial assessment, which is produced when there is nothing to
/// compare against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignificanceAssessment {
    pub score: i32,
    pub band: Option<SignificanceBand>,
    pub matched_indicators: Vec<MatchedIndicator>,
}

impl SignificanceAssessment {
    /// The assessment used when no previous summary exists.
    pub fn initial() -> Self {
        Self {
            score: 0,
            band: None,
            matched_indicators: Vec::new(),
        }
    }

    pub fn is_initial(&self) -> bool {
        self.band.is_none()
    }

    /// Render the assessment as the guidance block embedded in incremental prompts.
    pub fn render(&self) -> String {
        let Some(band) = self.band else {
            return INITIAL_ASSESSMENT.to_string();
        };

        let notes = if self.matched_indicators.is_empty() {
            NO_INDICATORS_DETECTED.to_string()
        } else {
            self.matched_indicators
                .iter()
                .map(MatchedIndicator::note)
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "\nCLINICAL SIGNIFICANCE ASSESSMENT:\n\
             Significance Score: {score}\n\
             {recommendation}\n\
             \n\
             Detected Indicators:\n\
             {notes}\n\
             \n\
             GUIDANCE FOR SUMMARY UPDATE:\n\
             - Preserve all stable clinical information and ongoing care plans\n\
             - Only modify recommendations when clinically justified by the new data\n\
             - Maintain professional clinical documentation standards\n\
             - Ensure continuity of care information",
            score = self.score,
            recommendation = band.recommendation(),
        )
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Score thresholds separating the bands. A score at or above `high` is HIGH, and so on down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignificanceThresholds {
    pub high: i32,
    pub moderate: i32,
    pub low: i32,
}

impl Default for SignificanceThresholds {
    fn default() -> Self {
        Self {
            high: 5,
            moderate: 2,
            low: 0,
        }
    }
}

impl SignificanceThresholds {
    pub fn classify(&self, score: i32) -> SignificanceBand {
        if score >= self.high {
            SignificanceBand::High
        } else if score >= self.moderate {
            SignificanceBand::Moderate
        } else if score >= self.low {
            SignificanceBand::Low
        } else {
            SignificanceBand::Routine
        }
    }
}

/// Keyword sets and thresholds used by the [`SignificanceScorer`].
///
/// Loadable from YAML; omitted fields fall back to the built-in defaults:
///
/// ```yaml
/// critical: [sepsis, cardiac arrest]
/// thresholds:
///   high: 6
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignificanceConfig {
    pub critical: Vec<String>,
    pub significant: Vec<String>,
    pub routine: Vec<String>,
    pub thresholds: SignificanceThresholds,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            critical: owned(&[
                "critical",
                "emergent",
                "urgent",
                "deteriorating",
                "unstable",
                "cardiac arrest",
                "respiratory failure",
                "sepsis",
                "shock",
                "acute",
                "severe",
                "crisis",
                "emergency",
            ]),
            significant: owned(&[
                "new diagnosis",
                "medication change",
                "treatment response",
                "improved",
                "worsened",
                "complication",
                "adverse reaction",
                "surgery",
                "procedure",
                "admission",
                "discharge",
            ]),
            routine: owned(&[
                "stable",
                "unchanged",
                "routine",
                "maintenance",
                "follow-up",
                "regular",
                "scheduled",
                "monitoring",
            ]),
            thresholds: SignificanceThresholds::default(),
        }
    }
}

impl SignificanceConfig {
    /// Parse a configuration from YAML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::ConfigParse`] naming the offending path if the YAML does not match
    /// the expected shape, or [`SummaryError::InvalidConfig`] if validation fails.
    pub fn from_yaml_str(yaml: &str) -> SummaryResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml);
        let config = match serde_path_to_error::deserialize::<_, Self>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() { "<root>" } else { path.as_str() };
                return Err(SummaryError::ConfigParse(format!(
                    "{path}: {source}"
                )));
            }
        };
        config.normalised()
    }

    /// Read and parse a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::ConfigRead`] if the file cannot be read, otherwise the errors of
    /// [`SignificanceConfig::from_yaml_str`].
    pub fn load(path: &Path) -> SummaryResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(SummaryError::ConfigRead)?;
        Self::from_yaml_str(&yaml)
    }

    /// Trim and lowercase every keyword, then validate.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::InvalidConfig`] if a keyword is empty, a keyword appears twice,
    /// or the thresholds are not strictly descending (`high > moderate > low`).
    pub fn normalised(self) -> SummaryResult<Self> {
        let normalise = |words: Vec<String>| -> Vec<String> {
            words.into_iter().map(|w| w.trim().to_lowercase()).collect()
        };

        let config = Self {
            critical: normalise(self.critical),
            significant: normalise(self.significant),
            routine: normalise(self.routine),
            thresholds: self.thresholds,
        };

        let mut seen = HashSet::new();
        for (set, words) in [
            ("critical", &config.critical),
            ("significant", &config.significant),
            ("routine", &config.routine),
        ] {
            for word in words {
                if word.is_empty() {
                    return Err(SummaryError::InvalidConfig(format!(
                        "empty keyword in {set} indicators"
                    )));
                }
                if !seen.insert(word.as_str()) {
                    return Err(SummaryError::InvalidConfig(format!(
                        "keyword '{word}' appears more than once"
                    )));
                }
            }
        }

        let t = config.thresholds;
        if !(t.high > t.moderate && t.moderate > t.low) {
            return Err(SummaryError::InvalidConfig(format!(
                "thresholds must be strictly descending (high {}, moderate {}, low {})",
                t.high, t.moderate, t.low
            )));
        }

        Ok(config)
    }
}

// ============================================================================
// Scorer
// ============================================================================

/// Scores digests against the configured keyword sets.
#[derive(Debug, Clone)]
pub struct SignificanceScorer {
    config: SignificanceConfig,
}

impl Default for SignificanceScorer {
    fn default() -> Self {
        Self {
            config: SignificanceConfig::default(),
        }
    }
}

impl SignificanceScorer {
    /// Create a scorer from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::InvalidConfig`] if the configuration fails validation.
    pub fn new(config: SignificanceConfig) -> SummaryResult<Self> {
        Ok(Self {
            config: config.normalised()?,
        })
    }

    pub fn config(&self) -> &SignificanceConfig {
        &self.config
    }

    /// Assess how significant `digest` is relative to `previous`.
    ///
    /// An absent or blank previous summary yields [`SignificanceAssessment::initial`]. Otherwise
    /// each keyword found in the lowercased digest contributes its weight once, and matches are
    /// listed critical first, then significant, then routine, each in configured order. A
    /// critical keyword already present in the previous summary is skipped entirely.
    pub fn assess(&self, previous: Option<&str>, digest: &str) -> SignificanceAssessment {
        let previous = match previous {
            Some(p) if !p.trim().is_empty() => p.to_lowercase(),
            _ => return SignificanceAssessment::initial(),
        };

        let haystack = digest.to_lowercase();
        let mut score = 0;
        let mut matched_indicators = Vec::new();

        for (kind, words) in [
            (IndicatorKind::Critical, &self.config.critical),
            (IndicatorKind::Significant, &self.config.significant),
            (IndicatorKind::Routine, &self.config.routine),
        ] {
            let novel_only = kind == IndicatorKind::Critical;
            for word in words.iter().filter(|w| {
                haystack.contains(w.as_str()) && !(novel_only && previous.contains(w.as_str()))
            }) {
                score += kind.weight();
                matched_indicators.push(MatchedIndicator {
                    indicator: word.clone(),
                    kind,
                });
            }
        }

        SignificanceAssessment {
            score,
            band: Some(self.config.thresholds.classify(score)),
            matched_indicators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREVIOUS: &str = "Patient seen in clinic last month.";

    fn scorer() -> SignificanceScorer {
        SignificanceScorer::default()
    }

    #[test]
    fn missing_previous_gives_initial_assessment() {
        let assessment = scorer().assess(None, "Sepsis and cardiac arrest");
        assert_eq!(assessment, SignificanceAssessment::initial());
        assert!(assessment.is_initial());
        assert_eq!(assessment.render(), INITIAL_ASSESSMENT);

        let blank = scorer().assess(Some("   "), "Sepsis");
        assert!(blank.is_initial(), "blank previous counts as absent");
    }

    #[test]
    fn critical_keywords_reach_high_band() {
        let assessment = scorer().assess(
            Some(PREVIOUS),
            "Conditions: Sepsis (status: active), septic shock",
        );

        assert_eq!(assessment.score, 6);
        assert_eq!(assessment.band, Some(SignificanceBand::High));
        assert_eq!(
            assessment.matched_indicators,
            vec![
                MatchedIndicator {
                    indicator: "sepsis".into(),
                    kind: IndicatorKind::Critical
                },
                MatchedIndicator {
                    indicator: "shock".into(),
                    kind: IndicatorKind::Critical
                },
            ]
        );
    }

    #[test]
    fn novel_critical_keyword_adds_three() {
        let base = "Conditions: hypertension (status: active)";
        let before = scorer().assess(Some(PREVIOUS), base);
        let after = scorer().assess(Some(PREVIOUS), &format!("{base}; sepsis"));
        assert_eq!(after.score - before.score, 3);
    }

    #[test]
    fn critical_keyword_already_in_previous_is_not_counted() {
        let previous = "Admitted last week with sepsis, now on antibiotics.";
        let assessment = scorer().assess(Some(previous), "Sepsis (status: active)");

        assert_eq!(assessment.score, 0);
        assert!(assessment.matched_indicators.is_empty());
    }

    #[test]
    fn significant_keywords_are_not_novelty_gated() {
        let previous = "Surgery planned.";
        let assessment = scorer().assess(Some(previous), "Surgery completed");
        assert_eq!(assessment.score, 2);
    }

    #[test]
    fn keyword_counts_once_however_often_it_appears() {
        let assessment = scorer().assess(Some(PREVIOUS), "surgery; surgery; SURGERY");
        assert_eq!(assessment.score, 2);
        assert_eq!(assessment.matched_indicators.len(), 1);
    }

    #[test]
    fn substring_matching_counts_both_stable_and_unstable() {
        let assessment = scorer().assess(Some(PREVIOUS), "Haemodynamically unstable");

        assert_eq!(assessment.score, 3 - 1);
        assert_eq!(assessment.band, Some(SignificanceBand::Moderate));
        let kinds: Vec<IndicatorKind> = assessment
            .matched_indicators
            .iter()
            .map(|m| m.kind)
            .collect();
        assert_eq!(kinds, vec![IndicatorKind::Critical, IndicatorKind::Routine]);
    }

    #[test]
    fn digest_section_headers_can_match_keywords() {
        let assessment = scorer().assess(
            Some(PREVIOUS),
            "Recent Procedures: Appendectomy performed 2024-03-01 (status: completed)",
        );
        assert_eq!(assessment.score, 2);
        assert_eq!(assessment.matched_indicators[0].indicator, "procedure");
    }

    #[test]
    fn bands_follow_threshold_boundaries() {
        let thresholds = SignificanceThresholds::default();
        assert_eq!(thresholds.classify(5), SignificanceBand::High);
        assert_eq!(thresholds.classify(4), SignificanceBand::Moderate);
        assert_eq!(thresholds.classify(2), SignificanceBand::Moderate);
        assert_eq!(thresholds.classify(1), SignificanceBand::Low);
        assert_eq!(thresholds.classify(0), SignificanceBand::Low);
        assert_eq!(thresholds.classify(-1), SignificanceBand::Routine);
    }

    #[test]
    fn routine_only_digest_is_routine_band() {
        let assessment = scorer().assess(Some(PREVIOUS), "Blood pressure unchanged, routine monitoring");
        assert_eq!(assessment.score, -3);
        assert_eq!(assessment.band, Some(SignificanceBand::Routine));
    }

    #[test]
    fn render_lists_notes_and_guidance() {
        let assessment = scorer().assess(Some(PREVIOUS), "Sepsis after surgery");
        let rendered = assessment.render();

        assert!(rendered.starts_with("\nCLINICAL SIGNIFICANCE ASSESSMENT:\n"));
        assert!(rendered.contains("Significance Score: 5\n"));
        assert!(rendered.contains(SignificanceBand::High.recommendation()));
        assert!(rendered.contains("Critical indicator detected: sepsis"));
        assert!(rendered.contains("Significant clinical change: surgery"));
        assert!(rendered.ends_with("- Ensure continuity of care information"));
    }

    #[test]
    fn render_without_matches_says_so() {
        let assessment = scorer().assess(Some(PREVIOUS), "Patient: Sarah Williams");
        assert_eq!(assessment.score, 0);
        assert!(assessment.render().contains(NO_INDICATORS_DETECTED));
    }

    #[test]
    fn yaml_config_overrides_defaults() {
        let config = SignificanceConfig::from_yaml_str(
            "critical: [\"  Anaphylaxis \"]\nthresholds:\n  high: 3\n  moderate: 1\n  low: 0\n",
        )
        .expect("valid config");

        assert_eq!(config.critical, vec!["anaphylaxis".to_string()]);
        assert_eq!(config.routine, SignificanceConfig::default().routine);

        let scorer = SignificanceScorer::new(config).expect("valid scorer");
        let assessment = scorer.assess(Some(PREVIOUS), "ANAPHYLAXIS after peanut exposure");
        assert_eq!(assessment.score, 3);
        assert_eq!(assessment.band, Some(SignificanceBand::High));
    }

    #[test]
    fn yaml_config_rejects_unknown_fields_with_path() {
        let err = SignificanceConfig::from_yaml_str("thresholds:\n  extreme: 9\n")
            .expect_err("unknown field should fail");
        match err {
            SummaryError::ConfigParse(msg) => assert!(msg.starts_with("thresholds"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn config_rejects_overlapping_keywords() {
        let config = SignificanceConfig {
            routine: vec!["Sepsis".into()],
            ..SignificanceConfig::default()
        };
        let err = SignificanceScorer::new(config).expect_err("duplicate keyword");
        assert!(matches!(err, SummaryError::InvalidConfig(_)));
    }

    #[test]
    fn config_rejects_empty_keywords_and_bad_thresholds() {
        let empty = SignificanceConfig {
            critical: vec!["  ".into()],
            ..SignificanceConfig::default()
        };
        assert!(empty.normalised().is_err());

        let flat = SignificanceConfig {
            thresholds: SignificanceThresholds {
                high: 2,
                moderate: 2,
                low: 0,
            },
            ..SignificanceConfig::default()
        };
        assert!(flat.normalised().is_err());
    }

    #[test]
    fn load_reads_yaml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("significance.yaml");
        std::fs::write(&path, "routine: [steady]\n").expect("write config");

        let config = SignificanceConfig::load(&path).expect("load config");
        assert_eq!(config.routine, vec!["steady".to_string()]);

        let missing = SignificanceConfig::load(&dir.path().join("absent.yaml"));
        assert!(matches!(missing, Err(SummaryError::ConfigRead(_))));
    }

    #[test]
    fn wire_names_match_serde() {
        for band in [
            SignificanceBand::Routine,
            SignificanceBand::Low,
            SignificanceBand::Moderate,
            SignificanceBand::High,
        ] {
            let json = serde_json::to_value(band).expect("serialise band");
            assert_eq!(json, band.as_str());
        }
        for kind in [
            IndicatorKind::Critical,
            IndicatorKind::Significant,
            IndicatorKind::Routine,
        ] {
            let json = serde_json::to_value(kind).expect("serialise kind");
            assert_eq!(json, kind.as_str());
        }
    }
}
