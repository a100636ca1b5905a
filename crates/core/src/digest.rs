//! Clinical data reduction.
//!
//! Turns a patient's FHIR bundle into a compact, line-oriented text digest suitable for a
//! language-model prompt. The digest is a pure function of the record, the window and the
//! section limits.
//!
//! Line order is fixed: demographics, conditions, medications, vitals, labs, encounters,
//! procedures, allergies, care plans, then counts of every other resource kind. Sections with no
//! items are omitted.

use crate::constants::{NO_CLINICAL_DATA, NO_RELEVANT_CLINICAL_DATA};
use fhir::{Bundle, Resource};
use serde::{Deserialize, Serialize};

/// Per-section caps applied when rendering a digest.
///
/// Conditions and medications keep their first N items; vitals, labs, encounters and procedures
/// keep their last N. Allergies and care plans are never capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DigestLimits {
    pub conditions: usize,
    pub medications: usize,
    pub vitals: usize,
    pub labs: usize,
    pub encounters: usize,
    pub procedures: usize,
}

impl Default for DigestLimits {
    fn default() -> Self {
        Self {
            conditions: 5,
            medications: 10,
            vitals: 5,
            labs: 10,
            encounters: 3,
            procedures: 5,
        }
    }
}

/// Reduces patient records to text digests.
#[derive(Debug, Clone, Default)]
pub struct ClinicalDataReducer {
    limits: DigestLimits,
}

impl ClinicalDataReducer {
    pub fn new(limits: DigestLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &DigestLimits {
        &self.limits
    }

    /// Produce the digest for a patient record.
    ///
    /// # Arguments
    ///
    /// * `record` - The patient's bundle, or `None` when no record exists.
    /// * `window` - When `Some(n)` with `n > 0`, only the last `n` entries of the record are
    ///   considered. `None` and `Some(0)` both mean the whole record.
    ///
    /// # Returns
    ///
    /// The digest text, or [`NO_CLINICAL_DATA`] for an absent or empty record. A record whose
    /// resources produce no lines yields [`NO_RELEVANT_CLINICAL_DATA`].
    pub fn reduce(&self, record: Option<&Bundle>, window: Option<usize>) -> String {
        let Some(record) = record.filter(|r| !r.is_empty()) else {
            return NO_CLINICAL_DATA.to_string();
        };

        let resources = match window {
            Some(n) if n > 0 => record.last(n),
            _ => record.resources(),
        };

        let mut sections = Sections::default();
        for resource in resources {
            sections.collect(resource);
        }
        sections.render(&self.limits)
    }
}

#[derive(Default)]
struct Sections {
    patient: Option<String>,
    conditions: Vec<String>,
    medications: Vec<String>,
    vitals: Vec<String>,
    labs: Vec<String>,
    encounters: Vec<String>,
    procedures: Vec<String>,
    allergies: Vec<String>,
    care_plans: Vec<String>,
    // First-seen order.
    other: Vec<(String, usize)>,
}

fn or(value: Option<String>, fallback: &str) -> String {
    value.unwrap_or_else(|| fallback.to_string())
}

fn first_n(items: &[String], n: usize) -> &[String] {
    &items[..items.len().min(n)]
}

fn last_n(items: &[String], n: usize) -> &[String] {
    &items[items.len().saturating_sub(n)..]
}

impl Sections {
    fn collect(&mut self, r: &Resource) {
        match r.resource_type() {
            Some("Patient") => {
                if self.patient.is_some() {
                    return;
                }
                let given = r.text("/name/0/given/0").unwrap_or_default();
                let family = r.text("/name/0/family").unwrap_or_default();
                let name = format!("{given} {family}").trim().to_string();
                let name = if name.is_empty() {
                    "Unknown".to_string()
                } else {
                    name
                };
                self.patient = Some(format!(
                    "Patient: {name} ({}, DOB: {})",
                    or(r.text("/gender"), "Unknown"),
                    or(r.text("/birthDate"), "Unknown"),
                ));
            }
            Some("Condition") => self.conditions.push(format!(
                "{} (status: {}, onset: {})",
                or(r.text("/code/text"), "Unknown condition"),
                or(r.text("/clinicalStatus/coding/0/code"), "Unknown"),
                or(
                    r.text("/onsetDateTime").or_else(|| r.text("/onsetString")),
                    "Unknown onset"
                ),
            )),
            Some("MedicationStatement" | "MedicationRequest") => self.medications.push(format!(
                "{} - {} (status: {})",
                or(
                    r.text("/medicationCodeableConcept/text"),
                    "Unknown medication"
                ),
                or(r.text("/dosage/0/text"), "Unknown dosage"),
                or(r.text("/status"), "Unknown"),
            )),
            Some("Observation") => {
                let value = or(
                    r.text("/valueQuantity/value")
                        .or_else(|| r.text("/valueString")),
                    "Unknown value",
                );
                let unit = r.text("/valueQuantity/unit").unwrap_or_default();
                let item = format!(
                    "{}: {value} {unit}",
                    or(r.text("/code/text"), "Unknown observation")
                )
                .trim()
                .to_string();

                let categories: Vec<String> = r
                    .items("/category")
                    .map(|c| or(c.text("/coding/0/display"), "Unknown").to_lowercase())
                    .collect();
                if categories.iter().any(|c| c.contains("vital")) {
                    self.vitals.push(item.clone());
                }
                if categories.iter().any(|c| c.contains("laboratory")) {
                    self.labs.push(item);
                }
            }
            Some("Encounter") => self.encounters.push(format!(
                "{} on {} (status: {})",
                or(r.text("/type/0/text"), "Unknown encounter"),
                or(r.text("/period/start"), "Unknown date"),
                or(r.text("/status"), "Unknown"),
            )),
            Some("Procedure") => self.procedures.push(format!(
                "{} performed {} (status: {})",
                or(r.text("/code/text"), "Unknown procedure"),
                or(
                    r.text("/performedDateTime")
                        .or_else(|| r.text("/performedString")),
                    "Unknown date"
                ),
                or(r.text("/status"), "Unknown"),
            )),
            Some("AllergyIntolerance") => self.allergies.push(format!(
                "{} (criticality: {}, type: {})",
                or(r.text("/code/text"), "Unknown allergen"),
                or(r.text("/criticality"), "Unknown"),
                or(r.text("/type"), "Unknown"),
            )),
            Some("CarePlan") => self.care_plans.push(format!(
                "{} (status: {}, intent: {})",
                or(r.text("/title"), "Unknown care plan"),
                or(r.text("/status"), "Unknown"),
                or(r.text("/intent"), "Unknown"),
            )),
            other => {
                let kind = other.unwrap_or("Unknown");
                match self.other.iter_mut().find(|(k, _)| k == kind) {
                    Some((_, count)) => *count += 1,
                    None => self.other.push((kind.to_string(), 1)),
                }
            }
        }
    }

    fn render(&self, limits: &DigestLimits) -> String {
        let mut lines = Vec::new();

        if let Some(patient) = &self.patient {
            lines.push(patient.clone());
        }

        let sections: [(&str, &[String]); 8] = [
            (
                "Active Conditions",
                first_n(&self.conditions, limits.conditions),
            ),
            (
                "Current Medications",
                first_n(&self.medications, limits.medications),
            ),
            ("Recent Vital Signs", last_n(&self.vitals, limits.vitals)),
            ("Recent Lab Results", last_n(&self.labs, limits.labs)),
            (
                "Recent Encounters",
                last_n(&self.encounters, limits.encounters),
            ),
            (
                "Recent Procedures",
                last_n(&self.procedures, limits.procedures),
            ),
            ("Known Allergies", &self.allergies),
            ("Active Care Plans", &self.care_plans),
        ];
        for (label, items) in sections {
            if !items.is_empty() {
                lines.push(format!("{label}: {}", items.join("; ")));
            }
        }

        if !self.other.is_empty() {
            let counts: Vec<String> = self
                .other
                .iter()
                .map(|(kind, count)| format!("{count} {kind}(s)"))
                .collect();
            lines.push(format!("Additional Resources: {}", counts.join("; ")));
        }

        if lines.is_empty() {
            return NO_RELEVANT_CLINICAL_DATA.to_string();
        }
        lines.join("\n")
    }
}
