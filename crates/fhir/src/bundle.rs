//! Tolerant read-only view over FHIR bundles.
//!
//! A bundle is held as its entries' `resource` objects, in record order. Nothing is validated
//! beyond the top-level shape: an entry without a `resource` becomes an empty resource, and an
//! absent `entry` list becomes an empty bundle.
//!
//! Field access uses RFC 6901 JSON pointers (for example `/code/text` or
//! `/clinicalStatus/coding/0/code`), so callers can reach into nested arrays without writing a
//! wire struct for every resource kind.

use crate::{FhirError, FhirResult};
use serde_json::Value;
use std::path::Path;

/// The ordered resources of one patient record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bundle {
    resources: Vec<Resource>,
}

impl Bundle {
    /// Parse a bundle from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidJson`] if the text is not JSON, or
    /// [`FhirError::InvalidInput`] if the root is not a JSON object.
    pub fn parse(json_text: &str) -> FhirResult<Self> {
        let value: Value = serde_json::from_str(json_text)?;
        if !value.is_object() {
            return Err(FhirError::InvalidInput(
                "bundle root must be a JSON object".into(),
            ));
        }
        Ok(Self::from_value(&value))
    }

    /// Read and parse a bundle from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Io`] if the file cannot be read, otherwise the errors of
    /// [`Bundle::parse`].
    pub fn load(path: &Path) -> FhirResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Build a bundle from an already-decoded JSON value.
    ///
    /// Never fails: a value without an `entry` array yields an empty bundle.
    pub fn from_value(value: &Value) -> Self {
        let resources = value
            .get("entry")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| {
                        Resource(
                            entry
                                .get("resource")
                                .cloned()
                                .unwrap_or_else(|| Value::Object(Default::default())),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { resources }
    }

    /// Build a bundle directly from resources, in order.
    pub fn from_resources(resources: Vec<Resource>) -> Self {
        Self { resources }
    }

    /// All resources in record order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// The last `n` resources by position, or all of them when there are `n` or fewer.
    pub fn last(&self, n: usize) -> &[Resource] {
        let start = self.resources.len().saturating_sub(n);
        &self.resources[start..]
    }

    /// The first `Patient` resource, if any.
    pub fn patient(&self) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|r| r.resource_type() == Some("Patient"))
    }
}

/// A single FHIR resource, kept as raw JSON.
#[derive(Clone, Debug, PartialEq)]
pub struct Resource(Value);

impl Resource {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The `resourceType` discriminator, if present and a string.
    pub fn resource_type(&self) -> Option<&str> {
        self.0.get("resourceType").and_then(Value::as_str)
    }

    /// View of the resource root for pointer-based access.
    pub fn root(&self) -> Element<'_> {
        Element(&self.0)
    }

    /// Shorthand for `self.root().text(pointer)`.
    pub fn text(&self, pointer: &str) -> Option<String> {
        self.root().text(pointer)
    }

    /// Shorthand for `self.root().items(pointer)`.
    pub fn items(&self, pointer: &str) -> impl Iterator<Item = Element<'_>> {
        self.root().items(pointer)
    }
}

/// Borrowed view of any JSON node inside a resource.
#[derive(Clone, Copy, Debug)]
pub struct Element<'a>(&'a Value);

impl<'a> Element<'a> {
    /// Render the scalar at `pointer` as text.
    ///
    /// Strings are returned as-is; numbers and booleans use their JSON rendering. Objects,
    /// arrays, `null` and missing nodes are all reported as `None`.
    pub fn text(self, pointer: &str) -> Option<String> {
        match self.0.pointer(pointer)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Iterate the elements of the array at `pointer`. Empty when the node is not an array.
    pub fn items(self, pointer: &str) -> impl Iterator<Item = Element<'a>> {
        self.0
            .pointer(pointer)
            .and_then(Value::as_array)
            .map(|items| items.as_slice())
            .unwrap_or_default()
            .iter()
            .map(Element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_bundle() -> Value {
        json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {
                    "resourceType": "Patient",
                    "id": "p-1",
                    "name": [{"given": ["Sarah"], "family": "Williams"}],
                    "gender": "female"
                }},
                {"resource": {
                    "resourceType": "Observation",
                    "code": {"text": "Heart rate"},
                    "valueQuantity": {"value": 72, "unit": "/min"},
                    "category": [{"coding": [{"display": "Vital Signs"}]}]
                }},
                {"fullUrl": "urn:uuid:missing-resource"}
            ]
        })
    }

    #[test]
    fn parses_entries_in_record_order() {
        let bundle = Bundle::parse(&sample_bundle().to_string()).expect("should parse bundle");

        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.resources()[0].resource_type(), Some("Patient"));
        assert_eq!(bundle.resources()[1].resource_type(), Some("Observation"));
        assert_eq!(bundle.resources()[2].resource_type(), None);
    }

    #[test]
    fn rejects_non_object_root() {
        let err = Bundle::parse("[1, 2, 3]").expect_err("array root should be rejected");
        assert!(matches!(err, FhirError::InvalidInput(_)));

        let err = Bundle::parse("{not json").expect_err("broken json should be rejected");
        assert!(matches!(err, FhirError::InvalidJson(_)));
    }

    #[test]
    fn missing_entry_list_is_an_empty_bundle() {
        let bundle = Bundle::from_value(&json!({"resourceType": "Bundle"}));
        assert!(bundle.is_empty());
    }

    #[test]
    fn text_renders_scalars_and_skips_structures() {
        let bundle = Bundle::from_value(&sample_bundle());
        let observation = &bundle.resources()[1];

        assert_eq!(observation.text("/code/text").as_deref(), Some("Heart rate"));
        assert_eq!(
            observation.text("/valueQuantity/value").as_deref(),
            Some("72")
        );
        assert_eq!(observation.text("/valueQuantity"), None);
        assert_eq!(observation.text("/status"), None);
    }

    #[test]
    fn items_iterates_nested_arrays() {
        let bundle = Bundle::from_value(&sample_bundle());
        let displays: Vec<Option<String>> = bundle.resources()[1]
            .items("/category")
            .map(|c| c.text("/coding/0/display"))
            .collect();

        assert_eq!(displays, vec![Some("Vital Signs".to_string())]);
        assert_eq!(bundle.resources()[1].items("/code").count(), 0);
    }

    #[test]
    fn last_slices_by_position() {
        let resources = (0..5)
            .map(|i| Resource::new(json!({"resourceType": "Condition", "id": i})))
            .collect();
        let bundle = Bundle::from_resources(resources);

        let tail = bundle.last(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].text("/id").as_deref(), Some("3"));
        assert_eq!(bundle.last(10).len(), 5);
    }

    #[test]
    fn patient_finds_first_patient_resource() {
        let bundle = Bundle::from_value(&sample_bundle());
        let patient = bundle.patient().expect("bundle has a patient");
        assert_eq!(patient.text("/name/0/family").as_deref(), Some("Williams"));
    }
}
