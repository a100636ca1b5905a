//! Patient record sources.
//!
//! Records are imported elsewhere (Synthea output) and only read here. Each record is one FHIR
//! bundle stored verbatim as JSON, addressed by a numeric patient id.

use crate::{PatientId, SummaryError, SummaryResult};
use fhir::Bundle;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;

/// Listing entry for a stored patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientListing {
    pub id: PatientId,
    pub synthea_id: String,
}

/// A stored patient record.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPatient {
    pub id: PatientId,
    pub synthea_id: String,
    pub data: Value,
}

impl StoredPatient {
    /// Tolerant bundle view over the stored JSON.
    pub fn bundle(&self) -> Bundle {
        Bundle::from_value(&self.data)
    }

    pub fn listing(&self) -> PatientListing {
        PatientListing {
            id: self.id,
            synthea_id: self.synthea_id.clone(),
        }
    }
}

/// Read access to stored patient records.
#[async_trait::async_trait]
pub trait PatientRecordSource: Send + Sync {
    async fn get_patient(&self, id: PatientId) -> SummaryResult<Option<StoredPatient>>;

    /// All patients ordered by id.
    async fn list_patients(&self) -> SummaryResult<Vec<PatientListing>>;
}

/// Process-local record source, typically seeded from a directory of bundle files.
#[derive(Default)]
pub struct InMemoryPatientRecords {
    patients: RwLock<BTreeMap<PatientId, StoredPatient>>,
}

impl InMemoryPatientRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record and return its assigned id. Ids start at 1.
    pub async fn insert(&self, synthea_id: impl Into<String>, data: Value) -> PatientId {
        let mut patients = self.patients.write().await;
        let id = patients.keys().next_back().copied().unwrap_or(0) + 1;
        patients.insert(
            id,
            StoredPatient {
                id,
                synthea_id: synthea_id.into(),
                data,
            },
        );
        id
    }

    /// Load every `*.json` file in `dir`, in file name order.
    ///
    /// The Synthea id is the bundle's `Patient` resource id when present, otherwise the file
    /// stem.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::Record`] if the directory cannot be read or a file is not a JSON
    /// object bundle.
    pub async fn load_dir(dir: &Path) -> SummaryResult<Self> {
        let records = Self::new();
        for (synthea_id, data) in read_bundle_dir(dir)? {
            records.insert(synthea_id, data).await;
        }
        Ok(records)
    }
}

/// Read every `*.json` bundle in `dir`, sorted by file name, as `(synthea_id, json)` pairs.
///
/// # Errors
///
/// Returns [`SummaryError::Record`] on I/O failure or if a file is not a JSON object.
pub fn read_bundle_dir(dir: &Path) -> SummaryResult<Vec<(String, Value)>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(fhir::FhirError::Io)? {
        let path = entry.map_err(fhir::FhirError::Io)?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut bundles = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(&path).map_err(fhir::FhirError::Io)?;
        let data: Value = serde_json::from_str(&text).map_err(fhir::FhirError::InvalidJson)?;
        if !data.is_object() {
            return Err(SummaryError::Record(fhir::FhirError::InvalidInput(format!(
                "{} is not a JSON object",
                path.display()
            ))));
        }

        let bundle = Bundle::from_value(&data);
        let synthea_id = bundle
            .patient()
            .and_then(|p| p.text("/id"))
            .or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_default();
        bundles.push((synthea_id, data));
    }

    tracing::info!(count = bundles.len(), dir = %dir.display(), "read patient bundles");
    Ok(bundles)
}

#[async_trait::async_trait]
impl PatientRecordSource for InMemoryPatientRecords {
    async fn get_patient(&self, id: PatientId) -> SummaryResult<Option<StoredPatient>> {
        Ok(self.patients.read().await.get(&id).cloned())
    }

    async fn list_patients(&self) -> SummaryResult<Vec<PatientListing>> {
        Ok(self
            .patients
            .read()
            .await
            .values()
            .map(StoredPatient::listing)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let records = InMemoryPatientRecords::new();
        let first = records.insert("a", json!({"entry": []})).await;
        let second = records.insert("b", json!({"entry": []})).await;
        assert_eq!((first, second), (1, 2));

        let listing = records.list_patients().await.expect("list");
        assert_eq!(
            listing,
            vec![
                PatientListing { id: 1, synthea_id: "a".into() },
                PatientListing { id: 2, synthea_id: "b".into() },
            ]
        );
        assert!(records.get_patient(3).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn load_dir_reads_bundles_in_name_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("b_second.json"),
            json!({"entry": [{"resource": {"resourceType": "Patient", "id": "synthea-42"}}]})
                .to_string(),
        )
        .expect("write");
        std::fs::write(dir.path().join("a_first.json"), json!({"entry": []}).to_string())
            .expect("write");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let records = InMemoryPatientRecords::load_dir(dir.path())
            .await
            .expect("load");
        let listing = records.list_patients().await.expect("list");

        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].synthea_id, "a_first");
        assert_eq!(listing[1].synthea_id, "synthea-42");

        let patient = records.get_patient(2).await.expect("get").expect("exists");
        assert_eq!(patient.bundle().len(), 1);
    }

    #[tokio::test]
    async fn load_dir_rejects_non_object_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("bad.json"), "[1, 2]").expect("write");

        let err = InMemoryPatientRecords::load_dir(dir.path())
            .await
            .err()
            .expect("array root rejected");
        assert!(matches!(err, SummaryError::Record(_)));
    }
}
