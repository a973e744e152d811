#[cfg(test)]
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Result;

#[cfg(test)]
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Field values of one workflow screen, keyed by field name.
pub type ScreenBlob = Map<String, Value>;

/// Fixed blob names, one per screen.
pub mod names {
    pub const INTAKE: &str = "add_patient_data";
    pub const SUBJECTIVE: &str = "subjective_inputs";
    pub const PERSPECTIVES: &str = "perspectives_inputs";
    pub const ASSESSMENTS: &str = "initial_plan_assessments";
    pub const PATHO: &str = "patho_inputs";
    pub const CHRONIC: &str = "chronic_inputs";
    pub const CLINICAL_FLAGS: &str = "clinical_flags_inputs";
    pub const PROVISIONAL_DIAGNOSIS: &str = "provisional_diagnosis_inputs";
    pub const SMART_GOALS: &str = "smart_goals_inputs";
    pub const TREATMENT_PLAN: &str = "treatment_plan_inputs";
    pub const FOLLOW_UP: &str = "follow_up_inputs";
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Durable key-value store of screen blobs.
///
/// `get` never fails on missing or unparsable entries: both read back as an
/// empty blob.  `set` replaces the whole entry (last write wins).  Errors
/// are reserved for the storage medium itself.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<ScreenBlob>;

    async fn set(&self, name: &str, blob: &ScreenBlob) -> Result<()>;

    /// Names of all stored blobs, sorted.
    async fn names(&self) -> Result<Vec<String>>;
}

/// Decode a stored entry, defaulting anything that is not a JSON object.
pub(crate) fn decode_blob(name: &str, raw: &str) -> ScreenBlob {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(blob = name, kind = json_kind(&other), "stored blob is not an object, using empty");
            ScreenBlob::new()
        }
        Err(e) => {
            warn!(blob = name, err = %e, "stored blob is not valid JSON, using empty");
            ScreenBlob::new()
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read a blob, set one field, and write it back.  Returns the saved blob.
///
/// Not atomic across callers: a concurrent writer of the same blob between
/// the read and the write is lost.
pub async fn merge_field(
    store: &dyn ContextStore,
    name: &str,
    field: &str,
    value: Value,
) -> Result<ScreenBlob> {
    let mut blob = store.get(name).await?;
    blob.insert(field.to_string(), value);
    store.set(name, &blob).await?;
    debug!(blob = name, field, fields = blob.len(), "merged field into blob");
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_object() {
        let blob = decode_blob("x", r#"{"age_sex":"34F"}"#);
        assert_eq!(blob.get("age_sex"), Some(&json!("34F")));
    }

    #[test]
    fn decode_garbage_is_empty() {
        assert!(decode_blob("x", "{not json").is_empty());
        assert!(decode_blob("x", "").is_empty());
    }

    #[test]
    fn decode_non_object_is_empty() {
        assert!(decode_blob("x", "[1,2,3]").is_empty());
        assert!(decode_blob("x", "\"text\"").is_empty());
        assert!(decode_blob("x", "null").is_empty());
    }

    #[tokio::test]
    async fn merge_field_keeps_other_fields() {
        let store = MemoryStore::new();
        merge_field(&store, names::PERSPECTIVES, "knowledge", json!("limited")).await.unwrap();
        merge_field(&store, names::PERSPECTIVES, "attribution", json!("work strain")).await.unwrap();

        let blob = store.get(names::PERSPECTIVES).await.unwrap();
        assert_eq!(blob.get("knowledge"), Some(&json!("limited")));
        assert_eq!(blob.get("attribution"), Some(&json!("work strain")));
    }

    #[tokio::test]
    async fn merge_field_overwrites_same_field() {
        let store = MemoryStore::new();
        merge_field(&store, names::SUBJECTIVE, "body_function", json!("a")).await.unwrap();
        let saved = merge_field(&store, names::SUBJECTIVE, "body_function", json!("b")).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved.get("body_function"), Some(&json!("b")));
    }

    #[tokio::test]
    async fn merge_field_recovers_from_malformed_entry() {
        let store = MemoryStore::new();
        store.insert_raw(names::SUBJECTIVE, "{{{").await;
        let saved = merge_field(&store, names::SUBJECTIVE, "body_structure", json!("L4/5")).await.unwrap();
        assert_eq!(saved.len(), 1);
    }
}
