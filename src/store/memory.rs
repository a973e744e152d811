use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ContextStore, ScreenBlob, decode_blob};
use crate::error::Result;

/// In-memory store holding raw JSON text, like a browser's local storage.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text under `name` without validation.
    pub async fn insert_raw(&self, name: &str, raw: &str) {
        self.entries.lock().await.insert(name.to_string(), raw.to_string());
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn get(&self, name: &str) -> Result<ScreenBlob> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(name)
            .map(|raw| decode_blob(name, raw))
            .unwrap_or_default())
    }

    async fn set(&self, name: &str, blob: &ScreenBlob) -> Result<()> {
        let raw = serde_json::to_string(blob)?;
        self.entries.lock().await.insert(name.to_string(), raw);
        Ok(())
    }

    async fn names(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blob(v: serde_json::Value) -> ScreenBlob {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn get_absent_is_empty() {
        let store = MemoryStore::new();
        assert!(store.get("subjective_inputs").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = MemoryStore::new();
        store.set("b", &blob(json!({"x": "1", "y": "2"}))).await.unwrap();
        store.set("b", &blob(json!({"x": "3"}))).await.unwrap();
        assert_eq!(store.get("b").await.unwrap(), blob(json!({"x": "3"})));
    }

    #[tokio::test]
    async fn names_are_sorted() {
        let store = MemoryStore::new();
        store.set("perspectives_inputs", &ScreenBlob::new()).await.unwrap();
        store.insert_raw("add_patient_data", "{}").await;
        assert_eq!(
            store.names().await.unwrap(),
            vec!["add_patient_data", "perspectives_inputs"]
        );
    }
}
