use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ContextStore, ScreenBlob, decode_blob};
use crate::error::Result;

/// Screen blobs persisted in the `screen_blobs` table.
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContextStore for SqliteStore {
    async fn get(&self, name: &str) -> Result<ScreenBlob> {
        let db = self.db.lock().await;
        let raw: Option<String> = db
            .query_row(
                "SELECT body FROM screen_blobs WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.map(|r| decode_blob(name, &r)).unwrap_or_default())
    }

    async fn set(&self, name: &str, blob: &ScreenBlob) -> Result<()> {
        let body = serde_json::to_string(blob)?;
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO screen_blobs (name, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            rusqlite::params![name, body, now],
        )?;
        debug!(blob = name, bytes = body.len(), "blob saved");
        Ok(())
    }

    async fn names(&self) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT name FROM screen_blobs ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use serde_json::json;

    fn blob(v: serde_json::Value) -> ScreenBlob {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn get_absent_is_empty() {
        let store = SqliteStore::new(test_db());
        assert!(store.get("add_patient_data").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_then_get() {
        let store = SqliteStore::new(test_db());
        let b = blob(json!({"special_tests": {"choice": "Mandatory assessment"}}));
        store.set("initial_plan_assessments", &b).await.unwrap();
        assert_eq!(store.get("initial_plan_assessments").await.unwrap(), b);
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = SqliteStore::new(test_db());
        store.set("b", &blob(json!({"first": "1"}))).await.unwrap();
        store.set("b", &blob(json!({"second": "2"}))).await.unwrap();
        assert_eq!(store.get("b").await.unwrap(), blob(json!({"second": "2"})));
        assert_eq!(store.names().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn malformed_row_reads_as_empty() {
        let db = test_db();
        db.lock()
            .await
            .execute(
                "INSERT INTO screen_blobs (name, body, updated_at) VALUES ('subjective_inputs', 'oops', '')",
                [],
            )
            .unwrap();
        let store = SqliteStore::new(db);
        assert!(store.get("subjective_inputs").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.db");
        {
            let conn = crate::db::open(&path).unwrap();
            let store = SqliteStore::new(Arc::new(Mutex::new(conn)));
            store.set("add_patient_data", &blob(json!({"age_sex": "34F"}))).await.unwrap();
        }
        let conn = crate::db::open(&path).unwrap();
        let store = SqliteStore::new(Arc::new(Mutex::new(conn)));
        assert_eq!(
            store.get("add_patient_data").await.unwrap().get("age_sex"),
            Some(&json!("34F"))
        );
    }
}
