// Detection History
// Session lookup and append-only record storage behind narrow traits, so the identity
// provider and the record store can be swapped for hosted services.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::models::DetectionRecord;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history store I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Identity provider: bearer token in, session subject out.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn subject(&self, token: &str) -> Option<String>;
}

/// Append-only record store keyed by subject id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: DetectionRecord) -> Result<(), HistoryError>;

    /// Records of one subject, newest first.
    async fn list(&self, subject_id: &str) -> Result<Vec<DetectionRecord>, HistoryError>;
}

// ============ Sessions ============

#[derive(Debug, Clone, Default)]
pub struct StaticTokenSessions {
    tokens: HashMap<String, String>,
}

impl StaticTokenSessions {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl SessionProvider for StaticTokenSessions {
    async fn subject(&self, token: &str) -> Option<String> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        self.tokens.get(token).cloned()
    }
}

// ============ Record stores ============

fn newest_first(mut records: Vec<DetectionRecord>) -> Vec<DetectionRecord> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Vec<DetectionRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: DetectionRecord) -> Result<(), HistoryError> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list(&self, subject_id: &str) -> Result<Vec<DetectionRecord>, HistoryError> {
        let records = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.subject_id == subject_id)
            .cloned()
            .collect();
        Ok(newest_first(records))
    }
}

/// One JSON record per line, appended in submission order.
#[derive(Debug)]
pub struct JsonlRecordStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl RecordStore for JsonlRecordStore {
    async fn insert(&self, record: DetectionRecord) -> Result<(), HistoryError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes()).await.map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))
    }

    async fn list(&self, subject_id: &str) -> Result<Vec<DetectionRecord>, HistoryError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DetectionRecord>(line) {
                Ok(record) if record.subject_id == subject_id => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(path = %self.path.display(), line = idx + 1, error = %e, "history.skip_malformed"),
            }
        }
        Ok(newest_first(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Artifact, Modality, Verdict};
    use chrono::Duration;

    fn record(subject: &str, text: &str, minutes_ago: i64) -> DetectionRecord {
        let verdict = Verdict {
            label: Modality::Text.ai_label(),
            confidence: 80.0,
            modality: Modality::Text,
            confidence_fallback: false,
        };
        let mut r = DetectionRecord::new(subject, &Artifact::text(text, None), &verdict);
        r.created_at = r.created_at - Duration::minutes(minutes_ago);
        r
    }

    #[tokio::test]
    async fn test_static_sessions() {
        let sessions = StaticTokenSessions::new(HashMap::from([("tok".to_string(), "user-1".to_string())]));
        assert_eq!(sessions.subject("tok").await.as_deref(), Some("user-1"));
        assert!(sessions.subject("nope").await.is_none());
        assert!(sessions.subject("  ").await.is_none());
    }

    #[tokio::test]
    async fn test_in_memory_store_filters_and_orders() {
        let store = InMemoryRecordStore::new();
        store.insert(record("a", "old", 10)).await.unwrap();
        store.insert(record("b", "other", 5)).await.unwrap();
        store.insert(record("a", "new", 1)).await.unwrap();

        let items = store.list("a").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].input_data, "new");
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_jsonl_store_appends_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("detections.jsonl");
        let store = JsonlRecordStore::new(&path);
        assert_eq!(store.path(), path.as_path());

        assert!(store.list("a").await.unwrap().is_empty());

        store.insert(record("a", "first", 3)).await.unwrap();
        store.insert(record("a", "second", 1)).await.unwrap();
        tokio::fs::write(
            &path,
            format!("{}not json\n", tokio::fs::read_to_string(&path).await.unwrap()),
        )
        .await
        .unwrap();

        let items = store.list("a").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].input_data, "second");
        assert!(store.list("b").await.unwrap().is_empty());
    }
}
