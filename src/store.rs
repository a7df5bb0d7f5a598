//! Client-local persistence. The workflow core is storage-free; the CLI owns
//! persisting results through an injected key-value capability, mirroring the
//! browser-local storage the app keeps its history and current diagnosis in.

use anyhow::Context;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::core::{ConversationTurn, DiagnosisResult};
use crate::utils::ensure_dir;

pub const HISTORY_KEY: &str = "fixit_history";
pub const DIAGNOSIS_KEY: &str = "fixit_diagnosis";
pub const CHAT_KEY: &str = "fixit_chat";

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Flat JSON object on disk, one value per key. Every mutation rewrites the
/// file; the store holds small records only.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("parsing store file {}", path.display()))?,
            Err(_) => HashMap::new(),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fixit")
            .join("store.json")
    }

    fn flush(&self, entries: &HashMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)
            .with_context(|| format!("writing store file {}", self.path.display()))?;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
        self.flush(&entries)
    }
}

pub fn load_history(store: &dyn KvStore) -> anyhow::Result<Vec<DiagnosisResult>> {
    match store.get(HISTORY_KEY)? {
        Some(text) => serde_json::from_str(&text).context("parsing stored history"),
        None => Ok(Vec::new()),
    }
}

pub fn append_history(store: &dyn KvStore, result: &DiagnosisResult) -> anyhow::Result<()> {
    let mut history = load_history(store)?;
    history.push(result.clone());
    store.set(HISTORY_KEY, &serde_json::to_string(&history)?)
}

pub fn save_diagnosis(store: &dyn KvStore, result: &DiagnosisResult) -> anyhow::Result<()> {
    store.set(DIAGNOSIS_KEY, &serde_json::to_string(result)?)
}

pub fn load_diagnosis(store: &dyn KvStore) -> anyhow::Result<Option<DiagnosisResult>> {
    match store.get(DIAGNOSIS_KEY)? {
        Some(text) => Ok(Some(
            serde_json::from_str(&text).context("parsing stored diagnosis")?,
        )),
        None => Ok(None),
    }
}

pub fn load_transcript(store: &dyn KvStore) -> anyhow::Result<Vec<ConversationTurn>> {
    match store.get(CHAT_KEY)? {
        Some(text) => serde_json::from_str(&text).context("parsing stored transcript"),
        None => Ok(Vec::new()),
    }
}

pub fn save_transcript(store: &dyn KvStore, turns: &[ConversationTurn]) -> anyhow::Result<()> {
    store.set(CHAT_KEY, &serde_json::to_string(turns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn sample(title: &str) -> DiagnosisResult {
        DiagnosisResult {
            diagnosis: title.to_string(),
            confidence: 75,
            root_cause: "test".to_string(),
            fixes: vec!["step".to_string()],
            visual_evidence: vec![],
            timestamp: Some(OffsetDateTime::now_utc()),
        }
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = FileStore::open(path.clone()).unwrap();
            store.set("greeting", "hello").unwrap();
        }
        let store = FileStore::open(path).unwrap();
        assert_eq!(store.get("greeting").unwrap().as_deref(), Some("hello"));
        store.remove("greeting").unwrap();
        assert_eq!(store.get("greeting").unwrap(), None);
    }

    #[test]
    fn history_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();
        append_history(&store, &sample("first")).unwrap();
        append_history(&store, &sample("second")).unwrap();
        let history = load_history(&store).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].diagnosis, "first");
        assert_eq!(history[1].diagnosis, "second");
    }

    #[test]
    fn transcript_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();
        assert!(load_transcript(&store).unwrap().is_empty());
        let turns = vec![
            ConversationTurn::user("still broken"),
            ConversationTurn::model("check the belt tension"),
        ];
        save_transcript(&store, &turns).unwrap();
        assert_eq!(load_transcript(&store).unwrap(), turns);
    }
}
