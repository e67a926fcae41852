//! Conversation mapping tables keyed by source-specific identity.
//!
//! Each record holds at most one open ticket for a conversation identity plus
//! resolution metadata. Records persist across tickets: resolution clears the
//! ticket fields, it never deletes the record. Unrecognized fields written by
//! other processes are preserved across read-modify-write cycles.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::atomic_io::write_state_table;

pub const CONVERSATION_STATE_SCHEMA_VERSION: u32 = 1;

fn conversation_state_schema_version() -> u32 {
    CONVERSATION_STATE_SCHEMA_VERSION
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
/// Public struct `ConversationRecord` used across Iota components.
pub struct ConversationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_sys_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_transcript: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ConversationRecord {
    /// True when the record carries a non-empty ticket system id.
    pub fn has_open_ticket(&self) -> bool {
        self.ticket_sys_id
            .as_deref()
            .map(str::trim)
            .is_some_and(|sys_id| !sys_id.is_empty())
    }

    pub fn set_ticket(&mut self, ticket_number: &str, ticket_sys_id: &str) {
        self.ticket_number = Some(ticket_number.to_string());
        self.ticket_sys_id = Some(ticket_sys_id.to_string());
    }

    pub fn clear_ticket_fields(&mut self) {
        self.ticket_number = None;
        self.ticket_sys_id = None;
        self.agent_name = None;
    }

    pub fn clear_transcript(&mut self) {
        self.chat_transcript = None;
    }
}

/// Trait contract for `ConversationStore` behavior. Implementations provide
/// load/save over a single keyed table; flows do read-modify-write on top.
pub trait ConversationStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<ConversationRecord>>;
    fn save(&self, key: &str, record: &ConversationRecord) -> Result<()>;
}

#[derive(Debug, Default)]
/// Public struct `MemoryConversationStore` used across Iota components.
pub struct MemoryConversationStore {
    records: Mutex<BTreeMap<String, ConversationRecord>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }
}

impl ConversationStore for MemoryConversationStore {
    fn load(&self, key: &str) -> Result<Option<ConversationRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow!("conversation table mutex is poisoned"))?;
        Ok(records.get(key.trim()).cloned())
    }

    fn save(&self, key: &str, record: &ConversationRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow!("conversation table mutex is poisoned"))?;
        records.insert(key.trim().to_string(), record.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConversationStateFile {
    #[serde(default = "conversation_state_schema_version")]
    schema_version: u32,
    #[serde(default)]
    records: BTreeMap<String, ConversationRecord>,
}

impl Default for ConversationStateFile {
    fn default() -> Self {
        Self {
            schema_version: CONVERSATION_STATE_SCHEMA_VERSION,
            records: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
/// Public struct `FileConversationStore` used across Iota components.
pub struct FileConversationStore {
    path: PathBuf,
}

impl FileConversationStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load_table(&self) -> Result<ConversationStateFile> {
        if !self.path.exists() {
            return Ok(ConversationStateFile::default());
        }
        let raw = std::fs::read_to_string(&self.path).with_context(|| {
            format!("failed to read conversation table {}", self.path.display())
        })?;
        let table = serde_json::from_str::<ConversationStateFile>(&raw).with_context(|| {
            format!("failed to parse conversation table {}", self.path.display())
        })?;
        if table.schema_version != CONVERSATION_STATE_SCHEMA_VERSION {
            bail!(
                "unsupported conversation table schema: expected {}, found {}",
                CONVERSATION_STATE_SCHEMA_VERSION,
                table.schema_version
            );
        }
        Ok(table)
    }

    fn save_table(&self, table: &ConversationStateFile) -> Result<()> {
        let mut payload =
            serde_json::to_string_pretty(table).context("failed to serialize conversation table")?;
        payload.push('\n');
        write_state_table(&self.path, &payload).with_context(|| {
            format!("failed to write conversation table {}", self.path.display())
        })?;
        Ok(())
    }
}

impl ConversationStore for FileConversationStore {
    fn load(&self, key: &str) -> Result<Option<ConversationRecord>> {
        let table = self.load_table()?;
        Ok(table.records.get(key.trim()).cloned())
    }

    fn save(&self, key: &str, record: &ConversationRecord) -> Result<()> {
        let mut table = self.load_table()?;
        table.records.insert(key.trim().to_string(), record.clone());
        self.save_table(&table)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::{
        ConversationRecord, ConversationStore, FileConversationStore, MemoryConversationStore,
    };

    #[test]
    fn unit_record_open_ticket_requires_non_blank_sys_id() {
        let mut record = ConversationRecord::default();
        assert!(!record.has_open_ticket());
        record.ticket_sys_id = Some("  ".to_string());
        assert!(!record.has_open_ticket());
        record.set_ticket("INC0001", "sys-1");
        assert!(record.has_open_ticket());
    }

    #[test]
    fn unit_clear_ticket_fields_keeps_transcript_and_extras() {
        let mut record = ConversationRecord {
            ticket_number: Some("INC0001".to_string()),
            ticket_sys_id: Some("sys-1".to_string()),
            agent_name: Some("Dana".to_string()),
            chat_transcript: Some("hola".to_string()),
            ..ConversationRecord::default()
        };
        record
            .extra
            .insert("last_seen_unix_ms".to_string(), json!(1_760_000_000_000_u64));

        record.clear_ticket_fields();
        assert!(record.ticket_number.is_none());
        assert!(record.ticket_sys_id.is_none());
        assert!(record.agent_name.is_none());
        assert_eq!(record.chat_transcript.as_deref(), Some("hola"));
        assert!(record.extra.contains_key("last_seen_unix_ms"));
    }

    #[test]
    fn functional_memory_store_read_modify_write_preserves_unknown_fields() {
        let store = MemoryConversationStore::new();
        let mut record = ConversationRecord::default();
        record
            .extra
            .insert("thread_ts".to_string(), json!("171234.5678"));
        store.save("user-1", &record).expect("seed");

        let mut loaded = store.load("user-1").expect("load").expect("record");
        loaded.set_ticket("INC0002", "sys-2");
        store.save("user-1", &loaded).expect("update");

        let reloaded = store.load("user-1").expect("reload").expect("record");
        assert_eq!(reloaded.ticket_sys_id.as_deref(), Some("sys-2"));
        assert_eq!(reloaded.extra.get("thread_ts"), Some(&json!("171234.5678")));
        assert_eq!(store.record_count(), 1);
    }

    #[test]
    fn functional_file_store_round_trips_records_across_instances() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("slack.json");

        let store = FileConversationStore::new(path.clone());
        assert!(store.load("user-1").expect("empty load").is_none());

        let mut record = ConversationRecord::default();
        record.set_ticket("INC0003", "sys-3");
        store.save("user-1", &record).expect("save");

        let reopened = FileConversationStore::new(path);
        let loaded = reopened.load("user-1").expect("load").expect("record");
        assert_eq!(loaded.ticket_number.as_deref(), Some("INC0003"));
        assert!(loaded.has_open_ticket());
    }

    #[test]
    fn regression_file_store_rejects_unsupported_schema_version() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("teams.json");
        std::fs::write(&path, r#"{"schema_version": 7, "records": {}}"#).expect("write");
        let store = FileConversationStore::new(path);
        let error = store.load("con-1").expect_err("schema should fail");
        assert!(format!("{error:#}").contains("unsupported conversation table schema"));
    }
}
