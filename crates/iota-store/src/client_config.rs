//! Per-client provisioning records for the ticket bridge.
//!
//! Client configuration is owned by an external provisioning process; this
//! system only reads it. The file store keeps one schema-versioned JSON table
//! keyed by client id, the memory store backs tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const CLIENT_CONFIG_SCHEMA_VERSION: u32 = 1;

fn client_config_schema_version() -> u32 {
    CLIENT_CONFIG_SCHEMA_VERSION
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
/// Public struct `ClientConfig` used across Iota components.
pub struct ClientConfig {
    pub instance: String,
    pub ticketing_auth: String,
    #[serde(default)]
    pub slack_auth: String,
    #[serde(default)]
    pub zoom_auth: String,
    #[serde(default)]
    pub teams_client_id: String,
    #[serde(default)]
    pub teams_client_secret: String,
    #[serde(default)]
    pub teams_scope: String,
    #[serde(default)]
    pub translation_enabled: bool,
}

/// Trait contract for `ClientConfigStore` behavior. Read-only from the
/// bridge's perspective.
pub trait ClientConfigStore: Send + Sync {
    fn load(&self, client_id: &str) -> Result<Option<ClientConfig>>;
}

#[derive(Debug, Default)]
/// Public struct `MemoryClientConfigStore` used across Iota components.
pub struct MemoryClientConfigStore {
    clients: Mutex<BTreeMap<String, ClientConfig>>,
}

impl MemoryClientConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, client_id: &str, config: ClientConfig) {
        if let Ok(mut clients) = self.clients.lock() {
            clients.insert(client_id.trim().to_string(), config);
        }
    }
}

impl ClientConfigStore for MemoryClientConfigStore {
    fn load(&self, client_id: &str) -> Result<Option<ClientConfig>> {
        let clients = self
            .clients
            .lock()
            .map_err(|_| anyhow!("client config table mutex is poisoned"))?;
        Ok(clients.get(client_id.trim()).cloned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClientConfigFile {
    #[serde(default = "client_config_schema_version")]
    schema_version: u32,
    #[serde(default)]
    clients: BTreeMap<String, ClientConfig>,
}

#[derive(Debug)]
/// Public struct `FileClientConfigStore` used across Iota components.
pub struct FileClientConfigStore {
    path: PathBuf,
}

impl FileClientConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load_table(&self) -> Result<ClientConfigFile> {
        if !self.path.exists() {
            return Ok(ClientConfigFile {
                schema_version: CLIENT_CONFIG_SCHEMA_VERSION,
                clients: BTreeMap::new(),
            });
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read client config file {}", self.path.display()))?;
        let table = serde_json::from_str::<ClientConfigFile>(&raw).with_context(|| {
            format!("failed to parse client config file {}", self.path.display())
        })?;
        if table.schema_version != CLIENT_CONFIG_SCHEMA_VERSION {
            bail!(
                "unsupported client config schema: expected {}, found {}",
                CLIENT_CONFIG_SCHEMA_VERSION,
                table.schema_version
            );
        }
        Ok(table)
    }
}

impl ClientConfigStore for FileClientConfigStore {
    fn load(&self, client_id: &str) -> Result<Option<ClientConfig>> {
        let table = self.load_table()?;
        Ok(table.clients.get(client_id.trim()).cloned())
    }
}
