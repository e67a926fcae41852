//! Keyed state stores for the Iota ticket bridge.
//!
//! Provides the per-client configuration table and the per-source conversation
//! mapping tables behind store traits so bridge flows can run against file
//! backed state in production and in-memory fakes in tests.

pub mod atomic_io;
pub mod client_config;
pub mod conversation_store;

pub use atomic_io::write_state_table;
pub use client_config::{
    ClientConfig, ClientConfigStore, FileClientConfigStore, MemoryClientConfigStore,
    CLIENT_CONFIG_SCHEMA_VERSION,
};
pub use conversation_store::{
    ConversationRecord, ConversationStore, FileConversationStore, MemoryConversationStore,
    CONVERSATION_STATE_SCHEMA_VERSION,
};
