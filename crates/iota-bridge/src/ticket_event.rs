//! Inbound ticket event envelope and its closed source/kind vocabularies.
//!
//! The wire envelope keeps `source` and `event` as raw strings so unknown
//! values survive deserialization; dispatch parses them into the closed enums
//! and rejects the unrecognized ones with a reason code instead of an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const TICKET_EVENT_CREATION_WIRE: &str = "TICKET_CREATION";
pub const TICKET_EVENT_RESOLUTION_WIRE: &str = "TICKET_RESOLUTION";
pub const TICKET_EVENT_ATTACHMENT_WIRE: &str = "TICKET_ATTACHMENT";

fn default_file_name() -> String {
    "attachment".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Public struct `TicketBridgeEvent` used across Iota components.
pub struct TicketBridgeEvent {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub is_automated: bool,
    #[serde(default)]
    pub chat_history: String,
    /// Origin flag; the inbound wire name is `from_haptik`.
    #[serde(default, alias = "from_haptik")]
    pub from_platform: bool,
    #[serde(default)]
    pub file_link: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub conversation_id: String,
}

impl Default for TicketBridgeEvent {
    fn default() -> Self {
        Self {
            email: String::new(),
            message: String::new(),
            client_id: String::new(),
            source: String::new(),
            event: String::new(),
            is_automated: false,
            chat_history: String::new(),
            from_platform: false,
            file_link: String::new(),
            file_type: String::new(),
            file_name: default_file_name(),
            user: String::new(),
            conversation_id: String::new(),
        }
    }
}

pub fn parse_ticket_bridge_event(raw: &str) -> Result<TicketBridgeEvent> {
    serde_json::from_str::<TicketBridgeEvent>(raw).context("failed to parse ticket bridge event")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ChatSource` values.
pub enum ChatSource {
    Slack,
    Teams,
    Zoom,
}

impl ChatSource {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "slack" => Some(Self::Slack),
            "teams" => Some(Self::Teams),
            "zoom" => Some(Self::Zoom),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Teams => "teams",
            Self::Zoom => "zoom",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `TicketEventKind` values.
pub enum TicketEventKind {
    Creation,
    Resolution,
    Attachment,
}

impl TicketEventKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            TICKET_EVENT_CREATION_WIRE => Some(Self::Creation),
            TICKET_EVENT_RESOLUTION_WIRE => Some(Self::Resolution),
            TICKET_EVENT_ATTACHMENT_WIRE => Some(Self::Attachment),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::Resolution => "resolution",
            Self::Attachment => "attachment",
        }
    }
}
