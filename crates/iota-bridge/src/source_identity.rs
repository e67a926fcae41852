//! Per-source conversation identity resolution.
//!
//! Each chat source keys its mapping table on a different event field: Slack
//! and Zoom on the user id, Teams on the conversation id. Dispatch rejects
//! events whose identity field is blank rather than keying a table on an
//! empty string.

use crate::ticket_event::{ChatSource, TicketBridgeEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `SourceIdentity` used across Iota components.
pub struct SourceIdentity {
    pub key_name: &'static str,
    pub key: String,
}

pub fn resolve_source_identity(
    source: ChatSource,
    event: &TicketBridgeEvent,
) -> Option<SourceIdentity> {
    let (key_name, raw) = match source {
        ChatSource::Slack | ChatSource::Zoom => ("user_id", event.user.as_str()),
        ChatSource::Teams => ("conversation_id", event.conversation_id.as_str()),
    };
    let key = raw.trim();
    if key.is_empty() {
        return None;
    }
    Some(SourceIdentity {
        key_name,
        key: key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{resolve_source_identity, SourceIdentity};
    use crate::ticket_event::{ChatSource, TicketBridgeEvent};

    #[test]
    fn unit_slack_and_zoom_identities_key_on_the_user_field() {
        let event = TicketBridgeEvent {
            user: "U123".to_string(),
            conversation_id: "con-9".to_string(),
            ..TicketBridgeEvent::default()
        };
        assert_eq!(
            resolve_source_identity(ChatSource::Slack, &event),
            Some(SourceIdentity {
                key_name: "user_id",
                key: "U123".to_string(),
            })
        );
        assert_eq!(
            resolve_source_identity(ChatSource::Zoom, &event),
            Some(SourceIdentity {
                key_name: "user_id",
                key: "U123".to_string(),
            })
        );
    }

    #[test]
    fn unit_teams_identity_keys_on_the_conversation_field() {
        let event = TicketBridgeEvent {
            conversation_id: " con-9 ".to_string(),
            ..TicketBridgeEvent::default()
        };
        let identity = resolve_source_identity(ChatSource::Teams, &event).expect("identity");
        assert_eq!(identity.key_name, "conversation_id");
        assert_eq!(identity.key, "con-9");
    }

    #[test]
    fn unit_blank_identity_field_resolves_to_none() {
        let event = TicketBridgeEvent {
            user: "  ".to_string(),
            ..TicketBridgeEvent::default()
        };
        assert!(resolve_source_identity(ChatSource::Slack, &event).is_none());
        assert!(resolve_source_identity(ChatSource::Teams, &event).is_none());
    }
}
