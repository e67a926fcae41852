//! Event dispatch core for the Iota ticket bridge.
//!
//! One inbound ticket event per invocation, routed to one of three flows:
//! ticket creation, resolution, or attachment upload. Store and HTTP handles
//! are injected at construction; every failure path ends in a reported reason
//! code, never an error surfaced to the invoker.

pub mod attachment_flow;
pub mod bridge_dispatch;
pub mod source_credentials;
pub mod source_identity;
pub mod ticket_event;


pub use attachment_flow::{
    upload_conversation_attachment, AttachmentUploadOutcome, AttachmentUploadReport,
    AttachmentUploadRequest, ATTACHMENT_POLL_INTERVAL_MS, ATTACHMENT_POLL_MAX_ATTEMPTS,
};
pub use bridge_dispatch::{
    render_ticket_event_report, TicketBridge, TicketBridgeConfig, TicketEventAck,
    TicketEventFlow, TicketEventOutcome, TicketEventReport,
};
pub use source_credentials::{ResolvedSourceCredential, SourceCredentialResolver};
pub use source_identity::{resolve_source_identity, SourceIdentity};
pub use ticket_event::{parse_ticket_bridge_event, ChatSource, TicketBridgeEvent, TicketEventKind};
