//! Three-way ticket event dispatcher.
//!
//! Routes one inbound event to the creation, resolution, or attachment flow
//! against the per-source conversation table and the external ticketing API.
//! Every outcome is a `TicketEventReport` with a machine-readable reason
//! code; the invoker always receives the fixed acknowledgment.

use std::sync::Arc;

use serde::Serialize;

use iota_store::{ClientConfig, ClientConfigStore, ConversationStore};
use iota_ticketing::{TicketCreateOutcome, TicketUpdateOutcome, TicketingClient};

use crate::attachment_flow::{
    upload_conversation_attachment, AttachmentUploadOutcome, AttachmentUploadRequest,
};
use crate::source_credentials::SourceCredentialResolver;
use crate::source_identity::{resolve_source_identity, SourceIdentity};
use crate::ticket_event::{ChatSource, TicketBridgeEvent, TicketEventKind};

const ACK_STATUS_CODE: u16 = 200;
const ACK_BODY: &str = "event accepted";

const REASON_EVENT_UNKNOWN_KIND: &str = "event_unknown_kind";
const REASON_EVENT_UNKNOWN_SOURCE: &str = "event_unknown_source";
const REASON_EVENT_MISSING_IDENTITY: &str = "event_missing_identity";
const REASON_CLIENT_CONFIG_MISSING: &str = "client_config_missing";
const REASON_CLIENT_CONFIG_STORE_ERROR: &str = "client_config_store_error";
const REASON_TICKET_CREATED: &str = "ticket_created";
const REASON_TICKET_ALREADY_OPEN: &str = "ticket_already_open";
const REASON_TICKET_CREATE_RESPONSE_INVALID: &str = "ticket_create_response_invalid";
const REASON_TICKET_CREATE_TRANSPORT_FAILED: &str = "ticket_create_transport_failed";
const REASON_TICKET_RECORD_STORE_ERROR: &str = "ticket_record_store_error";
const REASON_TICKET_RESOLVED: &str = "ticket_resolved";
const REASON_RESOLUTION_RECORD_MISSING: &str = "resolution_record_missing";
const REASON_TICKET_UPDATE_TRANSPORT_FAILED: &str = "ticket_update_transport_failed";
const REASON_RESOLUTION_STORE_ERROR: &str = "resolution_store_error";

const DETAIL_TRUNCATE_CHARS: usize = 240;
const FALLBACK_AGENT_NAME: &str = "an agent";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `TicketEventFlow` values.
pub enum TicketEventFlow {
    Creation,
    Resolution,
    Attachment,
    Rejected,
}

impl TicketEventFlow {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::Resolution => "resolution",
            Self::Attachment => "attachment",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `TicketEventOutcome` values.
pub enum TicketEventOutcome {
    Completed,
    Skipped,
    Rejected,
    Failed,
}

impl TicketEventOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Public struct `TicketEventReport` used across Iota components.
pub struct TicketEventReport {
    pub flow: TicketEventFlow,
    pub outcome: TicketEventOutcome,
    pub reason_code: String,
    pub client_id: String,
    pub source: String,
    pub identity_key: String,
    pub ticket_number: Option<String>,
    pub ticket_sys_id: Option<String>,
    pub poll_attempts: usize,
    pub detail: Option<String>,
}

impl TicketEventReport {
    fn rejected(event: &TicketBridgeEvent, reason_code: &str) -> Self {
        Self {
            flow: TicketEventFlow::Rejected,
            outcome: TicketEventOutcome::Rejected,
            reason_code: reason_code.to_string(),
            client_id: event.client_id.trim().to_string(),
            source: event.source.trim().to_string(),
            identity_key: String::new(),
            ticket_number: None,
            ticket_sys_id: None,
            poll_attempts: 0,
            detail: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Fixed acknowledgment returned to the invoker regardless of flow outcome.
pub struct TicketEventAck {
    pub status_code: u16,
    pub body: String,
}

impl TicketEventAck {
    pub fn accepted() -> Self {
        Self {
            status_code: ACK_STATUS_CODE,
            body: ACK_BODY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Public struct `TicketBridgeConfig` used across Iota components.
pub struct TicketBridgeConfig {
    pub token_url: String,
    pub ticketing_api_base: Option<String>,
}

/// Public struct `TicketBridge` used across Iota components.
///
/// Holds no per-conversation state; everything flows through the injected
/// stores and the external ticketing API.
pub struct TicketBridge {
    client_configs: Arc<dyn ClientConfigStore>,
    slack_conversations: Arc<dyn ConversationStore>,
    teams_conversations: Arc<dyn ConversationStore>,
    zoom_conversations: Arc<dyn ConversationStore>,
    credential_resolver: SourceCredentialResolver,
    config: TicketBridgeConfig,
}

impl TicketBridge {
    pub fn new(
        client_configs: Arc<dyn ClientConfigStore>,
        slack_conversations: Arc<dyn ConversationStore>,
        teams_conversations: Arc<dyn ConversationStore>,
        zoom_conversations: Arc<dyn ConversationStore>,
        config: TicketBridgeConfig,
    ) -> Self {
        let credential_resolver = SourceCredentialResolver::new(&config.token_url);
        Self {
            client_configs,
            slack_conversations,
            teams_conversations,
            zoom_conversations,
            credential_resolver,
            config,
        }
    }

    /// Dispatches the event and emits the rendered report line. The
    /// acknowledgment is fixed: per-flow outcomes are observable in logs and
    /// store state, never in the response.
    pub fn handle_ticket_event(&self, event: &TicketBridgeEvent) -> TicketEventAck {
        let report = self.dispatch_ticket_event(event);
        let line = render_ticket_event_report(&report);
        match report.outcome {
            TicketEventOutcome::Completed | TicketEventOutcome::Skipped => {
                tracing::info!("{line}");
            }
            TicketEventOutcome::Rejected | TicketEventOutcome::Failed => {
                tracing::error!("{line}");
            }
        }
        TicketEventAck::accepted()
    }

    pub fn dispatch_ticket_event(&self, event: &TicketBridgeEvent) -> TicketEventReport {
        let Some(kind) = TicketEventKind::parse(&event.event) else {
            return TicketEventReport::rejected(event, REASON_EVENT_UNKNOWN_KIND);
        };
        let Some(source) = ChatSource::parse(&event.source) else {
            return TicketEventReport::rejected(event, REASON_EVENT_UNKNOWN_SOURCE);
        };

        let config = match self.client_configs.load(&event.client_id) {
            Ok(Some(config)) => config,
            Ok(None) => return TicketEventReport::rejected(event, REASON_CLIENT_CONFIG_MISSING),
            Err(error) => {
                let mut report =
                    TicketEventReport::rejected(event, REASON_CLIENT_CONFIG_STORE_ERROR);
                report.detail = Some(truncate_detail(&format!("{error:#}")));
                return report;
            }
        };

        let Some(identity) = resolve_source_identity(source, event) else {
            return TicketEventReport::rejected(event, REASON_EVENT_MISSING_IDENTITY);
        };

        let store = self.conversation_store(source);
        let ticketing = TicketingClient::new(
            &config.instance,
            &config.ticketing_auth,
            self.config.ticketing_api_base.as_deref(),
        );

        match kind {
            TicketEventKind::Creation => {
                self.run_creation_flow(event, source, &identity, store, &ticketing)
            }
            TicketEventKind::Resolution => {
                self.run_resolution_flow(event, source, &config, &identity, store, &ticketing)
            }
            TicketEventKind::Attachment => {
                self.run_attachment_flow(event, source, &config, &identity, store, &ticketing)
            }
        }
    }

    fn conversation_store(&self, source: ChatSource) -> &dyn ConversationStore {
        match source {
            ChatSource::Slack => self.slack_conversations.as_ref(),
            ChatSource::Teams => self.teams_conversations.as_ref(),
            ChatSource::Zoom => self.zoom_conversations.as_ref(),
        }
    }

    /// Creation is idempotent per identity: an open ticket short-circuits
    /// with no HTTP call and no store mutation. Every failure is captured in
    /// the report; the flow never unwinds past this function.
    fn run_creation_flow(
        &self,
        event: &TicketBridgeEvent,
        source: ChatSource,
        identity: &SourceIdentity,
        store: &dyn ConversationStore,
        ticketing: &TicketingClient,
    ) -> TicketEventReport {
        let mut report = base_report(TicketEventFlow::Creation, event, source, identity);

        let record = match store.load(&identity.key) {
            Ok(record) => record,
            Err(error) => {
                return fail(report, REASON_TICKET_RECORD_STORE_ERROR, Some(format!("{error:#}")))
            }
        };
        if let Some(existing) = &record {
            if existing.has_open_ticket() {
                report.outcome = TicketEventOutcome::Skipped;
                report.reason_code = REASON_TICKET_ALREADY_OPEN.to_string();
                report.ticket_number = existing.ticket_number.clone();
                report.ticket_sys_id = existing.ticket_sys_id.clone();
                return report;
            }
        }

        match ticketing.create_ticket(&event.message, &event.email) {
            TicketCreateOutcome::Created {
                ticket_number,
                ticket_sys_id,
            } => {
                let mut record = record.unwrap_or_default();
                record.set_ticket(&ticket_number, &ticket_sys_id);
                report.ticket_number = Some(ticket_number);
                report.ticket_sys_id = Some(ticket_sys_id);
                if let Err(error) = store.save(&identity.key, &record) {
                    // The ticket exists upstream; the ids in the report are
                    // the only remaining trace of it.
                    return fail(
                        report,
                        REASON_TICKET_RECORD_STORE_ERROR,
                        Some(format!("{error:#}")),
                    );
                }
                report.outcome = TicketEventOutcome::Completed;
                report.reason_code = REASON_TICKET_CREATED.to_string();
                report
            }
            TicketCreateOutcome::HttpRejected { status, body } => {
                fail(report, &format!("ticket_create_http_{status}"), Some(body))
            }
            TicketCreateOutcome::InvalidResponse { detail } => {
                fail(report, REASON_TICKET_CREATE_RESPONSE_INVALID, Some(detail))
            }
            TicketCreateOutcome::TransportFailed { detail } => {
                fail(report, REASON_TICKET_CREATE_TRANSPORT_FAILED, Some(detail))
            }
        }
    }

    /// Resolution posts the chat history as a resolving comment, optionally
    /// attributes the agent, then clears the ticket fields. The transcript is
    /// cleared afterwards as a separate step regardless of the handler
    /// outcome.
    fn run_resolution_flow(
        &self,
        event: &TicketBridgeEvent,
        source: ChatSource,
        config: &ClientConfig,
        identity: &SourceIdentity,
        store: &dyn ConversationStore,
        ticketing: &TicketingClient,
    ) -> TicketEventReport {
        let report = base_report(TicketEventFlow::Resolution, event, source, identity);

        let record = match store.load(&identity.key) {
            Ok(record) => record,
            Err(error) => {
                let report =
                    fail(report, REASON_RESOLUTION_STORE_ERROR, Some(format!("{error:#}")));
                return self.clear_transcript_after_resolution(store, identity, report);
            }
        };

        let chat_history = merged_chat_history(event, config, record.as_ref());
        let report = self.run_resolution_handler(
            event,
            identity,
            store,
            ticketing,
            record,
            &chat_history,
            report,
        );
        self.clear_transcript_after_resolution(store, identity, report)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_resolution_handler(
        &self,
        event: &TicketBridgeEvent,
        identity: &SourceIdentity,
        store: &dyn ConversationStore,
        ticketing: &TicketingClient,
        record: Option<iota_store::ConversationRecord>,
        chat_history: &str,
        mut report: TicketEventReport,
    ) -> TicketEventReport {
        let Some(mut record) = record.filter(|record| record.has_open_ticket()) else {
            report.outcome = TicketEventOutcome::Skipped;
            report.reason_code = REASON_RESOLUTION_RECORD_MISSING.to_string();
            return report;
        };
        let ticket_sys_id = record
            .ticket_sys_id
            .clone()
            .unwrap_or_default()
            .trim()
            .to_string();
        report.ticket_number = record.ticket_number.clone();
        report.ticket_sys_id = Some(ticket_sys_id.clone());

        // Comment + resolve in one call; a rejection keeps the ticket fields
        // so a later resolution event can retry.
        match ticketing.update_ticket(&ticket_sys_id, chat_history, true) {
            TicketUpdateOutcome::Updated => {}
            TicketUpdateOutcome::HttpRejected { status, body } => {
                return fail(report, &format!("ticket_update_http_{status}"), Some(body));
            }
            TicketUpdateOutcome::TransportFailed { detail } => {
                return fail(report, REASON_TICKET_UPDATE_TRANSPORT_FAILED, Some(detail));
            }
        }

        if !event.is_automated {
            // The state transition already happened above; the attribution
            // comment must not re-trigger it.
            let agent_name = record
                .agent_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(FALLBACK_AGENT_NAME);
            let attribution = format!("This conversation was resolved by {agent_name}");
            match ticketing.update_ticket(&ticket_sys_id, &attribution, false) {
                TicketUpdateOutcome::Updated => {}
                TicketUpdateOutcome::HttpRejected { status, body } => {
                    return fail(report, &format!("ticket_update_http_{status}"), Some(body));
                }
                TicketUpdateOutcome::TransportFailed { detail } => {
                    return fail(report, REASON_TICKET_UPDATE_TRANSPORT_FAILED, Some(detail));
                }
            }
        }

        record.clear_ticket_fields();
        if let Err(error) = store.save(&identity.key, &record) {
            return fail(report, REASON_RESOLUTION_STORE_ERROR, Some(format!("{error:#}")));
        }
        report.outcome = TicketEventOutcome::Completed;
        report.reason_code = REASON_TICKET_RESOLVED.to_string();
        report
    }

    /// Separate post-resolution step: drop the stored transcript if the
    /// record exists. Failures here annotate the report instead of replacing
    /// its reason.
    fn clear_transcript_after_resolution(
        &self,
        store: &dyn ConversationStore,
        identity: &SourceIdentity,
        mut report: TicketEventReport,
    ) -> TicketEventReport {
        let cleared = store.load(&identity.key).and_then(|record| {
            let Some(mut record) = record else {
                return Ok(());
            };
            if record.chat_transcript.is_none() {
                return Ok(());
            }
            record.clear_transcript();
            store.save(&identity.key, &record)
        });
        if let Err(error) = cleared {
            let note = format!("transcript_clear_failed: {error:#}");
            report.detail = Some(match report.detail.take() {
                Some(existing) => format!("{existing}; {note}"),
                None => note,
            });
        }
        report
    }

    fn run_attachment_flow(
        &self,
        event: &TicketBridgeEvent,
        source: ChatSource,
        config: &ClientConfig,
        identity: &SourceIdentity,
        store: &dyn ConversationStore,
        ticketing: &TicketingClient,
    ) -> TicketEventReport {
        let mut report = base_report(TicketEventFlow::Attachment, event, source, identity);

        // The source credential is only consumed here, so Teams token
        // exchange happens per attachment event rather than per dispatch.
        let credential = self.credential_resolver.resolve(source, config);
        let upload = upload_conversation_attachment(&AttachmentUploadRequest {
            ticketing,
            store,
            identity_key: &identity.key,
            file_link: &event.file_link,
            file_type: &event.file_type,
            file_name: &event.file_name,
            source_credential: credential.value.as_deref(),
            from_platform: event.from_platform,
        });

        report.outcome = match upload.outcome {
            AttachmentUploadOutcome::Uploaded => TicketEventOutcome::Completed,
            AttachmentUploadOutcome::Skipped => TicketEventOutcome::Skipped,
            AttachmentUploadOutcome::Failed => TicketEventOutcome::Failed,
        };
        report.reason_code = upload.reason_code;
        report.ticket_sys_id = upload.ticket_sys_id;
        report.poll_attempts = upload.poll_attempts;
        report.detail = match (upload.uploaded_file_name, upload.detail) {
            (Some(file_name), Some(detail)) => Some(format!("file_name={file_name}; {detail}")),
            (Some(file_name), None) => Some(format!("file_name={file_name}")),
            (None, detail) => detail,
        };
        report
    }
}

fn base_report(
    flow: TicketEventFlow,
    event: &TicketBridgeEvent,
    source: ChatSource,
    identity: &SourceIdentity,
) -> TicketEventReport {
    TicketEventReport {
        flow,
        outcome: TicketEventOutcome::Failed,
        reason_code: String::new(),
        client_id: event.client_id.trim().to_string(),
        source: source.as_str().to_string(),
        identity_key: identity.key.clone(),
        ticket_number: None,
        ticket_sys_id: None,
        poll_attempts: 0,
        detail: None,
    }
}

fn fail(
    mut report: TicketEventReport,
    reason_code: &str,
    detail: Option<String>,
) -> TicketEventReport {
    report.outcome = TicketEventOutcome::Failed;
    report.reason_code = reason_code.to_string();
    report.detail = detail
        .map(|detail| truncate_detail(&detail))
        .filter(|detail| !detail.is_empty());
    report
}

/// When translation is enabled and the record holds a transcript, the
/// resolving comment carries both languages.
fn merged_chat_history(
    event: &TicketBridgeEvent,
    config: &ClientConfig,
    record: Option<&iota_store::ConversationRecord>,
) -> String {
    if !config.translation_enabled {
        return event.chat_history.clone();
    }
    let transcript = record
        .and_then(|record| record.chat_transcript.as_deref())
        .map(str::trim)
        .filter(|transcript| !transcript.is_empty());
    match transcript {
        Some(transcript) => format!(
            "English:\n{}\n\nUser Preferred Language:\n{}",
            event.chat_history, transcript
        ),
        None => event.chat_history.clone(),
    }
}

fn truncate_detail(raw: &str) -> String {
    raw.chars().take(DETAIL_TRUNCATE_CHARS).collect()
}

/// Renders one deterministic log line per handled event.
pub fn render_ticket_event_report(report: &TicketEventReport) -> String {
    format!(
        "ticket event: flow={} outcome={} reason_code={} client_id={} source={} identity_key={} ticket_number={} ticket_sys_id={} poll_attempts={} detail={}",
        report.flow.as_str(),
        report.outcome.as_str(),
        report.reason_code,
        none_fallback(&report.client_id),
        none_fallback(&report.source),
        none_fallback(&report.identity_key),
        optional_fallback(report.ticket_number.as_deref()),
        optional_fallback(report.ticket_sys_id.as_deref()),
        report.poll_attempts,
        optional_fallback(report.detail.as_deref()),
    )
}

fn none_fallback(value: &str) -> &str {
    if value.trim().is_empty() {
        "none"
    } else {
        value
    }
}

fn optional_fallback(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.replace('\n', " "))
        .unwrap_or_else(|| "none".to_string())
}
