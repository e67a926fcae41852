//! Attachment upload workflow: poll for the ticket id, download, upload.
//!
//! The poll tolerates the race where a creation event for the same
//! conversation has not yet written the ticket system id. A missing record is
//! aborted immediately; an id that never appears within the fixed bound times
//! out. Upload failures are reported, never raised.

use std::time::Duration;

use iota_store::ConversationStore;
use iota_ticketing::{file_name_stem, AttachmentFileType, AttachmentPostOutcome, TicketingClient};

pub const ATTACHMENT_POLL_MAX_ATTEMPTS: usize = 10;
pub const ATTACHMENT_POLL_INTERVAL_MS: u64 = 1_000;

const ATTACHMENT_REASON_UPLOADED: &str = "attachment_uploaded";
const ATTACHMENT_REASON_RECORD_MISSING: &str = "attachment_record_missing";
const ATTACHMENT_REASON_TICKET_ID_TIMEOUT: &str = "attachment_ticket_id_timeout";
const ATTACHMENT_REASON_STORE_ERROR: &str = "attachment_store_error";
const ATTACHMENT_REASON_UNSUPPORTED_FILE_TYPE: &str = "attachment_unsupported_file_type";
const ATTACHMENT_REASON_DOWNLOAD_FAILED: &str = "attachment_download_failed";
const ATTACHMENT_REASON_UPLOAD_TRANSPORT_FAILED: &str = "attachment_upload_transport_failed";

const DETAIL_TRUNCATE_CHARS: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `AttachmentUploadOutcome` values.
pub enum AttachmentUploadOutcome {
    Uploaded,
    Skipped,
    Failed,
}

impl AttachmentUploadOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `AttachmentUploadReport` used across Iota components.
pub struct AttachmentUploadReport {
    pub outcome: AttachmentUploadOutcome,
    pub reason_code: String,
    pub poll_attempts: usize,
    pub ticket_sys_id: Option<String>,
    pub uploaded_file_name: Option<String>,
    pub detail: Option<String>,
}

impl AttachmentUploadReport {
    fn failed(reason_code: impl Into<String>, poll_attempts: usize) -> Self {
        Self {
            outcome: AttachmentUploadOutcome::Failed,
            reason_code: reason_code.into(),
            poll_attempts,
            ticket_sys_id: None,
            uploaded_file_name: None,
            detail: None,
        }
    }
}

/// Public struct `AttachmentUploadRequest` used across Iota components.
pub struct AttachmentUploadRequest<'a> {
    pub ticketing: &'a TicketingClient,
    pub store: &'a dyn ConversationStore,
    pub identity_key: &'a str,
    pub file_link: &'a str,
    pub file_type: &'a str,
    pub file_name: &'a str,
    pub source_credential: Option<&'a str>,
    pub from_platform: bool,
}

pub fn upload_conversation_attachment(request: &AttachmentUploadRequest) -> AttachmentUploadReport {
    upload_with_poll_bounds(
        request,
        ATTACHMENT_POLL_MAX_ATTEMPTS,
        Duration::from_millis(ATTACHMENT_POLL_INTERVAL_MS),
    )
}

fn upload_with_poll_bounds(
    request: &AttachmentUploadRequest,
    max_attempts: usize,
    interval: Duration,
) -> AttachmentUploadReport {
    let (ticket_sys_id, poll_attempts) =
        match poll_ticket_sys_id(request.store, request.identity_key, max_attempts, interval) {
            TicketIdPoll::Found { sys_id, attempts } => (sys_id, attempts),
            TicketIdPoll::RecordMissing { attempts } => {
                return AttachmentUploadReport::failed(ATTACHMENT_REASON_RECORD_MISSING, attempts)
            }
            TicketIdPoll::TimedOut { attempts } => {
                return AttachmentUploadReport::failed(ATTACHMENT_REASON_TICKET_ID_TIMEOUT, attempts)
            }
            TicketIdPoll::StoreError { attempts, detail } => {
                let mut report =
                    AttachmentUploadReport::failed(ATTACHMENT_REASON_STORE_ERROR, attempts);
                report.detail = Some(detail);
                return report;
            }
        };

    let Some(file_type) = AttachmentFileType::parse(request.file_type) else {
        return AttachmentUploadReport {
            outcome: AttachmentUploadOutcome::Skipped,
            reason_code: ATTACHMENT_REASON_UNSUPPORTED_FILE_TYPE.to_string(),
            poll_attempts,
            ticket_sys_id: Some(ticket_sys_id),
            uploaded_file_name: None,
            detail: Some(format!("file_type '{}'", request.file_type.trim())),
        };
    };

    let bytes = match download_attachment(request, file_type) {
        Ok(bytes) => bytes,
        Err(failure) => {
            let mut report = AttachmentUploadReport::failed(failure.reason_code, poll_attempts);
            report.ticket_sys_id = Some(ticket_sys_id);
            report.detail = failure.detail;
            return report;
        }
    };

    let uploaded_file_name = format!("{}.{}", file_name_stem(request.file_name), file_type.extension());
    match request.ticketing.upload_attachment(
        &ticket_sys_id,
        &uploaded_file_name,
        file_type.content_type(),
        bytes,
    ) {
        AttachmentPostOutcome::Uploaded => AttachmentUploadReport {
            outcome: AttachmentUploadOutcome::Uploaded,
            reason_code: ATTACHMENT_REASON_UPLOADED.to_string(),
            poll_attempts,
            ticket_sys_id: Some(ticket_sys_id),
            uploaded_file_name: Some(uploaded_file_name),
            detail: None,
        },
        AttachmentPostOutcome::HttpRejected { status, body } => {
            let mut report = AttachmentUploadReport::failed(
                format!("attachment_upload_http_{status}"),
                poll_attempts,
            );
            report.ticket_sys_id = Some(ticket_sys_id);
            report.uploaded_file_name = Some(uploaded_file_name);
            report.detail = Some(body);
            report
        }
        AttachmentPostOutcome::TransportFailed { detail } => {
            let mut report = AttachmentUploadReport::failed(
                ATTACHMENT_REASON_UPLOAD_TRANSPORT_FAILED,
                poll_attempts,
            );
            report.ticket_sys_id = Some(ticket_sys_id);
            report.detail = Some(detail);
            report
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TicketIdPoll {
    Found { sys_id: String, attempts: usize },
    RecordMissing { attempts: usize },
    TimedOut { attempts: usize },
    StoreError { attempts: usize, detail: String },
}

/// Reads the mapping record until it carries a ticket system id. A record
/// absent on any read aborts immediately; an empty id is the racing-creation
/// case and is retried with a sleep between attempts.
fn poll_ticket_sys_id(
    store: &dyn ConversationStore,
    identity_key: &str,
    max_attempts: usize,
    interval: Duration,
) -> TicketIdPoll {
    let max_attempts = max_attempts.max(1);
    for attempt in 1..=max_attempts {
        let record = match store.load(identity_key) {
            Ok(record) => record,
            Err(error) => {
                return TicketIdPoll::StoreError {
                    attempts: attempt,
                    detail: format!("{error:#}").chars().take(DETAIL_TRUNCATE_CHARS).collect(),
                }
            }
        };
        let Some(record) = record else {
            return TicketIdPoll::RecordMissing { attempts: attempt };
        };
        if let Some(sys_id) = record
            .ticket_sys_id
            .as_deref()
            .map(str::trim)
            .filter(|sys_id| !sys_id.is_empty())
        {
            return TicketIdPoll::Found {
                sys_id: sys_id.to_string(),
                attempts: attempt,
            };
        }
        if attempt < max_attempts {
            std::thread::sleep(interval);
        }
    }
    TicketIdPoll::TimedOut {
        attempts: max_attempts,
    }
}

struct DownloadFailure {
    reason_code: String,
    detail: Option<String>,
}

/// Platform-served images are fetched without auth; every other supported
/// case sends the source credential as the raw Authorization value when
/// present.
fn download_attachment(
    request: &AttachmentUploadRequest,
    file_type: AttachmentFileType,
) -> Result<Vec<u8>, DownloadFailure> {
    let client = reqwest::blocking::Client::new();
    let mut download = client.get(request.file_link);
    let skip_auth = file_type.is_image() && request.from_platform;
    if !skip_auth {
        if let Some(credential) = request.source_credential {
            download = download.header(reqwest::header::AUTHORIZATION, credential);
        }
    }

    let response = download.send().map_err(|error| DownloadFailure {
        reason_code: ATTACHMENT_REASON_DOWNLOAD_FAILED.to_string(),
        detail: Some(error.to_string()),
    })?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(DownloadFailure {
            reason_code: format!("attachment_download_http_{}", status.as_u16()),
            detail: Some(body.chars().take(DETAIL_TRUNCATE_CHARS).collect()),
        });
    }
    let bytes = response.bytes().map_err(|error| DownloadFailure {
        reason_code: ATTACHMENT_REASON_DOWNLOAD_FAILED.to_string(),
        detail: Some(error.to_string()),
    })?;
    Ok(bytes.to_vec())
}
