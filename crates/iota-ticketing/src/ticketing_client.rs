//! Blocking REST client for the external incident API.
//!
//! Three operations: create an incident, comment on (and optionally resolve)
//! an incident, and attach a file. Every non-success path is a typed outcome
//! rather than an error so callers can map it to a report without unwinding.

use serde_json::{json, Value};

/// Wire value of the resolved lifecycle state on the incident table.
pub const RESOLVED_STATE_WIRE_VALUE: &str = "6";

const DETAIL_TRUNCATE_CHARS: usize = 240;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of a ticket-creation call.
pub enum TicketCreateOutcome {
    Created {
        ticket_number: String,
        ticket_sys_id: String,
    },
    HttpRejected {
        status: u16,
        body: String,
    },
    InvalidResponse {
        detail: String,
    },
    TransportFailed {
        detail: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of a comment/resolve call.
pub enum TicketUpdateOutcome {
    Updated,
    HttpRejected { status: u16, body: String },
    TransportFailed { detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of an attachment upload call.
pub enum AttachmentPostOutcome {
    Uploaded,
    HttpRejected { status: u16, body: String },
    TransportFailed { detail: String },
}

/// Public struct `TicketingClient` used across Iota components.
///
/// Calls block with no explicit timeout; one bridge invocation is one
/// synchronous unit of work and a hung upstream blocks it.
pub struct TicketingClient {
    http: reqwest::blocking::Client,
    api_base: String,
    auth: String,
}

impl TicketingClient {
    /// The default api base for instance `x` is
    /// `https://x.service-now.com/api/now`; tests and nonstandard deployments
    /// pass an override.
    pub fn new(instance: &str, auth: &str, api_base_override: Option<&str>) -> Self {
        let api_base = match api_base_override {
            Some(base) if !base.trim().is_empty() => base.trim().trim_end_matches('/').to_string(),
            _ => format!("https://{}.service-now.com/api/now", instance.trim()),
        };
        Self {
            http: reqwest::blocking::Client::new(),
            api_base,
            auth: auth.to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Creates an incident titled from the message with the reporter as
    /// caller. Expects exactly 201; the ids are parsed defensively so a
    /// malformed body surfaces as `InvalidResponse` instead of a fault.
    pub fn create_ticket(&self, message: &str, reporter_email: &str) -> TicketCreateOutcome {
        let payload = json!({
            "short_description": title_case(message),
            "caller_id": reporter_email,
        });
        let response = self
            .http
            .post(format!("{}/table/incident", self.api_base))
            .header(reqwest::header::AUTHORIZATION, self.auth.as_str())
            .json(&payload)
            .send();
        let response = match response {
            Ok(response) => response,
            Err(error) => {
                return TicketCreateOutcome::TransportFailed {
                    detail: error.to_string(),
                }
            }
        };

        let status = response.status().as_u16();
        if status != 201 {
            let body = response.text().unwrap_or_default();
            return TicketCreateOutcome::HttpRejected {
                status,
                body: truncate_for_detail(&body),
            };
        }

        let body = match response.json::<Value>() {
            Ok(body) => body,
            Err(error) => {
                return TicketCreateOutcome::InvalidResponse {
                    detail: format!("ticket create response is not json: {error}"),
                }
            }
        };
        let ticket_number = non_empty_response_field(&body, "number");
        let ticket_sys_id = non_empty_response_field(&body, "sys_id");
        match (ticket_number, ticket_sys_id) {
            (Some(ticket_number), Some(ticket_sys_id)) => TicketCreateOutcome::Created {
                ticket_number,
                ticket_sys_id,
            },
            _ => TicketCreateOutcome::InvalidResponse {
                detail: "ticket create response missing result.number or result.sys_id"
                    .to_string(),
            },
        }
    }

    /// Posts a comment on an incident; `resolve` additionally transitions it
    /// to the resolved state in the same call. Expects exactly 200.
    pub fn update_ticket(
        &self,
        ticket_sys_id: &str,
        comment: &str,
        resolve: bool,
    ) -> TicketUpdateOutcome {
        let payload = update_payload(comment, resolve);
        let response = self
            .http
            .put(format!("{}/table/incident/{}", self.api_base, ticket_sys_id))
            .header(reqwest::header::AUTHORIZATION, self.auth.as_str())
            .json(&payload)
            .send();
        let response = match response {
            Ok(response) => response,
            Err(error) => {
                return TicketUpdateOutcome::TransportFailed {
                    detail: error.to_string(),
                }
            }
        };
        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().unwrap_or_default();
            return TicketUpdateOutcome::HttpRejected {
                status,
                body: truncate_for_detail(&body),
            };
        }
        TicketUpdateOutcome::Updated
    }

    /// Uploads raw bytes as a named attachment on an incident. Expects
    /// exactly 201.
    pub fn upload_attachment(
        &self,
        ticket_sys_id: &str,
        file_name: &str,
        content_type: &'static str,
        bytes: Vec<u8>,
    ) -> AttachmentPostOutcome {
        let response = self
            .http
            .post(format!("{}/attachment/file", self.api_base))
            .query(&[
                ("table_name", "incident"),
                ("table_sys_id", ticket_sys_id),
                ("file_name", file_name),
            ])
            .header(reqwest::header::AUTHORIZATION, self.auth.as_str())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::ACCEPT, "application/json")
            .body(bytes)
            .send();
        let response = match response {
            Ok(response) => response,
            Err(error) => {
                return AttachmentPostOutcome::TransportFailed {
                    detail: error.to_string(),
                }
            }
        };
        let status = response.status().as_u16();
        if status != 201 {
            let body = response.text().unwrap_or_default();
            return AttachmentPostOutcome::HttpRejected {
                status,
                body: truncate_for_detail(&body),
            };
        }
        AttachmentPostOutcome::Uploaded
    }
}

fn update_payload(comment: &str, resolve: bool) -> Value {
    let mut payload = json!({ "comments": comment });
    if resolve {
        payload["state"] = Value::String(RESOLVED_STATE_WIRE_VALUE.to_string());
    }
    payload
}

fn non_empty_response_field(body: &Value, field: &str) -> Option<String> {
    body.get("result")
        .and_then(|result| result.get(field))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn truncate_for_detail(raw: &str) -> String {
    raw.chars().take(DETAIL_TRUNCATE_CHARS).collect()
}

/// Word-initial capitalization for the incident short description: the first
/// letter after any non-letter is uppercased, every other letter lowercased.
pub fn title_case(raw: &str) -> String {
    let mut titled = String::with_capacity(raw.len());
    let mut at_word_start = true;
    for character in raw.chars() {
        if character.is_alphabetic() {
            if at_word_start {
                titled.extend(character.to_uppercase());
            } else {
                titled.extend(character.to_lowercase());
            }
            at_word_start = false;
        } else {
            titled.push(character);
            at_word_start = true;
        }
    }
    titled
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::POST, Method::PUT, MockServer};

    use super::{
        title_case, update_payload, AttachmentPostOutcome, TicketCreateOutcome,
        TicketUpdateOutcome, TicketingClient,
    };

    #[test]
    fn unit_title_case_matches_word_initial_capitalization() {
        assert_eq!(title_case("printer is on fire"), "Printer Is On Fire");
        assert_eq!(title_case("VPN won't connect"), "Vpn Won'T Connect");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn unit_update_payload_carries_state_only_when_resolving() {
        let resolving = update_payload("done", true);
        assert_eq!(resolving["comments"], "done");
        assert_eq!(resolving["state"], "6");

        let comment_only = update_payload("follow up", false);
        assert_eq!(comment_only["comments"], "follow up");
        assert!(comment_only.get("state").is_none());
    }

    #[test]
    fn unit_new_builds_default_api_base_from_instance() {
        let client = TicketingClient::new("acme", "Basic x", None);
        assert_eq!(client.api_base(), "https://acme.service-now.com/api/now");
        let overridden = TicketingClient::new("acme", "Basic x", Some("http://localhost:8080/"));
        assert_eq!(overridden.api_base(), "http://localhost:8080");
    }

    #[test]
    fn functional_create_ticket_parses_number_and_sys_id_on_201() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/table/incident")
                .header("authorization", "Basic x")
                .body_includes("\"short_description\":\"Printer Broken\"")
                .body_includes("\"caller_id\":\"user@example.com\"");
            then.status(201).json_body_obj(&serde_json::json!({
                "result": { "number": "INC0001", "sys_id": "sys-1" }
            }));
        });

        let client = TicketingClient::new("acme", "Basic x", Some(&server.url("")));
        let outcome = client.create_ticket("printer broken", "user@example.com");
        create.assert();
        assert_eq!(
            outcome,
            TicketCreateOutcome::Created {
                ticket_number: "INC0001".to_string(),
                ticket_sys_id: "sys-1".to_string(),
            }
        );
    }

    #[test]
    fn functional_create_ticket_reports_non_201_status_with_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/table/incident");
            then.status(403).body("insufficient rights");
        });

        let client = TicketingClient::new("acme", "Basic x", Some(&server.url("")));
        let outcome = client.create_ticket("printer broken", "user@example.com");
        assert_eq!(
            outcome,
            TicketCreateOutcome::HttpRejected {
                status: 403,
                body: "insufficient rights".to_string(),
            }
        );
    }

    #[test]
    fn regression_create_ticket_treats_missing_result_fields_as_invalid_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/table/incident");
            then.status(201)
                .json_body_obj(&serde_json::json!({ "result": { "number": "INC0001" } }));
        });

        let client = TicketingClient::new("acme", "Basic x", Some(&server.url("")));
        match client.create_ticket("printer broken", "user@example.com") {
            TicketCreateOutcome::InvalidResponse { detail } => {
                assert!(detail.contains("result.number or result.sys_id"));
            }
            other => panic!("expected invalid response, got {other:?}"),
        }
    }

    #[test]
    fn functional_update_ticket_includes_state_only_when_resolving() {
        let server = MockServer::start();
        let resolve = server.mock(|when, then| {
            when.method(PUT)
                .path("/table/incident/sys-1")
                .body_includes("\"comments\":\"done\"")
                .body_includes("\"state\":\"6\"");
            then.status(200);
        });
        let comment_only = server.mock(|when, then| {
            when.method(PUT)
                .path("/table/incident/sys-2")
                .body_includes("\"comments\":\"follow up\"");
            then.status(200);
        });

        let client = TicketingClient::new("acme", "Basic x", Some(&server.url("")));
        assert_eq!(
            client.update_ticket("sys-1", "done", true),
            TicketUpdateOutcome::Updated
        );
        assert_eq!(
            client.update_ticket("sys-2", "follow up", false),
            TicketUpdateOutcome::Updated
        );
        resolve.assert();
        comment_only.assert();
    }

    #[test]
    fn functional_upload_attachment_sends_typed_content_and_query() {
        let server = MockServer::start();
        let upload = server.mock(|when, then| {
            when.method(POST)
                .path("/attachment/file")
                .query_param("table_name", "incident")
                .query_param("table_sys_id", "sys-1")
                .query_param("file_name", "report.pdf")
                .header("content-type", "application/pdf")
                .header("accept", "application/json");
            then.status(201);
        });

        let client = TicketingClient::new("acme", "Basic x", Some(&server.url("")));
        let outcome = client.upload_attachment(
            "sys-1",
            "report.pdf",
            "application/pdf",
            vec![0x25, 0x50, 0x44, 0x46],
        );
        upload.assert();
        assert_eq!(outcome, AttachmentPostOutcome::Uploaded);
    }
}
