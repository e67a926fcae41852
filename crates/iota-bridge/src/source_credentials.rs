//! Source credential resolution for downloads from the chat platform.
//!
//! Slack and Zoom credentials are static values from client configuration.
//! Teams requires a client-credentials token exchange; a failed exchange
//! resolves to no credential and downstream calls proceed without one, failing
//! at the HTTP layer if the platform requires auth. No retry here.

use serde_json::Value;

use iota_store::ClientConfig;

use crate::ticket_event::ChatSource;

const CREDENTIAL_REASON_RESOLVED: &str = "credential_resolved";
const CREDENTIAL_REASON_MISSING: &str = "credential_missing";
const CREDENTIAL_REASON_TOKEN_RESPONSE_INVALID: &str = "token_exchange_response_invalid";
const CREDENTIAL_REASON_TOKEN_TRANSPORT_FAILED: &str = "token_exchange_transport_failed";
const CREDENTIAL_REASON_TOKEN_URL_MISSING: &str = "token_exchange_url_missing";

const DETAIL_TRUNCATE_CHARS: usize = 240;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `ResolvedSourceCredential` used across Iota components.
pub struct ResolvedSourceCredential {
    pub value: Option<String>,
    pub source: &'static str,
    pub reason_code: String,
    pub detail: Option<String>,
}

impl ResolvedSourceCredential {
    fn from_static(raw: &str) -> Self {
        let value = raw.trim();
        if value.is_empty() {
            Self {
                value: None,
                source: "client_config",
                reason_code: CREDENTIAL_REASON_MISSING.to_string(),
                detail: None,
            }
        } else {
            Self {
                value: Some(value.to_string()),
                source: "client_config",
                reason_code: CREDENTIAL_REASON_RESOLVED.to_string(),
                detail: None,
            }
        }
    }
}

/// Public struct `SourceCredentialResolver` used across Iota components.
pub struct SourceCredentialResolver {
    http: reqwest::blocking::Client,
    token_url: String,
}

impl SourceCredentialResolver {
    pub fn new(token_url: &str) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            token_url: token_url.trim().to_string(),
        }
    }

    pub fn resolve(&self, source: ChatSource, config: &ClientConfig) -> ResolvedSourceCredential {
        match source {
            ChatSource::Slack => ResolvedSourceCredential::from_static(&config.slack_auth),
            ChatSource::Zoom => ResolvedSourceCredential::from_static(&config.zoom_auth),
            ChatSource::Teams => self.exchange_teams_token(config),
        }
    }

    fn exchange_teams_token(&self, config: &ClientConfig) -> ResolvedSourceCredential {
        if self.token_url.is_empty() {
            return ResolvedSourceCredential {
                value: None,
                source: "token_exchange",
                reason_code: CREDENTIAL_REASON_TOKEN_URL_MISSING.to_string(),
                detail: None,
            };
        }

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", config.teams_client_id.as_str()),
            ("client_secret", config.teams_client_secret.as_str()),
            ("scope", config.teams_scope.as_str()),
        ];
        let response = self.http.post(&self.token_url).form(&form).send();
        let response = match response {
            Ok(response) => response,
            Err(error) => {
                return ResolvedSourceCredential {
                    value: None,
                    source: "token_exchange",
                    reason_code: CREDENTIAL_REASON_TOKEN_TRANSPORT_FAILED.to_string(),
                    detail: Some(error.to_string()),
                }
            }
        };

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().unwrap_or_default();
            return ResolvedSourceCredential {
                value: None,
                source: "token_exchange",
                reason_code: format!("token_exchange_http_{status}"),
                detail: Some(body.chars().take(DETAIL_TRUNCATE_CHARS).collect()),
            };
        }

        let access_token = response
            .json::<Value>()
            .ok()
            .as_ref()
            .and_then(|body| body.get("access_token"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        match access_token {
            Some(access_token) => ResolvedSourceCredential {
                value: Some(format!("Bearer {access_token}")),
                source: "token_exchange",
                reason_code: CREDENTIAL_REASON_RESOLVED.to_string(),
                detail: None,
            },
            None => ResolvedSourceCredential {
                value: None,
                source: "token_exchange",
                reason_code: CREDENTIAL_REASON_TOKEN_RESPONSE_INVALID.to_string(),
                detail: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::POST, MockServer};

    use iota_store::ClientConfig;

    use super::SourceCredentialResolver;
    use crate::ticket_event::ChatSource;

    fn teams_config() -> ClientConfig {
        ClientConfig {
            instance: "acme".to_string(),
            ticketing_auth: "Basic x".to_string(),
            teams_client_id: "app-id".to_string(),
            teams_client_secret: "app-secret".to_string(),
            teams_scope: "https://graph.example/.default".to_string(),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn unit_static_sources_resolve_from_client_config() {
        let resolver = SourceCredentialResolver::new("");
        let config = ClientConfig {
            slack_auth: " Bearer slack-token ".to_string(),
            ..ClientConfig::default()
        };
        let resolved = resolver.resolve(ChatSource::Slack, &config);
        assert_eq!(resolved.value.as_deref(), Some("Bearer slack-token"));
        assert_eq!(resolved.source, "client_config");
        assert_eq!(resolved.reason_code, "credential_resolved");

        let missing = resolver.resolve(ChatSource::Zoom, &config);
        assert!(missing.value.is_none());
        assert_eq!(missing.reason_code, "credential_missing");
    }

    #[test]
    fn functional_teams_token_exchange_returns_bearer_credential() {
        let server = MockServer::start();
        let token = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .body_includes("grant_type=client_credentials")
                .body_includes("client_id=app-id")
                .body_includes("client_secret=app-secret");
            then.status(200)
                .json_body_obj(&serde_json::json!({ "access_token": "tok-123" }));
        });

        let resolver = SourceCredentialResolver::new(&server.url("/token"));
        let resolved = resolver.resolve(ChatSource::Teams, &teams_config());
        token.assert();
        assert_eq!(resolved.value.as_deref(), Some("Bearer tok-123"));
        assert_eq!(resolved.source, "token_exchange");
        assert_eq!(resolved.reason_code, "credential_resolved");
    }

    #[test]
    fn functional_teams_token_exchange_failure_resolves_to_no_credential() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(401).body("invalid client secret");
        });

        let resolver = SourceCredentialResolver::new(&server.url("/token"));
        let resolved = resolver.resolve(ChatSource::Teams, &teams_config());
        assert!(resolved.value.is_none());
        assert_eq!(resolved.reason_code, "token_exchange_http_401");
        assert_eq!(resolved.detail.as_deref(), Some("invalid client secret"));
    }

    #[test]
    fn regression_teams_token_response_without_access_token_is_invalid() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200)
                .json_body_obj(&serde_json::json!({ "token_type": "Bearer" }));
        });

        let resolver = SourceCredentialResolver::new(&server.url("/token"));
        let resolved = resolver.resolve(ChatSource::Teams, &teams_config());
        assert!(resolved.value.is_none());
        assert_eq!(resolved.reason_code, "token_exchange_response_invalid");
    }
}
