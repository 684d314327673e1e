//! HTTP draft store implementation.

use std::time::Duration;

use async_trait::async_trait;
use outreach_core::{
    DraftHandle, DraftStatus, HistoryEntry, HistoryStatus, OutreachError, ProspectId, Result,
    SendFailureClass, StoreConfig,
};
use outreach_state::{DraftStore, GeneratedDraft, RemoteDraftState};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Draft store backed by the outreach backend's HTTP API.
#[derive(Clone)]
pub struct HttpDraftStore {
    /// Base URL of the backend, without a trailing slash.
    base_url: String,

    /// Bearer token for every request.
    api_token: Option<String>,

    /// HTTP client.
    http_client: reqwest::Client,
}

/// Response from the health endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Message ids arrive as integers from the backend; accept strings too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageId {
    Number(i64),
    Text(String),
}

impl From<MessageId> for DraftHandle {
    fn from(id: MessageId) -> Self {
        match id {
            MessageId::Number(n) => DraftHandle::new(n.to_string()),
            MessageId::Text(s) => DraftHandle::new(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DraftsResponse {
    #[serde(default)]
    has_draft: bool,
    email_log_id: Option<MessageId>,
    personalized_opening: Option<String>,
    full_body: Option<String>,
    status: Option<String>,
    #[serde(default)]
    history: Vec<HistoryItem>,
}

#[derive(Debug, Deserialize)]
struct HistoryItem {
    body: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    email_log_id: MessageId,
    #[serde(default)]
    rag_context_used: Option<String>,
    generated_line: String,
}

#[derive(Debug, Serialize)]
struct FinalizeRequest<'a> {
    subject: &'a str,
    edited_body: &'a str,
}

#[derive(Debug, Serialize)]
struct AdHocRequest<'a> {
    subject: &'a str,
    body: &'a str,
}

/// Error body returned by the backend.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

impl From<DraftsResponse> for RemoteDraftState {
    fn from(response: DraftsResponse) -> Self {
        let history = response
            .history
            .into_iter()
            .map(|item| HistoryEntry {
                body: item.body.unwrap_or_default(),
                status: HistoryStatus::from(
                    item.status
                        .as_deref()
                        .map(DraftStatus::from_store)
                        .unwrap_or(DraftStatus::Draft),
                ),
            })
            .collect();

        RemoteDraftState {
            has_draft: response.has_draft,
            draft_handle: response.email_log_id.map(DraftHandle::from),
            opening_line: response.personalized_opening,
            full_body: response.full_body,
            status: response.status.as_deref().map(DraftStatus::from_store),
            history,
        }
    }
}

impl HttpDraftStore {
    /// Build a store client from configuration. Performs no network I/O.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| OutreachError::Config(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
            http_client,
        })
    }

    /// Build a store client and verify the backend answers its health check.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let store = Self::new(config)?;
        store.health().await?;
        Ok(store)
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query the backend's health endpoint.
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .request(Method::GET, "/health")
            .send()
            .await
            .map_err(|e| OutreachError::ConnectionError(e.to_string()))?
            .error_for_status()
            .map_err(|e| OutreachError::ConnectionError(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| OutreachError::SerializationError(e.to_string()))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http_client.request(method, url);
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_request(&self, builder: RequestBuilder) -> Result<()> {
        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "Send request did not complete");
            OutreachError::send_transient(None)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let reason = failure_detail(response).await;
        let class = classify_send_failure(status, reason.as_deref());
        debug!(%status, ?class, reason = ?reason, "Send rejected by backend");
        Err(OutreachError::SendFailed { reason, class })
    }
}

/// Extract the backend's `detail` message from a failed response.
async fn failure_detail(response: Response) -> Option<String> {
    let text = response.text().await.ok()?;
    let body: ErrorBody = serde_json::from_str(&text).ok()?;
    match body.detail {
        serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail),
        serde_json::Value::Null => None,
        serde_json::Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

/// Decide whether retrying a failed send could help.
fn classify_send_failure(status: StatusCode, reason: Option<&str>) -> SendFailureClass {
    let mentions_credentials = reason
        .map(|r| {
            let lower = r.to_ascii_lowercase();
            lower.contains("smtp") || lower.contains("credential")
        })
        .unwrap_or(false);

    match status.as_u16() {
        400 | 412 | 422 => SendFailureClass::Configuration,
        _ if mentions_credentials => SendFailureClass::Configuration,
        _ => SendFailureClass::Transient,
    }
}

#[async_trait]
impl DraftStore for HttpDraftStore {
    async fn fetch_draft_or_history(&self, prospect_id: ProspectId) -> Result<RemoteDraftState> {
        let path = format!("/api/v1/research/{}/drafts", prospect_id);

        let response = self
            .request(Method::GET, &path)
            .send()
            .await
            .map_err(|e| OutreachError::ConnectionError(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(OutreachError::NotFound {
                resource_type: "Prospect".to_string(),
                id: prospect_id.to_string(),
            });
        }

        let response = response
            .error_for_status()
            .map_err(|e| OutreachError::ConnectionError(e.to_string()))?;

        let drafts: DraftsResponse = response
            .json()
            .await
            .map_err(|e| OutreachError::SerializationError(e.to_string()))?;

        Ok(drafts.into())
    }

    async fn generate_draft(&self, prospect_id: ProspectId) -> Result<GeneratedDraft> {
        let path = format!("/api/v1/research/{}/generate", prospect_id);

        let response = self
            .request(Method::POST, &path)
            .send()
            .await
            .map_err(|e| {
                warn!(%prospect_id, error = %e, "Generate request did not complete");
                OutreachError::GenerationFailed { reason: None }
            })?;

        if !response.status().is_success() {
            let reason = failure_detail(response).await;
            return Err(OutreachError::GenerationFailed { reason });
        }

        let generated: GenerateResponse = response.json().await.map_err(|e| {
            warn!(%prospect_id, error = %e, "Unreadable generate response");
            OutreachError::GenerationFailed { reason: None }
        })?;

        Ok(GeneratedDraft {
            handle: generated.email_log_id.into(),
            context_snippet: generated.rag_context_used.unwrap_or_default(),
            opening_line: generated.generated_line,
        })
    }

    async fn finalize_draft(&self, handle: &DraftHandle, subject: &str, body: &str) -> Result<()> {
        let path = format!("/api/v1/research/send/{}", handle);
        let builder = self.request(Method::POST, &path).json(&FinalizeRequest {
            subject,
            edited_body: body,
        });
        self.send_request(builder).await
    }

    async fn send_ad_hoc(&self, prospect_id: ProspectId, subject: &str, body: &str) -> Result<()> {
        let path = format!("/api/v1/research/{}/send", prospect_id);
        let builder = self
            .request(Method::POST, &path)
            .json(&AdHocRequest { subject, body });
        self.send_request(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> HttpDraftStore {
        HttpDraftStore::new(&StoreConfig {
            base_url: format!("{}/", server.uri()),
            api_token: None,
            timeout_ms: 2_000,
        })
        .unwrap()
    }

    #[test]
    fn test_classify_send_failure() {
        assert_eq!(
            classify_send_failure(StatusCode::INTERNAL_SERVER_ERROR, Some("SMTP not configured")),
            SendFailureClass::Configuration
        );
        assert_eq!(
            classify_send_failure(StatusCode::UNPROCESSABLE_ENTITY, None),
            SendFailureClass::Configuration
        );
        assert_eq!(
            classify_send_failure(StatusCode::BAD_GATEWAY, Some("Failed to send email.")),
            SendFailureClass::Transient
        );
    }

    #[tokio::test]
    async fn test_fetch_maps_drafts_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/research/7/drafts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "has_draft": true,
                "email_log_id": 42,
                "personalized_opening": "Hi Alice",
                "full_body": null,
                "status": "draft",
                "history": [
                    {"body": "Earlier note", "status": "sent"},
                    {"body": "Hi Alice", "status": "draft"}
                ]
            })))
            .mount(&server)
            .await;

        let state = store_for(&server)
            .fetch_draft_or_history(ProspectId(7))
            .await
            .unwrap();

        assert!(state.has_draft);
        assert_eq!(state.draft_handle, Some(DraftHandle::new("42")));
        assert_eq!(state.opening_line.as_deref(), Some("Hi Alice"));
        assert_eq!(state.full_body, None);
        assert_eq!(state.status, Some(DraftStatus::Draft));
        assert_eq!(
            state.history,
            vec![HistoryEntry::sent("Earlier note"), HistoryEntry::draft("Hi Alice")]
        );
    }

    #[tokio::test]
    async fn test_fetch_without_draft() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/research/3/drafts"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"has_draft": false, "history": []})),
            )
            .mount(&server)
            .await;

        let state = store_for(&server)
            .fetch_draft_or_history(ProspectId(3))
            .await
            .unwrap();

        assert_eq!(state, RemoteDraftState::default());
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_connection_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/research/3/drafts"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .fetch_draft_or_history(ProspectId(3))
            .await
            .unwrap_err();

        assert!(matches!(err, OutreachError::ConnectionError(_)));
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/research/7/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "email_log_id": 9,
                "rag_context_used": "Acme builds rockets...",
                "generated_line": "Loved your launch"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generated = store_for(&server)
            .generate_draft(ProspectId(7))
            .await
            .unwrap();

        assert_eq!(generated.handle, DraftHandle::new("9"));
        assert_eq!(generated.opening_line, "Loved your launch");
        assert_eq!(generated.context_snippet, "Acme builds rockets...");
    }

    #[tokio::test]
    async fn test_generate_failure_carries_detail() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/research/7/generate"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"detail": "No company website to scrape"})),
            )
            .mount(&server)
            .await;

        let err = store_for(&server)
            .generate_draft(ProspectId(7))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            OutreachError::GenerationFailed {
                reason: Some("No company website to scrape".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_generate_failure_without_detail() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/research/7/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .generate_draft(ProspectId(7))
            .await
            .unwrap_err();

        assert_eq!(err, OutreachError::GenerationFailed { reason: None });
        assert_eq!(err.user_message(), outreach_core::error::GENERIC_GENERATION_FAILURE);
    }

    #[tokio::test]
    async fn test_finalize_posts_edited_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/research/send/42"))
            .and(body_json(serde_json::json!({
                "subject": "Quick question regarding Acme",
                "edited_body": "Edited text"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "message": "Email sent and logged!"
            })))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .finalize_draft(
                &DraftHandle::new("42"),
                "Quick question regarding Acme",
                "Edited text",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_finalize_smtp_failure_is_configuration() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/research/send/42"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"detail": "SMTP not configured"})),
            )
            .mount(&server)
            .await;

        let err = store_for(&server)
            .finalize_draft(&DraftHandle::new("42"), "S", "B")
            .await
            .unwrap_err();

        assert_eq!(err, OutreachError::send_misconfigured("SMTP not configured"));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_send_ad_hoc_upstream_outage_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/research/7/send"))
            .and(body_json(serde_json::json!({"subject": "S", "body": "B"})))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .send_ad_hoc(ProspectId(7), "S", "B")
            .await
            .unwrap_err();

        assert_eq!(err, OutreachError::send_transient(None));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "healthy",
                "version": "0.1.0"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpDraftStore::connect(&StoreConfig {
            base_url: server.uri(),
            api_token: Some("secret".to_string()),
            timeout_ms: 2_000,
        })
        .await
        .unwrap();

        assert_eq!(store.base_url(), server.uri());
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let store = HttpDraftStore::new(&StoreConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_token: None,
            timeout_ms: 500,
        })
        .unwrap();

        let err = store.fetch_draft_or_history(ProspectId(1)).await.unwrap_err();
        assert!(matches!(err, OutreachError::ConnectionError(_)));

        let err = store.send_ad_hoc(ProspectId(1), "S", "B").await.unwrap_err();
        assert_eq!(err, OutreachError::send_transient(None));
    }
}
