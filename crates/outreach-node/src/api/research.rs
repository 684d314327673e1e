//! Research draft endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use outreach_core::{DraftHandle, DraftStatus, HistoryEntry, ProspectId};
use outreach_state::DraftStore;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiError;
use crate::state::AppState;

/// Current message and history for a prospect.
#[derive(Debug, Serialize)]
pub struct DraftsResponse {
    pub has_draft: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_log_id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personalized_opening: Option<String>,
    pub full_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DraftStatus>,
    pub history: Vec<HistoryEntry>,
}

/// Response after generating an opening line.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub status: String,
    pub email_log_id: serde_json::Value,
    pub rag_context_used: String,
    pub generated_line: String,
}

/// Response after a send.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub status: String,
    pub message: String,
}

impl SendResponse {
    fn success() -> Self {
        Self {
            status: "success".to_string(),
            message: "Email sent and logged!".to_string(),
        }
    }
}

/// Request to send a stored draft with an edited body.
#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    #[serde(default)]
    pub subject: String,
    pub edited_body: String,
}

/// Request to send a message that has no stored draft.
#[derive(Debug, Deserialize)]
pub struct AdHocSendRequest {
    #[serde(default)]
    pub subject: String,
    pub body: String,
}

/// Message ids go over the wire as integers when they are numeric.
fn wire_id(handle: &DraftHandle) -> serde_json::Value {
    match handle.as_str().parse::<i64>() {
        Ok(n) => serde_json::Value::from(n),
        Err(_) => serde_json::Value::from(handle.as_str()),
    }
}

/// Get the current message and history for a prospect.
pub async fn get_drafts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DraftsResponse>, ApiError> {
    let remote = state.store.fetch_draft_or_history(ProspectId(id)).await?;

    Ok(Json(DraftsResponse {
        has_draft: remote.has_draft,
        email_log_id: remote.draft_handle.as_ref().map(wire_id),
        personalized_opening: remote.opening_line,
        full_body: remote.full_body,
        status: remote.status,
        history: remote.history,
    }))
}

/// Generate a new draft opening line.
pub async fn generate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let generated = state.store.generate_draft(ProspectId(id)).await?;

    info!(prospect_id = id, handle = %generated.handle, "Draft generated");

    Ok(Json(GenerateResponse {
        status: "success".to_string(),
        email_log_id: wire_id(&generated.handle),
        rag_context_used: generated.context_snippet,
        generated_line: generated.opening_line,
    }))
}

/// Send a stored draft.
pub async fn send_draft(
    State(state): State<AppState>,
    Path(email_log_id): Path<String>,
    Json(req): Json<FinalizeRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let handle = DraftHandle::new(email_log_id);
    state
        .store
        .finalize_draft(&handle, &req.subject, &req.edited_body)
        .await?;

    info!(%handle, "Draft sent");

    Ok(Json(SendResponse::success()))
}

/// Send a message without a stored draft.
pub async fn send_ad_hoc(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AdHocSendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    state
        .store
        .send_ad_hoc(ProspectId(id), &req.subject, &req.body)
        .await?;

    info!(prospect_id = id, "Ad hoc message sent");

    Ok(Json(SendResponse::success()))
}
