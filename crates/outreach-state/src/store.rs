//! The remote draft store contract and an in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use outreach_core::{
    DraftHandle, DraftStatus, HistoryEntry, HistoryStatus, OutreachError, ProspectId, Result,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Reason reported when outbound mail has no credentials.
pub const SMTP_NOT_CONFIGURED: &str = "SMTP not configured";

/// What the store knows about a prospect's messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDraftState {
    /// Whether a current message (draft or sent) exists.
    pub has_draft: bool,

    /// Handle of the current message, if any.
    pub draft_handle: Option<DraftHandle>,

    /// The stored AI opening line.
    pub opening_line: Option<String>,

    /// The stored full body, present once a message was edited or sent.
    pub full_body: Option<String>,

    /// Status of the current message.
    pub status: Option<DraftStatus>,

    /// Every message for the prospect, in store order.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Result of a remote generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDraft {
    /// Handle of the draft the store created.
    pub handle: DraftHandle,

    /// Research context the generator used.
    pub context_snippet: String,

    /// The generated opening line.
    pub opening_line: String,
}

/// Trait for remote draft stores.
///
/// Every method may fail; callers treat timeouts like any other rejection.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Fetch the current draft (if any) and the full history.
    async fn fetch_draft_or_history(&self, prospect_id: ProspectId) -> Result<RemoteDraftState>;

    /// Generate a new draft. Fails with [`OutreachError::GenerationFailed`].
    async fn generate_draft(&self, prospect_id: ProspectId) -> Result<GeneratedDraft>;

    /// Send an existing draft with a possibly edited body.
    /// Fails with [`OutreachError::SendFailed`].
    async fn finalize_draft(&self, handle: &DraftHandle, subject: &str, body: &str) -> Result<()>;

    /// Send a message that has no stored draft.
    async fn send_ad_hoc(&self, prospect_id: ProspectId, subject: &str, body: &str) -> Result<()>;
}

/// A message as the in-memory store keeps it.
#[derive(Debug, Clone)]
struct EmailLog {
    handle: DraftHandle,
    prospect_id: ProspectId,
    opening_line: String,
    full_body: Option<String>,
    subject: Option<String>,
    status: DraftStatus,
}

impl EmailLog {
    fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            body: self
                .full_body
                .clone()
                .unwrap_or_else(|| self.opening_line.clone()),
            status: HistoryStatus::from(self.status),
        }
    }
}

/// A message that left the in-memory store's outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub handle: DraftHandle,
    pub subject: String,
    pub body: String,
}

/// In-memory implementation of [`DraftStore`].
///
/// Backs the development node and tests. Generation returns a configurable
/// opening line per prospect instead of calling a model.
#[derive(Clone)]
pub struct InMemoryDraftStore {
    /// All messages, append-only, in insertion order.
    logs: Arc<RwLock<Vec<EmailLog>>>,

    /// Opening line returned by generation, per prospect.
    opening_lines: Arc<RwLock<HashMap<ProspectId, String>>>,

    /// Prospects whose generation fails, with the reported reason.
    generation_failures: Arc<RwLock<HashMap<ProspectId, Option<String>>>>,

    /// Whether outbound mail credentials are present.
    outbound_configured: Arc<AtomicBool>,

    /// Handle counter.
    next_handle: Arc<RwLock<u64>>,

    generate_calls: Arc<AtomicUsize>,
    send_calls: Arc<AtomicUsize>,
}

impl InMemoryDraftStore {
    /// Create a new, empty store with outbound mail configured.
    pub fn new() -> Self {
        Self {
            logs: Arc::new(RwLock::new(Vec::new())),
            opening_lines: Arc::new(RwLock::new(HashMap::new())),
            generation_failures: Arc::new(RwLock::new(HashMap::new())),
            outbound_configured: Arc::new(AtomicBool::new(true)),
            next_handle: Arc::new(RwLock::new(0)),
            generate_calls: Arc::new(AtomicUsize::new(0)),
            send_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Toggle whether sends succeed or fail with [`SMTP_NOT_CONFIGURED`].
    pub fn set_outbound_configured(&self, configured: bool) {
        self.outbound_configured.store(configured, Ordering::SeqCst);
    }

    /// Set the opening line generation returns for a prospect.
    pub async fn set_opening_line(&self, prospect_id: ProspectId, line: impl Into<String>) {
        self.opening_lines.write().await.insert(prospect_id, line.into());
    }

    /// Make generation fail for a prospect; `None` reason means a bare failure.
    pub async fn fail_generation(&self, prospect_id: ProspectId, reason: Option<String>) {
        self.generation_failures
            .write()
            .await
            .insert(prospect_id, reason);
    }

    /// Let generation succeed again for a prospect.
    pub async fn clear_generation_failure(&self, prospect_id: ProspectId) {
        self.generation_failures.write().await.remove(&prospect_id);
    }

    /// Insert a message directly, as if it had been created earlier.
    pub async fn seed_message(
        &self,
        prospect_id: ProspectId,
        opening_line: impl Into<String>,
        full_body: Option<String>,
        status: DraftStatus,
    ) -> DraftHandle {
        let handle = self.next_handle().await;
        self.logs.write().await.push(EmailLog {
            handle: handle.clone(),
            prospect_id,
            opening_line: opening_line.into(),
            full_body,
            subject: None,
            status,
        });
        handle
    }

    /// Number of generation calls received.
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Number of send calls received, successful or not.
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    /// Messages sent for a prospect, oldest first.
    pub async fn sent_messages(&self, prospect_id: ProspectId) -> Vec<SentMessage> {
        self.logs
            .read()
            .await
            .iter()
            .filter(|log| log.prospect_id == prospect_id && log.status == DraftStatus::Sent)
            .map(|log| SentMessage {
                handle: log.handle.clone(),
                subject: log.subject.clone().unwrap_or_default(),
                body: log.full_body.clone().unwrap_or_default(),
            })
            .collect()
    }

    async fn next_handle(&self) -> DraftHandle {
        let mut next = self.next_handle.write().await;
        *next += 1;
        DraftHandle::new(next.to_string())
    }

    fn check_outbound(&self) -> Result<()> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if !self.outbound_configured.load(Ordering::SeqCst) {
            return Err(OutreachError::send_misconfigured(SMTP_NOT_CONFIGURED));
        }
        Ok(())
    }
}

impl Default for InMemoryDraftStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn fetch_draft_or_history(&self, prospect_id: ProspectId) -> Result<RemoteDraftState> {
        let logs = self.logs.read().await;

        let mine: Vec<&EmailLog> = logs
            .iter()
            .filter(|log| log.prospect_id == prospect_id)
            .collect();

        let history = mine.iter().map(|log| log.history_entry()).collect();

        let state = match mine.last() {
            Some(latest) => RemoteDraftState {
                has_draft: true,
                draft_handle: Some(latest.handle.clone()),
                opening_line: Some(latest.opening_line.clone()),
                full_body: latest.full_body.clone(),
                status: Some(latest.status),
                history,
            },
            None => RemoteDraftState {
                history,
                ..Default::default()
            },
        };

        Ok(state)
    }

    async fn generate_draft(&self, prospect_id: ProspectId) -> Result<GeneratedDraft> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.generation_failures.read().await.get(&prospect_id) {
            return Err(OutreachError::GenerationFailed {
                reason: reason.clone(),
            });
        }

        let opening_line = self
            .opening_lines
            .read()
            .await
            .get(&prospect_id)
            .cloned()
            .unwrap_or_else(|| {
                "I came across your team's recent work and wanted to reach out.".to_string()
            });

        let handle = self
            .seed_message(prospect_id, opening_line.clone(), None, DraftStatus::Draft)
            .await;

        tracing::debug!(%prospect_id, %handle, "Generated in-memory draft");

        Ok(GeneratedDraft {
            handle,
            context_snippet: "Generated by the in-memory store; no research context.".to_string(),
            opening_line,
        })
    }

    async fn finalize_draft(&self, handle: &DraftHandle, subject: &str, body: &str) -> Result<()> {
        self.check_outbound()?;

        let mut logs = self.logs.write().await;
        let log = logs
            .iter_mut()
            .find(|log| &log.handle == handle)
            .ok_or_else(|| OutreachError::NotFound {
                resource_type: "Email draft".to_string(),
                id: handle.to_string(),
            })?;

        if log.status == DraftStatus::Sent {
            return Err(OutreachError::SendFailed {
                reason: Some("Email already sent".to_string()),
                class: outreach_core::SendFailureClass::Configuration,
            });
        }

        log.status = DraftStatus::Sent;
        log.full_body = Some(body.to_string());
        log.subject = Some(subject.to_string());

        Ok(())
    }

    async fn send_ad_hoc(&self, prospect_id: ProspectId, subject: &str, body: &str) -> Result<()> {
        self.check_outbound()?;

        let handle = self.next_handle().await;
        self.logs.write().await.push(EmailLog {
            handle,
            prospect_id,
            opening_line: String::new(),
            full_body: Some(body.to_string()),
            subject: Some(subject.to_string()),
            status: DraftStatus::Sent,
        });

        Ok(())
    }
}
