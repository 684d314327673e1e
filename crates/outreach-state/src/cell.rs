//! Per-prospect state cells.
//!
//! A cell is the unit of concurrency control: the `generating` and `sending`
//! flags are checked and set in the same call that accepts an operation, so
//! the manager only has to hold its map lock for that one call.

use outreach_core::{
    Composer, DraftHandle, DraftRecord, DraftStatus, HistoryEntry, OutreachError, ProspectId,
    Provenance, Rejection, Result, SendFailureClass,
};
use serde::{Deserialize, Serialize};

use crate::loader::Seed;
use crate::store::GeneratedDraft;

/// Whether the cell has been reconciled with the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    /// The last load failed; the next select retries.
    Failed,
}

/// Which action the last failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Generation,
    /// Sending failed because the account is misconfigured.
    SendConfiguration,
    /// Sending failed for a reason that may go away on retry.
    SendTransient,
}

/// A failure shown in one prospect's compose area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellError {
    pub kind: FailureKind,
    pub message: String,
}

impl CellError {
    fn generation(err: &OutreachError) -> Self {
        Self {
            kind: FailureKind::Generation,
            message: err.user_message(),
        }
    }

    fn send(err: &OutreachError) -> Self {
        let kind = match err {
            OutreachError::SendFailed {
                class: SendFailureClass::Configuration,
                ..
            } => FailureKind::SendConfiguration,
            _ => FailureKind::SendTransient,
        };
        Self {
            kind,
            message: err.user_message(),
        }
    }
}

/// Result of an accepted generate or send once the remote call resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// A new draft replaced the text.
    Generated,
    /// The message was sent and recorded in history.
    Sent,
    /// The remote call failed; the cell's `last_error` holds the same error.
    Failed(CellError),
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ActionOutcome::Failed(_))
    }
}

/// What an accepted send will transmit.
#[derive(Debug, Clone)]
pub(crate) struct SendPlan {
    pub handle: Option<DraftHandle>,
    pub body: String,
}

/// The cell revisions a load was started against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LoadTicket {
    revision: u64,
    history_revision: u64,
}

/// The last message this cell sent successfully.
#[derive(Debug, Clone)]
struct LastSent {
    handle: Option<DraftHandle>,
    body: String,
}

/// State for one prospect.
#[derive(Debug, Clone, Default)]
pub struct ProspectCell {
    draft: DraftRecord,
    history: Vec<HistoryEntry>,
    generating: bool,
    sending: bool,
    last_error: Option<CellError>,
    load_state: LoadState,
    /// Bumped by every local change to the draft.
    revision: u64,
    /// Bumped by every local append to the history.
    history_revision: u64,
    last_sent: Option<LastSent>,
    context_snippet: Option<String>,
    /// Text as generation produced it, for provenance on edit.
    generated_text: Option<String>,
}

impl ProspectCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &DraftRecord {
        &self.draft
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn last_error(&self) -> Option<&CellError> {
        self.last_error.as_ref()
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    fn in_flight(&self) -> bool {
        self.generating || self.sending
    }

    // ------------------------------------------------------------------
    // Generate
    // ------------------------------------------------------------------

    pub(crate) fn begin_generate(&mut self) -> Result<()> {
        if self.in_flight() {
            return Err(OutreachError::Rejected(Rejection::InFlight));
        }
        if self.draft.is_locked() {
            return Err(OutreachError::Rejected(Rejection::Locked));
        }
        self.generating = true;
        Ok(())
    }

    pub(crate) fn finish_generate(
        &mut self,
        result: Result<GeneratedDraft>,
        composer: &Composer,
    ) -> ActionOutcome {
        self.generating = false;

        let generated = match result {
            Ok(generated) => generated,
            Err(err) => return self.fail(CellError::generation(&err)),
        };

        let text = composer.compose_body(&generated.opening_line);
        if let Err(err) = self.draft.apply_generated(text.clone(), generated.handle) {
            return self.fail(CellError::generation(&err));
        }

        self.generated_text = Some(text);
        self.context_snippet = Some(generated.context_snippet);
        self.last_error = None;
        self.revision += 1;
        ActionOutcome::Generated
    }

    // ------------------------------------------------------------------
    // Edit
    // ------------------------------------------------------------------

    pub(crate) fn edit(&mut self, text: String) -> Result<()> {
        if self.sending {
            return Err(OutreachError::Rejected(Rejection::InFlight));
        }
        self.draft.edit(text, self.generated_text.as_deref())?;
        if self.draft.status() == DraftStatus::None {
            self.generated_text = None;
        }
        self.revision += 1;
        Ok(())
    }

    /// Replace a frozen (sent) record with a fresh one.
    pub(crate) fn start_new_draft(&mut self) -> Result<()> {
        if self.in_flight() {
            return Err(OutreachError::Rejected(Rejection::InFlight));
        }
        self.reset_draft();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Send
    // ------------------------------------------------------------------

    pub(crate) fn begin_send(&mut self) -> Result<SendPlan> {
        if self.in_flight() {
            return Err(OutreachError::Rejected(Rejection::InFlight));
        }
        self.draft.ensure_sendable()?;
        self.sending = true;
        Ok(SendPlan {
            handle: self.draft.remote_draft_id().cloned(),
            body: self.draft.text().to_string(),
        })
    }

    /// Apply a send result. The failure branch never touches the draft.
    pub(crate) fn finish_send(&mut self, plan: SendPlan, result: Result<()>) -> ActionOutcome {
        self.sending = false;

        if let Err(err) = result {
            return self.fail(CellError::send(&err));
        }

        self.history.push(HistoryEntry::sent(plan.body.clone()));
        self.history_revision += 1;
        self.last_sent = Some(LastSent {
            handle: plan.handle,
            body: plan.body,
        });
        self.last_error = None;
        self.reset_draft();
        ActionOutcome::Sent
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Mark a load as started. Returns the ticket the load is based on, or
    /// `None` when no load is needed.
    pub(crate) fn begin_load(&mut self, force: bool) -> Option<LoadTicket> {
        match self.load_state {
            LoadState::Loading if !force => None,
            LoadState::Loaded if !force => None,
            _ => {
                self.load_state = LoadState::Loading;
                Some(self.ticket())
            }
        }
    }

    /// Ticket for a fetch that starts now.
    pub(crate) fn ticket(&self) -> LoadTicket {
        LoadTicket {
            revision: self.revision,
            history_revision: self.history_revision,
        }
    }

    /// Patch the cell with a seed fetched from the store.
    ///
    /// The seeded draft only lands if nothing changed locally since the load
    /// began; otherwise local state is newer. A sent record for the message
    /// this cell sent itself does not land either: the compose box was
    /// already reset. Returns whether the draft landed.
    pub(crate) fn apply_seed(&mut self, ticket: LoadTicket, seed: Seed) -> bool {
        self.load_state = LoadState::Loaded;
        self.apply_history(ticket, seed.history);

        if self.revision != ticket.revision || self.in_flight() {
            return false;
        }
        if self.is_own_send(&seed.draft) {
            return false;
        }

        self.draft = seed.draft;
        self.generated_text = seed.generated_text;
        if self.draft.status() == DraftStatus::None {
            self.context_snippet = None;
        }
        true
    }

    /// Replace the history with the store's copy.
    ///
    /// Skipped when a local send landed after the fetch began, or is still
    /// pending, since the fetched copy may predate it. Returns whether the
    /// history was replaced.
    pub(crate) fn apply_history(
        &mut self,
        ticket: LoadTicket,
        history: Vec<HistoryEntry>,
    ) -> bool {
        if self.history_revision != ticket.history_revision || self.sending {
            return false;
        }
        self.history = history;
        true
    }

    fn is_own_send(&self, draft: &DraftRecord) -> bool {
        if draft.status() != DraftStatus::Sent {
            return false;
        }
        match &self.last_sent {
            Some(sent) => match (&sent.handle, draft.remote_draft_id()) {
                (Some(ours), Some(theirs)) => ours == theirs,
                _ => sent.body == draft.text(),
            },
            None => false,
        }
    }

    pub(crate) fn load_failed(&mut self) {
        if self.load_state == LoadState::Loading {
            self.load_state = LoadState::Failed;
        }
    }

    fn reset_draft(&mut self) {
        self.draft = DraftRecord::empty();
        self.generated_text = None;
        self.context_snippet = None;
        self.revision += 1;
    }

    fn fail(&mut self, error: CellError) -> ActionOutcome {
        self.last_error = Some(error.clone());
        ActionOutcome::Failed(error)
    }

    /// Snapshot for the presentation surface.
    pub fn view(&self, prospect_id: ProspectId) -> CellView {
        CellView {
            prospect_id,
            status: self.draft.status(),
            text: self.draft.text().to_string(),
            provenance: self.draft.provenance(),
            remote_draft_id: self.draft.remote_draft_id().cloned(),
            generating: self.generating,
            sending: self.sending,
            last_error: self.last_error.as_ref().map(|e| e.message.clone()),
            last_error_kind: self.last_error.as_ref().map(|e| e.kind),
            history: self.history.clone(),
            load_state: self.load_state,
            context_snippet: self.context_snippet.clone(),
        }
    }
}

/// Read-only snapshot of a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellView {
    pub prospect_id: ProspectId,
    pub status: DraftStatus,
    pub text: String,
    pub provenance: Provenance,
    pub remote_draft_id: Option<DraftHandle>,
    pub generating: bool,
    pub sending: bool,
    pub last_error: Option<String>,
    pub last_error_kind: Option<FailureKind>,
    pub history: Vec<HistoryEntry>,
    pub load_state: LoadState,
    pub context_snippet: Option<String>,
}

impl CellView {
    /// Whether the compose box should accept input.
    pub fn is_editable(&self) -> bool {
        self.status != DraftStatus::Sent && !self.sending
    }

    /// Whether the generate control should be enabled.
    pub fn can_generate(&self) -> bool {
        self.status != DraftStatus::Sent && !self.generating && !self.sending
    }

    /// Whether the send control should be enabled.
    pub fn can_send(&self) -> bool {
        self.status != DraftStatus::Sent
            && !self.generating
            && !self.sending
            && !self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generated(line: &str) -> GeneratedDraft {
        GeneratedDraft {
            handle: DraftHandle::new("10"),
            context_snippet: "ctx".to_string(),
            opening_line: line.to_string(),
        }
    }

    #[test]
    fn test_generate_guard() {
        let mut cell = ProspectCell::new();
        cell.begin_generate().unwrap();

        assert_eq!(
            cell.begin_generate().unwrap_err(),
            OutreachError::Rejected(Rejection::InFlight)
        );
        assert!(cell.begin_send().is_err());

        let outcome = cell.finish_generate(Ok(generated("Hi")), &Composer::default());
        assert_eq!(outcome, ActionOutcome::Generated);
        assert!(!cell.is_generating());
        assert_eq!(cell.draft().status(), DraftStatus::Draft);
        assert!(cell.draft().text().starts_with("Hi\n\n"));
    }

    #[test]
    fn test_generation_failure_keeps_draft() {
        let mut cell = ProspectCell::new();
        cell.edit("my own words".to_string()).unwrap();

        cell.begin_generate().unwrap();
        let outcome = cell.finish_generate(
            Err(OutreachError::GenerationFailed { reason: None }),
            &Composer::default(),
        );

        assert!(!outcome.is_success());
        assert_eq!(cell.draft().text(), "my own words");
        assert_eq!(cell.last_error().unwrap().kind, FailureKind::Generation);
        assert!(!cell.is_generating());
    }

    #[test]
    fn test_send_failure_keeps_text_and_classifies() {
        let mut cell = ProspectCell::new();
        cell.edit("Body".to_string()).unwrap();

        let plan = cell.begin_send().unwrap();
        assert!(plan.handle.is_none());
        assert_eq!(
            cell.edit("typing while sending".to_string()).unwrap_err(),
            OutreachError::Rejected(Rejection::InFlight)
        );

        let outcome = cell.finish_send(
            plan,
            Err(OutreachError::send_misconfigured("SMTP not configured")),
        );

        assert_eq!(
            outcome,
            ActionOutcome::Failed(CellError {
                kind: FailureKind::SendConfiguration,
                message: "SMTP not configured".to_string(),
            })
        );
        assert_eq!(cell.draft().text(), "Body");
        assert_eq!(cell.draft().status(), DraftStatus::Draft);
        assert!(!cell.is_sending());
    }

    #[test]
    fn test_send_success_resets_draft() {
        let mut cell = ProspectCell::new();
        cell.begin_generate().unwrap();
        cell.finish_generate(Ok(generated("Hi")), &Composer::default());

        let plan = cell.begin_send().unwrap();
        assert_eq!(plan.handle, Some(DraftHandle::new("10")));
        let body = plan.body.clone();
        cell.finish_send(plan, Ok(()));

        assert_eq!(cell.draft(), &DraftRecord::empty());
        assert_eq!(cell.history(), &[HistoryEntry::sent(body)]);
        assert!(cell.view(ProspectId(1)).context_snippet.is_none());
    }

    #[test]
    fn test_stale_seed_does_not_overwrite_local_edit() {
        let mut cell = ProspectCell::new();
        let based_on = cell.begin_load(false).unwrap();
        assert_eq!(cell.begin_load(false), None);

        cell.edit("typed before load".to_string()).unwrap();

        let applied = cell.apply_seed(
            based_on,
            Seed {
                draft: DraftRecord::from_remote(DraftStatus::Draft, "remote".to_string(), None),
                generated_text: None,
                history: vec![HistoryEntry::draft("remote")],
            },
        );

        assert!(!applied);
        assert_eq!(cell.draft().text(), "typed before load");
        assert_eq!(cell.history().len(), 1);
        assert_eq!(cell.load_state(), LoadState::Loaded);
    }

    #[test]
    fn test_failed_load_allows_retry() {
        let mut cell = ProspectCell::new();
        cell.begin_load(false).unwrap();
        cell.load_failed();
        assert_eq!(cell.load_state(), LoadState::Failed);
        assert!(cell.begin_load(false).is_some());
    }

    fn seeded_draft(text: &str, handle: &str) -> Seed {
        Seed {
            draft: DraftRecord::from_remote(
                DraftStatus::Draft,
                text.to_string(),
                Some(DraftHandle::new(handle)),
            ),
            generated_text: None,
            history: vec![HistoryEntry::draft(text)],
        }
    }

    #[test]
    fn test_store_history_replaces_local_after_finalize() {
        let mut cell = ProspectCell::new();
        let ticket = cell.begin_load(false).unwrap();
        assert!(cell.apply_seed(ticket, seeded_draft("Hi Alice", "3")));

        cell.edit("Hi Alice, edited".to_string()).unwrap();
        let plan = cell.begin_send().unwrap();
        cell.finish_send(plan, Ok(()));
        assert_eq!(
            cell.history(),
            &[HistoryEntry::draft("Hi Alice"), HistoryEntry::sent("Hi Alice, edited")]
        );

        // Finalizing flips the stored draft to sent instead of appending.
        let canonical = vec![HistoryEntry::sent("Hi Alice, edited")];
        assert!(cell.apply_history(cell.ticket(), canonical.clone()));
        assert_eq!(cell.history(), canonical.as_slice());
    }

    #[test]
    fn test_history_fetched_before_local_send_is_skipped() {
        let mut cell = ProspectCell::new();
        cell.edit("Body".to_string()).unwrap();
        let ticket = cell.ticket();

        let plan = cell.begin_send().unwrap();
        assert!(!cell.apply_history(ticket, Vec::new()));
        cell.finish_send(plan, Ok(()));

        assert!(!cell.apply_history(ticket, Vec::new()));
        assert_eq!(cell.history(), &[HistoryEntry::sent("Body")]);
    }

    #[test]
    fn test_reseed_of_own_send_keeps_fresh_compose() {
        let mut cell = ProspectCell::new();
        let ticket = cell.begin_load(false).unwrap();
        cell.apply_seed(ticket, seeded_draft("Hi Alice", "3"));

        let plan = cell.begin_send().unwrap();
        cell.finish_send(plan, Ok(()));

        let ticket = cell.begin_load(true).unwrap();
        let applied = cell.apply_seed(
            ticket,
            Seed {
                draft: DraftRecord::from_remote(
                    DraftStatus::Sent,
                    "Hi Alice".to_string(),
                    Some(DraftHandle::new("3")),
                ),
                generated_text: None,
                history: vec![HistoryEntry::sent("Hi Alice")],
            },
        );

        assert!(!applied);
        assert_eq!(cell.draft().status(), DraftStatus::None);
        assert_eq!(cell.history(), &[HistoryEntry::sent("Hi Alice")]);
    }
}
