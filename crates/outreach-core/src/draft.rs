//! The Draft Record: a prospect's one current composable message.
//!
//! Fields are private so that the status/text invariants can only change
//! through the transition methods below:
//!
//! - `None` carries no text and no handle.
//! - `Sent` is terminal; its text and handle never change again.

use serde::{Deserialize, Serialize};

use crate::error::{OutreachError, Rejection, Result};
use crate::types::{DraftHandle, DraftStatus, Provenance};

/// The current composable message for one prospect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRecord {
    status: DraftStatus,
    text: String,
    provenance: Provenance,
    remote_draft_id: Option<DraftHandle>,
}

impl DraftRecord {
    /// An empty record, ready for a new compose.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rebuild a record from what the remote store reports.
    ///
    /// A `None` status discards any text or handle the store sent along.
    pub fn from_remote(status: DraftStatus, text: String, handle: Option<DraftHandle>) -> Self {
        match status {
            DraftStatus::None => Self::empty(),
            DraftStatus::Draft | DraftStatus::Sent => Self {
                status,
                text,
                provenance: Provenance::AiGenerated,
                remote_draft_id: handle,
            },
        }
    }

    pub fn status(&self) -> DraftStatus {
        self.status
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn remote_draft_id(&self) -> Option<&DraftHandle> {
        self.remote_draft_id.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.status.is_terminal()
    }

    /// Replace the text with freshly generated content (`None|Draft -> Draft`).
    pub fn apply_generated(&mut self, text: String, handle: DraftHandle) -> Result<()> {
        self.ensure_unlocked()?;
        self.status = DraftStatus::Draft;
        self.text = text;
        self.provenance = Provenance::AiGenerated;
        self.remote_draft_id = Some(handle);
        Ok(())
    }

    /// Apply a user edit.
    ///
    /// `generated` is the text generation last produced for this record; the
    /// provenance flips to `Manual` once the text no longer matches it.
    /// Typing into an empty record starts a manual draft, and clearing a
    /// manual draft that has no remote handle returns it to `None`.
    pub fn edit(&mut self, text: String, generated: Option<&str>) -> Result<()> {
        self.ensure_unlocked()?;

        if text.is_empty() && self.remote_draft_id.is_none() {
            *self = Self::empty();
            return Ok(());
        }

        self.provenance = match generated {
            Some(g) if g == text => Provenance::AiGenerated,
            _ => Provenance::Manual,
        };
        self.status = DraftStatus::Draft;
        self.text = text;
        Ok(())
    }

    /// Check the send preconditions that depend only on the record.
    pub fn ensure_sendable(&self) -> Result<()> {
        self.ensure_unlocked()?;
        if self.text.trim().is_empty() {
            return Err(OutreachError::Rejected(Rejection::EmptyBody));
        }
        Ok(())
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.is_locked() {
            return Err(OutreachError::Rejected(Rejection::Locked));
        }
        Ok(())
    }
}
