//! Reconciliation: turning what the remote store holds into a cell seed.

use std::sync::Arc;

use outreach_core::{
    Composer, DraftRecord, DraftStatus, HistoryEntry, OutreachError, ProspectId, Result,
};

use crate::store::{DraftStore, RemoteDraftState};

/// Local state derived from one remote fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub draft: DraftRecord,
    /// Set when the text was rebuilt from the stored opening line.
    pub generated_text: Option<String>,
    pub history: Vec<HistoryEntry>,
}

/// Fetches remote state and maps it onto the local model.
#[derive(Clone)]
pub struct ReconciliationLoader {
    store: Arc<dyn DraftStore>,
    composer: Composer,
}

impl ReconciliationLoader {
    pub fn new(store: Arc<dyn DraftStore>, composer: Composer) -> Self {
        Self { store, composer }
    }

    /// Fetch and map. Store failures come back as [`OutreachError::LoadFailed`].
    pub async fn load(&self, prospect_id: ProspectId) -> Result<Seed> {
        let remote = self
            .store
            .fetch_draft_or_history(prospect_id)
            .await
            .map_err(|e| OutreachError::LoadFailed {
                prospect_id,
                message: e.to_string(),
            })?;

        Ok(self.seed_from(remote))
    }

    /// Map a store response onto a seed.
    ///
    /// A draft with no stored body gets its text rebuilt from the opening
    /// line and the same sign-off generation uses, so an existing handle
    /// never shows up as a blank compose box.
    pub fn seed_from(&self, remote: RemoteDraftState) -> Seed {
        let RemoteDraftState {
            has_draft,
            draft_handle,
            opening_line,
            full_body,
            status,
            history,
        } = remote;

        if !has_draft {
            return Seed {
                draft: DraftRecord::empty(),
                generated_text: None,
                history,
            };
        }

        let status = match status.unwrap_or(DraftStatus::Draft) {
            DraftStatus::None => DraftStatus::Draft,
            other => other,
        };

        let body = full_body.filter(|b| !b.trim().is_empty());
        let (text, generated_text) = match (body, opening_line) {
            (Some(body), _) => (body, None),
            (None, Some(line)) => {
                let text = self.composer.compose_body(&line);
                (text.clone(), Some(text))
            }
            (None, None) => (String::new(), None),
        };

        Seed {
            draft: DraftRecord::from_remote(status, text, draft_handle),
            generated_text,
            history,
        }
    }
}
