//! The lifecycle manager: one draft/send state machine per prospect.

use std::collections::HashMap;
use std::sync::Arc;

use outreach_core::{
    Composer, LifecycleConfig, OutreachError, Prospect, ProspectId, Rejection, Result,
};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cell::{ActionOutcome, CellView, LoadState, LoadTicket, ProspectCell};
use crate::loader::ReconciliationLoader;
use crate::store::DraftStore;
use crate::subscription::{
    CellEvent, CellEventKind, CellSubscription, EventHub, SubscriptionFilter,
};

/// Owns every prospect's cell and the operations that change them.
///
/// Cheap to clone; clones share the same cells. The map lock is never held
/// across a remote call: each operation checks and flips the cell's flags
/// under the lock, releases it, awaits the store, then re-locks to apply
/// the result. Results land on their own cell even if another prospect was
/// selected in the meantime.
#[derive(Clone)]
pub struct LifecycleManager {
    /// Cells keyed by prospect.
    cells: Arc<RwLock<HashMap<ProspectId, ProspectCell>>>,

    /// Known prospects, for subject templating.
    prospects: Arc<RwLock<HashMap<ProspectId, Prospect>>>,

    /// The prospect currently in focus.
    active: Arc<RwLock<Option<ProspectId>>>,

    store: Arc<dyn DraftStore>,
    loader: ReconciliationLoader,
    composer: Composer,
    config: LifecycleConfig,
    events: EventHub,
}

impl LifecycleManager {
    /// Create a manager over a remote store.
    pub fn new(store: Arc<dyn DraftStore>, composer: Composer, config: LifecycleConfig) -> Self {
        Self {
            cells: Arc::new(RwLock::new(HashMap::new())),
            prospects: Arc::new(RwLock::new(HashMap::new())),
            active: Arc::new(RwLock::new(None)),
            loader: ReconciliationLoader::new(store.clone(), composer.clone()),
            store,
            composer,
            events: EventHub::new(config.event_capacity),
            config,
        }
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    // ------------------------------------------------------------------
    // Focus and reconciliation
    // ------------------------------------------------------------------

    /// Focus a prospect, creating its cell on first use.
    ///
    /// An unseeded cell is reconciled in the background; the returned view is
    /// usable right away and the cell is patched when the load resolves.
    /// Must be called from within a Tokio runtime for that load to run.
    pub fn select(&self, prospect_id: ProspectId) -> CellView {
        let (view, ticket) = {
            let mut cells = self.cells.write();
            let cell = cells.entry(prospect_id).or_default();
            let ticket = cell.begin_load(false);
            (cell.view(prospect_id), ticket)
        };

        *self.active.write() = Some(prospect_id);
        debug!(%prospect_id, seeding = ticket.is_some(), "Selected prospect");
        self.publish(prospect_id, CellEventKind::Selected, Some(view.clone()));

        if let Some(ticket) = ticket {
            self.spawn_reconcile(prospect_id, ticket);
        }

        view
    }

    /// Reseed a cell from the store and wait for it.
    ///
    /// Load failures degrade silently, exactly as in [`select`](Self::select).
    pub async fn refresh(&self, prospect_id: ProspectId) -> CellView {
        let ticket = {
            let mut cells = self.cells.write();
            let cell = cells.entry(prospect_id).or_default();
            cell.begin_load(true).unwrap_or_default()
        };

        self.reconcile(prospect_id, ticket).await;
        self.view(prospect_id).unwrap_or_else(|| ProspectCell::new().view(prospect_id))
    }

    /// Replace the known prospect list.
    ///
    /// Cells of prospects that disappeared are dropped. If the active prospect
    /// is still listed and not yet seeded, it is reconciled now.
    pub fn set_prospects(&self, prospects: Vec<Prospect>) {
        let listed: HashMap<ProspectId, Prospect> =
            prospects.into_iter().map(|p| (p.id, p)).collect();

        let removed: Vec<ProspectId> = {
            let mut cells = self.cells.write();
            let gone: Vec<ProspectId> = cells
                .keys()
                .filter(|id| !listed.contains_key(id))
                .copied()
                .collect();
            for id in &gone {
                cells.remove(id);
            }
            gone
        };

        *self.prospects.write() = listed;

        let active = {
            let mut active = self.active.write();
            if active.map_or(false, |id| removed.contains(&id)) {
                *active = None;
            }
            *active
        };

        for id in removed {
            debug!(prospect_id = %id, "Dropped cell for removed prospect");
            self.publish(id, CellEventKind::Removed, None);
        }

        if let Some(prospect_id) = active {
            let ticket = self
                .cells
                .write()
                .get_mut(&prospect_id)
                .and_then(|cell| cell.begin_load(false));
            if let Some(ticket) = ticket {
                self.spawn_reconcile(prospect_id, ticket);
            }
        }
    }

    fn spawn_reconcile(&self, prospect_id: ProspectId, ticket: LoadTicket) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let this = self.clone();
                handle.spawn(async move {
                    this.reconcile(prospect_id, ticket).await;
                });
            }
            Err(_) => {
                warn!(%prospect_id, "No async runtime; skipping reconciliation");
                if let Some(cell) = self.cells.write().get_mut(&prospect_id) {
                    cell.load_failed();
                }
            }
        }
    }

    async fn reconcile(&self, prospect_id: ProspectId, ticket: LoadTicket) {
        let result = self.loader.load(prospect_id).await;

        let (kind, view) = {
            let mut cells = self.cells.write();
            let Some(cell) = cells.get_mut(&prospect_id) else {
                return;
            };
            match result {
                Ok(seed) => {
                    let applied = cell.apply_seed(ticket, seed);
                    debug!(%prospect_id, draft_applied = applied, "Seeded cell");
                    (CellEventKind::Seeded, cell.view(prospect_id))
                }
                Err(e) => {
                    warn!(%prospect_id, error = %e, "Load failed, showing empty state");
                    cell.load_failed();
                    (CellEventKind::LoadFailed, cell.view(prospect_id))
                }
            }
        };

        self.publish(prospect_id, kind, Some(view));
    }

    /// Pull the canonical history without touching the draft.
    async fn refresh_history(&self, prospect_id: ProspectId) {
        let ticket = {
            let cells = self.cells.read();
            match cells.get(&prospect_id) {
                Some(cell) => cell.ticket(),
                None => return,
            }
        };

        let seed = match self.loader.load(prospect_id).await {
            Ok(seed) => seed,
            Err(e) => {
                warn!(%prospect_id, error = %e, "History refresh failed");
                return;
            }
        };

        let view = {
            let mut cells = self.cells.write();
            let Some(cell) = cells.get_mut(&prospect_id) else {
                return;
            };
            if !cell.apply_history(ticket, seed.history) {
                debug!(%prospect_id, "History changed locally during refresh; keeping it");
            }
            cell.view(prospect_id)
        };

        self.publish(prospect_id, CellEventKind::HistoryRefreshed, Some(view));
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    /// Generate a draft for a prospect.
    ///
    /// Rejected with [`Rejection::InFlight`] while a generate or send is
    /// pending for the same prospect, and [`Rejection::Locked`] once the
    /// current message was sent. Remote failures are recorded on the cell and
    /// returned as [`ActionOutcome::Failed`].
    pub async fn generate(&self, prospect_id: ProspectId) -> Result<ActionOutcome> {
        let view = self.with_cell(prospect_id, |cell| {
            cell.begin_generate()?;
            Ok(cell.view(prospect_id))
        })?;
        self.publish(prospect_id, CellEventKind::GenerateStarted, Some(view));

        let result = self.store.generate_draft(prospect_id).await;

        let (outcome, view) = self.settle(prospect_id, |cell| {
            let outcome = cell.finish_generate(result, &self.composer);
            (outcome, cell.view(prospect_id))
        })?;

        match &outcome {
            ActionOutcome::Failed(e) => {
                error!(%prospect_id, error = %e.message, "Generation failed");
                self.publish(prospect_id, CellEventKind::GenerateFailed, Some(view));
            }
            _ => {
                info!(%prospect_id, "Draft generated");
                self.publish(prospect_id, CellEventKind::Generated, Some(view));
            }
        }

        Ok(outcome)
    }

    /// Replace the draft text. Local only.
    pub fn edit(&self, prospect_id: ProspectId, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let view = self.with_cell(prospect_id, |cell| {
            cell.edit(text)?;
            Ok(cell.view(prospect_id))
        })?;
        self.publish(prospect_id, CellEventKind::Edited, Some(view));
        Ok(())
    }

    /// Send the current draft.
    ///
    /// `subject_template` may use `{first_name}`, `{last_name}`, `{name}` and
    /// `{company}`. A draft with a remote handle is finalized; anything else
    /// goes out as an ad-hoc message. On failure the text stays as it was.
    pub async fn send(
        &self,
        prospect_id: ProspectId,
        subject_template: &str,
    ) -> Result<ActionOutcome> {
        let subject = {
            let prospects = self.prospects.read();
            let prospect = prospects.get(&prospect_id);
            if prospect.is_none() && Composer::has_placeholders(subject_template) {
                warn!(
                    %prospect_id,
                    template = subject_template,
                    "Prospect not registered; subject placeholders stay unrendered"
                );
            }
            self.composer.render_subject(subject_template, prospect)
        };

        let (plan, view) = self.with_cell(prospect_id, |cell| {
            let plan = cell.begin_send()?;
            Ok((plan, cell.view(prospect_id)))
        })?;
        self.publish(prospect_id, CellEventKind::SendStarted, Some(view));

        let result = match &plan.handle {
            Some(handle) => {
                debug!(%prospect_id, %handle, "Finalizing stored draft");
                self.store.finalize_draft(handle, &subject, &plan.body).await
            }
            None => {
                debug!(%prospect_id, "Sending ad-hoc message");
                self.store.send_ad_hoc(prospect_id, &subject, &plan.body).await
            }
        };

        let (outcome, view) = self.settle(prospect_id, |cell| {
            let outcome = cell.finish_send(plan, result);
            (outcome, cell.view(prospect_id))
        })?;

        match &outcome {
            ActionOutcome::Failed(e) => {
                error!(%prospect_id, error = %e.message, kind = ?e.kind, "Send failed");
                self.publish(prospect_id, CellEventKind::SendFailed, Some(view));
            }
            _ => {
                info!(%prospect_id, %subject, "Email sent");
                self.publish(prospect_id, CellEventKind::Sent, Some(view));
                if self.config.refresh_history_after_send {
                    self.spawn_history_refresh(prospect_id);
                }
            }
        }

        Ok(outcome)
    }

    /// Send with the configured default subject.
    pub async fn send_with_default_subject(
        &self,
        prospect_id: ProspectId,
    ) -> Result<ActionOutcome> {
        let template = self.composer.config().subject_template.clone();
        self.send(prospect_id, &template).await
    }

    /// Begin a new compose for a prospect whose current message was sent.
    pub fn start_new_draft(&self, prospect_id: ProspectId) -> Result<()> {
        let view = self.with_cell(prospect_id, |cell| {
            cell.start_new_draft()?;
            Ok(cell.view(prospect_id))
        })?;
        self.publish(prospect_id, CellEventKind::DraftReset, Some(view));
        Ok(())
    }

    fn spawn_history_refresh(&self, prospect_id: ProspectId) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let this = self.clone();
            handle.spawn(async move {
                this.refresh_history(prospect_id).await;
            });
        }
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Snapshot of one cell.
    pub fn view(&self, prospect_id: ProspectId) -> Option<CellView> {
        self.cells
            .read()
            .get(&prospect_id)
            .map(|cell| cell.view(prospect_id))
    }

    /// The prospect currently in focus.
    pub fn active(&self) -> Option<ProspectId> {
        *self.active.read()
    }

    /// Snapshot of the focused cell.
    pub fn active_view(&self) -> Option<CellView> {
        self.active().and_then(|id| self.view(id))
    }

    /// Snapshots of every cell, ordered by prospect id.
    pub fn views(&self) -> Vec<CellView> {
        let mut views: Vec<CellView> = self
            .cells
            .read()
            .iter()
            .map(|(id, cell)| cell.view(*id))
            .collect();
        views.sort_by_key(|v| v.prospect_id);
        views
    }

    /// Load state of a cell, if it exists.
    pub fn load_state(&self, prospect_id: ProspectId) -> Option<LoadState> {
        self.cells.read().get(&prospect_id).map(|c| c.load_state())
    }

    /// Subscribe to cell changes.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> CellSubscription {
        self.events.subscribe(filter)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.events.unsubscribe(id);
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn with_cell<T>(
        &self,
        prospect_id: ProspectId,
        f: impl FnOnce(&mut ProspectCell) -> Result<T>,
    ) -> Result<T> {
        let mut cells = self.cells.write();
        let cell = cells
            .get_mut(&prospect_id)
            .ok_or(OutreachError::Rejected(Rejection::UnknownProspect))?;
        let result = f(cell);
        if let Err(OutreachError::Rejected(reason)) = &result {
            debug!(%prospect_id, %reason, "Operation rejected");
        }
        result
    }

    /// Apply a remote result to a cell that may have been removed meanwhile.
    fn settle<T>(
        &self,
        prospect_id: ProspectId,
        f: impl FnOnce(&mut ProspectCell) -> T,
    ) -> Result<T> {
        let mut cells = self.cells.write();
        match cells.get_mut(&prospect_id) {
            Some(cell) => Ok(f(cell)),
            None => {
                warn!(%prospect_id, "Cell removed while an operation was in flight");
                Err(OutreachError::NotFound {
                    resource_type: "Prospect cell".to_string(),
                    id: prospect_id.to_string(),
                })
            }
        }
    }

    fn publish(&self, prospect_id: ProspectId, kind: CellEventKind, view: Option<CellView>) {
        self.events.publish(CellEvent::new(prospect_id, kind, view));
    }
}
