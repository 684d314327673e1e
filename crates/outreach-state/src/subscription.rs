//! Cell change subscriptions.
//!
//! The manager publishes a [`CellEvent`] after every change to a cell; the
//! presentation surface re-renders from the snapshot the event carries.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use outreach_core::ProspectId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::cell::CellView;

/// A cell change event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellEvent {
    /// The prospect whose cell changed.
    pub prospect_id: ProspectId,

    /// What happened.
    pub kind: CellEventKind,

    /// The cell after the change. `None` once the cell was removed.
    pub view: Option<CellView>,

    /// Timestamp of the change.
    pub timestamp: DateTime<Utc>,
}

impl CellEvent {
    pub fn new(prospect_id: ProspectId, kind: CellEventKind, view: Option<CellView>) -> Self {
        Self {
            prospect_id,
            kind,
            view,
            timestamp: Utc::now(),
        }
    }
}

/// Type of cell change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CellEventKind {
    Selected,
    Seeded,
    LoadFailed,
    HistoryRefreshed,
    GenerateStarted,
    Generated,
    GenerateFailed,
    Edited,
    SendStarted,
    Sent,
    SendFailed,
    DraftReset,
    Removed,
}

/// Filter for subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    /// Specific prospects to watch.
    pub prospects: Option<Vec<ProspectId>>,

    /// Event kinds to watch.
    pub kinds: Option<Vec<CellEventKind>>,
}

impl SubscriptionFilter {
    /// Create a filter for specific prospects.
    pub fn prospects(prospects: Vec<ProspectId>) -> Self {
        Self {
            prospects: Some(prospects),
            ..Default::default()
        }
    }

    /// Create a filter for specific event kinds.
    pub fn kinds(kinds: Vec<CellEventKind>) -> Self {
        Self {
            kinds: Some(kinds),
            ..Default::default()
        }
    }

    /// Check if an event matches this filter.
    pub fn matches(&self, event: &CellEvent) -> bool {
        if let Some(ref prospects) = self.prospects {
            if !prospects.contains(&event.prospect_id) {
                return false;
            }
        }

        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }

        true
    }
}

type Registry = RwLock<HashMap<Uuid, SubscriptionFilter>>;

/// A subscription to cell changes. Dropping it unsubscribes.
pub struct CellSubscription {
    /// Unique ID for this subscription.
    pub id: Uuid,

    /// Filter for this subscription.
    pub filter: SubscriptionFilter,

    receiver: broadcast::Receiver<CellEvent>,

    registry: Weak<Registry>,
}

impl CellSubscription {
    /// Wait for the next matching event. `None` once the manager is gone.
    ///
    /// A subscriber that falls behind skips the events it missed; the next
    /// event's snapshot is always the latest state of its cell.
    pub async fn next(&mut self) -> Option<CellEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(subscription = %self.id, skipped, "Subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for CellSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.write().remove(&self.id);
        }
    }
}

/// Fan-out of cell events to subscribers.
#[derive(Clone)]
pub struct EventHub {
    /// Sender for broadcasting events.
    sender: broadcast::Sender<CellEvent>,

    /// Active subscriptions.
    subscriptions: Arc<Registry>,
}

impl EventHub {
    /// Create a hub buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to cell changes with a filter.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> CellSubscription {
        let id = Uuid::new_v4();
        let receiver = self.sender.subscribe();

        self.subscriptions.write().insert(id, filter.clone());

        CellSubscription {
            id,
            filter,
            receiver,
            registry: Arc::downgrade(&self.subscriptions),
        }
    }

    /// Unsubscribe from cell changes.
    pub fn unsubscribe(&self, id: Uuid) {
        self.subscriptions.write().remove(&id);
    }

    /// Publish a cell event.
    pub fn publish(&self, event: CellEvent) {
        // No receivers is fine; nobody is rendering.
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(256)
    }
}
