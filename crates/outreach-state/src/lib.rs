//! # Outreach State
//!
//! Per-prospect draft/send lifecycle: cells, reconciliation against the
//! remote draft store, and change subscriptions.

pub mod cell;
pub mod loader;
pub mod manager;
pub mod store;
pub mod subscription;

pub use cell::{ActionOutcome, CellError, CellView, FailureKind, LoadState, ProspectCell};
pub use loader::{ReconciliationLoader, Seed};
pub use manager::LifecycleManager;
pub use store::{
    DraftStore, GeneratedDraft, InMemoryDraftStore, RemoteDraftState, SentMessage,
    SMTP_NOT_CONFIGURED,
};
pub use subscription::{
    CellEvent, CellEventKind, CellSubscription, EventHub, SubscriptionFilter,
};
