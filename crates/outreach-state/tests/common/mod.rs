#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use outreach_core::{
    Composer, ComposerConfig, DraftHandle, LifecycleConfig, OutreachError, ProspectId, Result,
};
use outreach_state::{
    DraftStore, GeneratedDraft, InMemoryDraftStore, LifecycleManager, RemoteDraftState,
};
use tokio::sync::Semaphore;

/// Wraps the in-memory store so tests can hold remote calls open.
///
/// Calls for gated prospects wait for a permit from [`GatedStore::release`].
pub struct GatedStore {
    pub inner: InMemoryDraftStore,
    gated: HashSet<ProspectId>,
    gate_fetch: bool,
    gate_generate: bool,
    gate_send: bool,
    permits: Semaphore,
    fail_fetch: AtomicBool,
    fetch_calls: AtomicUsize,
}

impl GatedStore {
    /// Gate generate and send for `gated`.
    pub fn new(inner: InMemoryDraftStore, gated: &[ProspectId]) -> Self {
        Self {
            inner,
            gated: gated.iter().copied().collect(),
            gate_fetch: false,
            gate_generate: true,
            gate_send: true,
            permits: Semaphore::new(0),
            fail_fetch: AtomicBool::new(false),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Gate fetches instead of generate and send.
    pub fn gating_fetch_only(mut self) -> Self {
        self.gate_fetch = true;
        self.gate_generate = false;
        self.gate_send = false;
        self
    }

    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    async fn pass(&self, gated: bool) {
        if gated {
            self.permits
                .acquire()
                .await
                .expect("semaphore closed")
                .forget();
        }
    }
}

#[async_trait]
impl DraftStore for GatedStore {
    async fn fetch_draft_or_history(&self, prospect_id: ProspectId) -> Result<RemoteDraftState> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.pass(self.gate_fetch && self.gated.contains(&prospect_id))
            .await;
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(OutreachError::ConnectionError("connection refused".to_string()));
        }
        self.inner.fetch_draft_or_history(prospect_id).await
    }

    async fn generate_draft(&self, prospect_id: ProspectId) -> Result<GeneratedDraft> {
        self.pass(self.gate_generate && self.gated.contains(&prospect_id))
            .await;
        self.inner.generate_draft(prospect_id).await
    }

    async fn finalize_draft(&self, handle: &DraftHandle, subject: &str, body: &str) -> Result<()> {
        self.pass(self.gate_send && !self.gated.is_empty()).await;
        self.inner.finalize_draft(handle, subject, body).await
    }

    async fn send_ad_hoc(&self, prospect_id: ProspectId, subject: &str, body: &str) -> Result<()> {
        self.pass(self.gate_send && self.gated.contains(&prospect_id))
            .await;
        self.inner.send_ad_hoc(prospect_id, subject, body).await
    }
}

pub fn composer() -> Composer {
    Composer::new(ComposerConfig {
        signature: "<signature>".to_string(),
        ..Default::default()
    })
}

pub fn manager(store: Arc<dyn DraftStore>) -> LifecycleManager {
    LifecycleManager::new(store, composer(), LifecycleConfig::default())
}

pub fn manager_without_history_refresh(store: Arc<dyn DraftStore>) -> LifecycleManager {
    LifecycleManager::new(
        store,
        composer(),
        LifecycleConfig {
            refresh_history_after_send: false,
            ..Default::default()
        },
    )
}

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition was not reached in time");
}

/// Await a future with the same deadline as [`wait_until`].
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("future did not resolve in time")
}
