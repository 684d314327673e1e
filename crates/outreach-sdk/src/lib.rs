//! # Outreach SDK
//!
//! HTTP implementation of the draft store, speaking the outreach backend's
//! research endpoints.

pub mod client;

pub use client::{HealthResponse, HttpDraftStore};

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::client::HttpDraftStore;
    pub use outreach_core::prelude::*;
    pub use outreach_state::DraftStore;
}
