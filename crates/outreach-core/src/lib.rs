//! # Outreach Core
//!
//! Core primitives and types for Outreach Composer.
//!
//! This crate provides the fundamental building blocks:
//! - [`DraftRecord`] - A prospect's current composable message
//! - [`HistoryEntry`] - A previously drafted or sent message
//! - [`Composer`] - Sign-off and subject templating
//! - [`OutreachError`] - Error taxonomy shared by every layer

pub mod config;
pub mod draft;
pub mod error;
pub mod template;
pub mod types;

// Re-exports for convenience
pub use config::{ComposerConfig, LifecycleConfig, NodeConfig, OutreachConfig, StoreConfig};
pub use draft::DraftRecord;
pub use error::{OutreachError, Rejection, Result, SendFailureClass};
pub use template::Composer;
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::draft::DraftRecord;
    pub use crate::error::{OutreachError, Rejection, Result, SendFailureClass};
    pub use crate::template::Composer;
    pub use crate::types::{
        DraftHandle, DraftStatus, HistoryEntry, HistoryStatus, Prospect, ProspectId, Provenance,
    };
}
