//! Error types for Outreach Composer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProspectId;

/// Message shown when a send fails without a remote-supplied reason.
pub const GENERIC_SEND_FAILURE: &str = "Failed to send email.";

/// Message shown when generation fails without a remote-supplied reason.
pub const GENERIC_GENERATION_FAILURE: &str = "Failed to generate AI email.";

/// Main error type for Outreach operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutreachError {
    /// Seeding a cell from the remote store failed.
    #[error("Failed to load drafts for prospect {prospect_id}: {message}")]
    LoadFailed {
        prospect_id: ProspectId,
        message: String,
    },

    /// The remote generation call failed.
    #[error("Generation failed: {}", .reason.as_deref().unwrap_or(GENERIC_GENERATION_FAILURE))]
    GenerationFailed { reason: Option<String> },

    /// The remote send call failed.
    #[error("Send failed: {}", .reason.as_deref().unwrap_or(GENERIC_SEND_FAILURE))]
    SendFailed {
        reason: Option<String>,
        class: SendFailureClass,
    },

    /// The operation was refused at the call boundary; no remote call was made.
    #[error("Operation rejected: {0}")]
    Rejected(Rejection),

    /// Resource not found.
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    /// Connection to the remote store failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a synchronous precondition check turned an operation away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// A generate or send is already in flight for this prospect.
    InFlight,
    /// The current record was sent and its text is frozen.
    Locked,
    /// There is nothing to send.
    EmptyBody,
    /// No cell exists for the prospect.
    UnknownProspect,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Rejection::InFlight => "an operation is already in flight",
            Rejection::Locked => "the message was already sent",
            Rejection::EmptyBody => "the message body is empty",
            Rejection::UnknownProspect => "the prospect has not been selected",
        };
        f.write_str(text)
    }
}

/// Coarse classification of a send failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendFailureClass {
    /// The account is misconfigured (e.g. missing SMTP credentials); retrying won't help.
    Configuration,
    /// Network trouble, timeouts, upstream outages.
    Transient,
}

impl OutreachError {
    /// Returns true if retrying the same operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            OutreachError::SendFailed { class, .. } => *class == SendFailureClass::Transient,
            OutreachError::GenerationFailed { .. } => true,
            OutreachError::ConnectionError(_) => true,
            OutreachError::LoadFailed { .. } => true,
            _ => false,
        }
    }

    /// The message this error contributes to a cell's `last_error`.
    ///
    /// Remote failures surface the remote-supplied reason verbatim when one
    /// exists, otherwise a generic message for the action.
    pub fn user_message(&self) -> String {
        match self {
            OutreachError::GenerationFailed { reason } => reason
                .clone()
                .unwrap_or_else(|| GENERIC_GENERATION_FAILURE.to_string()),
            OutreachError::SendFailed { reason, .. } => {
                reason.clone().unwrap_or_else(|| GENERIC_SEND_FAILURE.to_string())
            }
            other => other.to_string(),
        }
    }

    /// Shorthand for a send failure caused by account configuration.
    pub fn send_misconfigured(reason: impl Into<String>) -> Self {
        OutreachError::SendFailed {
            reason: Some(reason.into()),
            class: SendFailureClass::Configuration,
        }
    }

    /// Shorthand for a transient send failure.
    pub fn send_transient(reason: Option<String>) -> Self {
        OutreachError::SendFailed {
            reason,
            class: SendFailureClass::Transient,
        }
    }
}

/// Convenience Result type for Outreach operations.
pub type Result<T> = std::result::Result<T, OutreachError>;

impl From<serde_json::Error> for OutreachError {
    fn from(err: serde_json::Error) -> Self {
        OutreachError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for OutreachError {
    fn from(err: toml::de::Error) -> Self {
        OutreachError::Config(err.to_string())
    }
}
