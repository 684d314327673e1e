//! Common types used across Outreach Composer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a prospect, as assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProspectId(pub i64);

impl fmt::Display for ProspectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProspectId {
    fn from(id: i64) -> Self {
        ProspectId(id)
    }
}

/// A sales lead. Owned by the prospect CRUD surface; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prospect {
    pub id: ProspectId,
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company_website: Option<String>,
}

impl Prospect {
    /// Create a prospect with the fields templating needs.
    pub fn new(
        id: impl Into<ProspectId>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        company_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            company_name: company_name.into(),
            email: None,
            company_website: None,
        }
    }

    /// "First Last", trimmed when either half is missing.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Opaque handle to a draft held by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftHandle(String);

impl DraftHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a prospect's current message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// Nothing composed yet.
    #[default]
    None,
    /// Composed (generated or typed) but not sent.
    Draft,
    /// Sent; text is frozen.
    Sent,
}

impl DraftStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DraftStatus::Sent)
    }

    /// Parse the store's status strings. Unknown values are treated as drafts,
    /// since the store only reports a status alongside an existing message.
    pub fn from_store(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sent" => DraftStatus::Sent,
            "none" | "" => DraftStatus::None,
            _ => DraftStatus::Draft,
        }
    }
}

/// Where the current text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    AiGenerated,
    #[default]
    Manual,
}

/// Status of an entry in the remote message history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Draft,
    Sent,
}

impl From<DraftStatus> for HistoryStatus {
    fn from(status: DraftStatus) -> Self {
        match status {
            DraftStatus::Sent => HistoryStatus::Sent,
            DraftStatus::None | DraftStatus::Draft => HistoryStatus::Draft,
        }
    }
}

/// One previously drafted or sent message, in store order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub body: String,
    pub status: HistoryStatus,
}

impl HistoryEntry {
    pub fn sent(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            status: HistoryStatus::Sent,
        }
    }

    pub fn draft(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            status: HistoryStatus::Draft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_store() {
        assert_eq!(DraftStatus::from_store("draft"), DraftStatus::Draft);
        assert_eq!(DraftStatus::from_store("SENT"), DraftStatus::Sent);
        assert_eq!(DraftStatus::from_store(""), DraftStatus::None);
        assert!(DraftStatus::Sent.is_terminal());
        assert!(!DraftStatus::Draft.is_terminal());
    }

    #[test]
    fn test_prospect_id_is_a_bare_number_on_the_wire() {
        let json = serde_json::to_string(&ProspectId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_display_name() {
        let p = Prospect::new(1, "Alice", "", "Acme");
        assert_eq!(p.display_name(), "Alice");
    }
}
