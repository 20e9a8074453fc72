//! Stored shapes consumed by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record whose text fields may be encrypted at rest.
///
/// `is_encrypted` is tri-state: records written before encryption existed
/// carry no flag at all, which is treated the same as `false`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptableRecord {
    pub id: String,
    pub workspace_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_encrypted: Option<bool>,
}

impl EncryptableRecord {
    /// A legacy record with no encryption flag.
    pub fn new(
        id: impl Into<String>,
        workspace_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            title: Some(title.into()),
            description: None,
            location: None,
            is_encrypted: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_flag(mut self, is_encrypted: bool) -> Self {
        self.is_encrypted = Some(is_encrypted);
        self
    }

    /// True only for an explicit `true` flag.
    pub fn is_flagged_encrypted(&self) -> bool {
        self.is_encrypted == Some(true)
    }

    /// Applies a patch in place, leaving `None` fields untouched.
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(title) = &patch.title {
            self.title = Some(title.clone());
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(location) = &patch.location {
            self.location = Some(location.clone());
        }
        if let Some(flag) = patch.is_encrypted {
            self.is_encrypted = Some(flag);
        }
    }
}

/// Selects records by their encryption flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFilter {
    All,
    /// Flag is `false` or absent.
    Unencrypted,
    /// Flag is exactly `true`.
    Encrypted,
}

impl RecordFilter {
    pub fn matches(&self, is_encrypted: Option<bool>) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::Unencrypted => is_encrypted != Some(true),
            RecordFilter::Encrypted => is_encrypted == Some(true),
        }
    }
}

/// Partial update of a record. `None` leaves the stored value unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_encrypted: Option<bool>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.is_encrypted.is_none()
    }
}

/// The wrapped workspace key. At most one per workspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceKeyRecord {
    pub workspace_id: String,
    pub wrapped_key: String,
    pub created_at: DateTime<Utc>,
}

impl WorkspaceKeyRecord {
    pub fn new(workspace_id: impl Into<String>, wrapped_key: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            wrapped_key: wrapped_key.into(),
            created_at: Utc::now(),
        }
    }
}
