// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A disputed line span between the local and remote copies of a document
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRegion {
    /// First line of the span in the remote document (0-based)
    pub start_line: usize,
    /// One past the last line of the span in the remote document
    pub end_line: usize,
    pub local_content: String,
    pub remote_content: String,
    /// Common ancestor text, display only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_content: Option<String>,
}

impl ConflictRegion {
    pub fn new(
        start_line: usize,
        end_line: usize,
        local_content: impl Into<String>,
        remote_content: impl Into<String>,
    ) -> Self {
        Self {
            start_line,
            end_line,
            local_content: local_content.into(),
            remote_content: remote_content.into(),
            base_content: None,
        }
    }

    pub fn with_base(mut self, base_content: impl Into<String>) -> Self {
        self.base_content = Some(base_content.into());
        self
    }
}

/// Everything the storage layer knows about a rejected save
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictData {
    pub file_id: String,
    pub file_name: String,
    pub local_version: String,
    pub remote_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conflict_regions: Vec<ConflictRegion>,
}

impl ConflictData {
    pub fn new(
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        local_version: impl Into<String>,
        remote_version: impl Into<String>,
        conflict_regions: Vec<ConflictRegion>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            file_name: file_name.into(),
            local_version: local_version.into(),
            remote_version: remote_version.into(),
            base_version: None,
            local_author: None,
            remote_author: None,
            local_modified: None,
            remote_modified: None,
            conflict_regions,
        }
    }

    /// Parse the JSON body of a version-conflict response
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceKind {
    Local,
    Remote,
    Custom,
}

/// Wire form of a per-region decision, as sent by the editing surface
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionChoice {
    pub region_index: usize,
    pub choice: ChoiceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_content: Option<String>,
}

/// A validated decision for one region
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Keep our text
    Local,
    /// Keep their text
    Remote,
    /// Hand-edited merge
    Custom(String),
}

impl Resolution {
    pub fn kind(&self) -> ChoiceKind {
        match self {
            Resolution::Local => ChoiceKind::Local,
            Resolution::Remote => ChoiceKind::Remote,
            Resolution::Custom(_) => ChoiceKind::Custom,
        }
    }

    /// The text this decision puts in place of the region
    pub fn source_text<'a>(&'a self, region: &'a ConflictRegion) -> &'a str {
        match self {
            Resolution::Local => &region.local_content,
            Resolution::Remote => &region.remote_content,
            Resolution::Custom(content) => content,
        }
    }
}

/// How a resolver session ended
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ConflictOutcome {
    Resolved { file_id: String, content: String },
    Cancelled { file_id: String },
}
