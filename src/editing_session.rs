// src/editing_session.rs
//! The open-document session that owns the image replacement map.
//!
//! One session edits one document at a time. The map lives exactly as long
//! as that document is open: switching to another file clears it, and it is
//! pruned once it grows past the configured threshold.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::CodecSettings;
use crate::image_codec::{self, ImageReplacements};

/// Which document a session is editing
#[derive(Debug, Clone, Serialize)]
pub struct SessionDocument {
    pub file_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct EditingSession {
    id: String,
    document: Option<SessionDocument>,
    replacements: ImageReplacements,
    settings: CodecSettings,
}

impl Default for EditingSession {
    fn default() -> Self {
        Self::new(CodecSettings::default())
    }
}

impl EditingSession {
    pub fn new(settings: CodecSettings) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document: None,
            replacements: ImageReplacements::new(),
            settings,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document(&self) -> Option<&SessionDocument> {
        self.document.as_ref()
    }

    pub fn replacements(&self) -> &ImageReplacements {
        &self.replacements
    }

    pub fn settings(&self) -> &CodecSettings {
        &self.settings
    }

    /// Start editing `markdown`; returns its editing form.
    ///
    /// Reopening the same file keeps the map so placeholders stay stable.
    pub fn open_document(&mut self, file_id: &str, markdown: &str) -> String {
        let same_file = self
            .document
            .as_ref()
            .is_some_and(|doc| doc.file_id == file_id);

        if !same_file {
            log::info!("Session {} switching to document {}", self.id, file_id);
            self.replacements.clear();
            self.document = Some(SessionDocument {
                file_id: file_id.to_string(),
                opened_at: Utc::now(),
            });
        }

        self.contract(markdown)
    }

    /// Replace any base64 images in `text` (e.g. freshly pasted) with placeholders
    pub fn contract(&mut self, text: &str) -> String {
        let (editing, _malformed) = image_codec::contract_images(
            text,
            &mut self.replacements,
            self.settings.linear_scan_threshold,
        );
        editing
    }

    /// Full markdown for saving
    pub fn storage_text(&self, editing_text: &str) -> String {
        image_codec::to_storage_form(editing_text, &self.replacements)
    }

    /// Markdown for the renderer, with at most `max_preview_images` real images
    pub fn preview_text(&self, editing_text: &str) -> String {
        image_codec::to_preview_form(
            editing_text,
            &self.replacements,
            self.settings.max_preview_images,
        )
    }

    /// Drop placeholders that are gone from `live_text`, once the map has
    /// outgrown the prune threshold. Returns how many entries were removed.
    pub fn prune(&mut self, live_text: &str) -> usize {
        if self.replacements.len() <= self.settings.prune_threshold {
            return 0;
        }

        let removed = self.replacements.retain_used(live_text);
        log::debug!(
            "Pruned {} unused image placeholder(s), {} left",
            removed,
            self.replacements.len()
        );
        removed
    }

    pub fn close(&mut self) {
        if let Some(doc) = self.document.take() {
            log::info!("Session {} closed document {}", self.id, doc.file_id);
        }
        self.replacements.clear();
    }
}
