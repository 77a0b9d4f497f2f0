// src/conflict_resolver.rs
//! Per-region conflict decisions and reassembly of the merged document.
//!
//! The merged text is built from the remote document: every region's line
//! span is replaced by the text of the chosen side. Regions are spliced from
//! the bottom of the document upwards so that a splice never moves the line
//! offsets of a region that has not been applied yet.

use std::collections::BTreeMap;

use crate::error::ConflictError;
use crate::models::{
    ChoiceKind, ConflictData, ConflictOutcome, ConflictRegion, Resolution, ResolutionChoice,
};

/// Holds one `ConflictData` and the decisions recorded against it
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    data: ConflictData,
    resolutions: BTreeMap<usize, Resolution>,
}

impl ConflictResolver {
    pub fn new(data: ConflictData) -> Self {
        Self {
            data,
            resolutions: BTreeMap::new(),
        }
    }

    pub fn data(&self) -> &ConflictData {
        &self.data
    }

    pub fn region_count(&self) -> usize {
        self.data.conflict_regions.len()
    }

    pub fn region(&self, index: usize) -> Option<&ConflictRegion> {
        self.data.conflict_regions.get(index)
    }

    /// Record (or overwrite) the decision for one region
    pub fn select_resolution(
        &mut self,
        region_index: usize,
        resolution: Resolution,
    ) -> Result<(), ConflictError> {
        let len = self.region_count();
        if region_index >= len {
            return Err(ConflictError::RegionOutOfRange {
                index: region_index,
                len,
            });
        }

        log::debug!(
            "Region {} of {} resolved as {:?}",
            region_index,
            self.data.file_id,
            resolution.kind()
        );
        self.resolutions.insert(region_index, resolution);
        Ok(())
    }

    /// Record a decision in the form the editing surface sends it
    pub fn apply_choice(&mut self, choice: ResolutionChoice) -> Result<(), ConflictError> {
        let resolution = match choice.choice {
            ChoiceKind::Local => Resolution::Local,
            ChoiceKind::Remote => Resolution::Remote,
            ChoiceKind::Custom => {
                let content = choice
                    .custom_content
                    .ok_or(ConflictError::MissingCustomContent {
                        index: choice.region_index,
                    })?;
                Resolution::Custom(content)
            }
        };
        self.select_resolution(choice.region_index, resolution)
    }

    /// Apply the same decision to every region
    pub fn select_all(&mut self, resolution: Resolution) {
        for index in 0..self.region_count() {
            self.resolutions.insert(index, resolution.clone());
        }
    }

    pub fn resolution(&self, region_index: usize) -> Option<&Resolution> {
        self.resolutions.get(&region_index)
    }

    pub fn unresolved_regions(&self) -> Vec<usize> {
        (0..self.region_count())
            .filter(|index| !self.resolutions.contains_key(index))
            .collect()
    }

    pub fn all_conflicts_resolved(&self) -> bool {
        (0..self.region_count()).all(|index| self.resolutions.contains_key(&index))
    }

    /// Assemble the merged document.
    ///
    /// Fails without touching any state if a region is still undecided.
    pub fn resolve_conflicts(&self) -> Result<String, ConflictError> {
        let unresolved = self.unresolved_regions();
        if !unresolved.is_empty() {
            return Err(ConflictError::IncompleteResolution { unresolved });
        }

        let mut lines: Vec<&str> = self.data.remote_version.split('\n').collect();

        let mut order: Vec<usize> = (0..self.region_count()).collect();
        order.sort_by(|a, b| {
            let (ra, rb) = (&self.data.conflict_regions[*a], &self.data.conflict_regions[*b]);
            rb.start_line.cmp(&ra.start_line).then(b.cmp(a))
        });

        for index in order {
            let region = &self.data.conflict_regions[index];
            let Some(resolution) = self.resolutions.get(&index) else {
                continue;
            };
            splice_lines(&mut lines, region, resolution.source_text(region));
        }

        Ok(lines.join("\n"))
    }

    /// Assemble the merged document and end the session
    pub fn finish(self) -> Result<ConflictOutcome, ConflictError> {
        let content = self.resolve_conflicts()?;
        log::info!(
            "Resolved {} conflict region(s) in {}",
            self.region_count(),
            self.data.file_name
        );
        Ok(ConflictOutcome::Resolved {
            file_id: self.data.file_id,
            content,
        })
    }

    /// Abandon the session; the document is left as it was
    pub fn cancel(self) -> ConflictOutcome {
        log::info!("Conflict resolution cancelled for {}", self.data.file_name);
        ConflictOutcome::Cancelled {
            file_id: self.data.file_id,
        }
    }
}

/// Replace `[start_line, end_line)` with the lines of `text`, clamping the
/// span to the current document like a slice would.
fn splice_lines<'a>(lines: &mut Vec<&'a str>, region: &ConflictRegion, text: &'a str) {
    let start = region.start_line.min(lines.len());
    let end = region.end_line.max(start).min(lines.len());

    let replacement: Vec<&str> = text.split('\n').collect();

    log::debug!(
        "Splicing lines {}..{} with {} line(s)",
        start,
        end,
        replacement.len()
    );
    lines.splice(start..end, replacement);
}
