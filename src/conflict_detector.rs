// src/conflict_detector.rs
//! Builds `ConflictData` when a save lands on a document that moved on.
//!
//! Regions are line spans of the remote document where the local copy
//! differs. They are produced in ascending order and never overlap, and
//! neither side of a region is ever an empty line span, so resolving every
//! region to one side reproduces that side exactly.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use similar::{capture_diff_slices, Algorithm, DiffOp, DiffTag};

use crate::models::{ConflictData, ConflictRegion};

/// Version token for a document body: hex SHA-256 of its text
pub fn content_version(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// A save the editing surface is trying to make
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAttempt {
    pub file_id: String,
    pub file_name: String,
    pub content: String,
    /// Version the edit started from
    pub base_version: String,
    /// Text of that version, when the client still has it
    #[serde(default)]
    pub base_content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

/// The copy currently held by storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub content: String,
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl RemoteDocument {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            version: content_version(&content),
            content,
            author: None,
            modified_at: None,
        }
    }
}

/// Paired line ranges: `old` in remote, `new` in local
#[derive(Debug, Clone, PartialEq, Eq)]
struct Hunk {
    old: Range<usize>,
    new: Range<usize>,
}

/// Line-level detector for version conflicts
#[derive(Debug, Clone, Copy)]
pub struct ConflictDetector {
    algorithm: Algorithm,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new(Algorithm::Myers)
    }
}

impl ConflictDetector {
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }

    /// Check a save against storage. `None` means the save can go ahead.
    pub fn detect_save_conflict(
        &self,
        attempt: &SaveAttempt,
        remote: &RemoteDocument,
    ) -> Option<ConflictData> {
        if attempt.base_version == remote.version {
            return None;
        }
        if attempt.content == remote.content {
            log::debug!("{} changed remotely to the same text", attempt.file_name);
            return None;
        }

        let regions = self.detect_regions(
            &attempt.content,
            &remote.content,
            attempt.base_content.as_deref(),
        );
        log::info!(
            "Version conflict on {}: {} region(s)",
            attempt.file_name,
            regions.len()
        );

        Some(ConflictData {
            file_id: attempt.file_id.clone(),
            file_name: attempt.file_name.clone(),
            local_version: attempt.content.clone(),
            remote_version: remote.content.clone(),
            base_version: attempt.base_content.clone(),
            local_author: attempt.author.clone(),
            remote_author: remote.author.clone(),
            local_modified: attempt.modified_at,
            remote_modified: remote.modified_at,
            conflict_regions: regions,
        })
    }

    /// Line regions of `remote` where `local` differs
    pub fn detect_regions(
        &self,
        local: &str,
        remote: &str,
        base: Option<&str>,
    ) -> Vec<ConflictRegion> {
        let remote_lines: Vec<&str> = remote.split('\n').collect();
        let local_lines: Vec<&str> = local.split('\n').collect();

        let ops = capture_diff_slices(self.algorithm, &remote_lines, &local_lines);
        let hunks = merge_overlapping(widen_empty_sides(group_hunks(&ops)));

        let base_lines: Option<Vec<&str>> = base.map(|b| b.split('\n').collect());
        let base_ops = base_lines
            .as_ref()
            .map(|lines| capture_diff_slices(self.algorithm, &remote_lines, lines));

        hunks
            .into_iter()
            .map(|hunk| {
                let region = ConflictRegion::new(
                    hunk.old.start,
                    hunk.old.end,
                    local_lines[hunk.new.clone()].join("\n"),
                    remote_lines[hunk.old.clone()].join("\n"),
                );
                match (&base_lines, &base_ops) {
                    (Some(lines), Some(ops)) => {
                        let span = map_span(ops, &hunk.old, lines.len());
                        region.with_base(lines[span].join("\n"))
                    }
                    _ => region,
                }
            })
            .collect()
    }
}

/// Collapse each run of non-equal diff ops into one hunk
fn group_hunks(ops: &[DiffOp]) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    for op in ops {
        if op.tag() == DiffTag::Equal {
            if let Some(h) = current.take() {
                hunks.push(h);
            }
            continue;
        }

        let (old, new) = (op.old_range(), op.new_range());
        match current {
            Some(ref mut h) => {
                h.old.end = old.end;
                h.new.end = new.end;
            }
            None => current = Some(Hunk { old, new }),
        }
    }

    if let Some(h) = current {
        hunks.push(h);
    }
    hunks
}

/// Give pure insertions and deletions one line of unchanged context.
///
/// Hunks are maximal, so the line before (or after) one is always an equal
/// line on both sides.
fn widen_empty_sides(hunks: Vec<Hunk>) -> Vec<Hunk> {
    hunks
        .into_iter()
        .map(|mut hunk| {
            if hunk.old.is_empty() || hunk.new.is_empty() {
                if hunk.old.start > 0 && hunk.new.start > 0 {
                    hunk.old.start -= 1;
                    hunk.new.start -= 1;
                } else {
                    hunk.old.end += 1;
                    hunk.new.end += 1;
                }
            }
            hunk
        })
        .collect()
}

fn merge_overlapping(hunks: Vec<Hunk>) -> Vec<Hunk> {
    let mut merged: Vec<Hunk> = Vec::with_capacity(hunks.len());
    for hunk in hunks {
        match merged.last_mut() {
            Some(last) if hunk.old.start < last.old.end => {
                last.old.end = last.old.end.max(hunk.old.end);
                last.new.end = last.new.end.max(hunk.new.end);
            }
            _ => merged.push(hunk),
        }
    }
    merged
}

/// Map a remote line span onto base through a remote → base diff
fn map_span(ops: &[DiffOp], span: &Range<usize>, base_len: usize) -> Range<usize> {
    let start = ops
        .iter()
        .find(|op| {
            let old = op.old_range();
            (old.is_empty() && old.start == span.start) || old.contains(&span.start)
        })
        .map(|op| {
            let (old, new) = (op.old_range(), op.new_range());
            if op.tag() == DiffTag::Equal {
                new.start + (span.start - old.start)
            } else {
                new.start
            }
        })
        .unwrap_or(base_len);

    let end = ops
        .iter()
        .rev()
        .find(|op| {
            let old = op.old_range();
            (old.is_empty() && old.start == span.end)
                || (old.start < span.end && span.end <= old.end)
        })
        .map(|op| {
            let (old, new) = (op.old_range(), op.new_range());
            if op.tag() == DiffTag::Equal {
                new.start + (span.end - old.start)
            } else {
                new.end
            }
        })
        .unwrap_or(start);

    let start = start.min(base_len);
    start..end.clamp(start, base_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_version_is_stable() {
        assert_eq!(content_version("abc"), content_version("abc"));
        assert_ne!(content_version("abc"), content_version("abd"));
        assert_eq!(
            content_version(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_identical_texts() {
        let regions = ConflictDetector::default().detect_regions("a\nb", "a\nb", None);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_single_changed_line() {
        let regions = ConflictDetector::default().detect_regions("a\nX\nc", "a\nb\nc", None);
        assert_eq!(regions, vec![ConflictRegion::new(1, 2, "X", "b")]);
    }

    #[test]
    fn test_pure_insertion_gets_context() {
        let regions = ConflictDetector::default().detect_regions("a\nnew\nb", "a\nb", None);
        assert_eq!(regions, vec![ConflictRegion::new(0, 1, "a\nnew", "a")]);
    }

    #[test]
    fn test_deletion_at_start_uses_following_line() {
        let regions = ConflictDetector::default().detect_regions("b\nc", "a\nb\nc", None);
        assert_eq!(regions, vec![ConflictRegion::new(0, 2, "b", "a\nb")]);
    }

    #[test]
    fn test_shared_context_line_merges_hunks() {
        // Both hunks want line "b" as context
        let regions = ConflictDetector::default().detect_regions("b\nx\nc", "a\nb\nc", None);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start_line, 0);
        assert_eq!(regions[0].local_content, "b\nx");
        assert_eq!(regions[0].remote_content, "a\nb");
    }

    #[test]
    fn test_base_content_is_mapped() {
        let regions = ConflictDetector::default().detect_regions(
            "a\nlocal\nc",
            "a\nremote\nc",
            Some("a\nbase\nc"),
        );
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].base_content.as_deref(), Some("base"));
    }

    #[test]
    fn test_base_insertion_at_region_edge() {
        let detector = ConflictDetector::default();

        let regions = detector.detect_regions("a\nB\nc", "a\nb\nc", Some("a\nx\nb\nc"));
        assert_eq!(
            regions,
            vec![ConflictRegion::new(1, 2, "B", "b").with_base("x\nb")]
        );

        // Widened context line "a" is followed by the base-only line
        let regions = detector.detect_regions("a\nnew\nb", "a\nb", Some("a\nx\nb"));
        assert_eq!(
            regions,
            vec![ConflictRegion::new(0, 1, "a\nnew", "a").with_base("a\nx")]
        );
    }

    #[test]
    fn test_base_deletion_maps_to_empty_span() {
        let detector = ConflictDetector::default();

        let regions = detector.detect_regions("a\nB\nc\nd", "a\nb\nc\nd", Some("a\nc\nd"));
        assert_eq!(regions, vec![ConflictRegion::new(1, 2, "B", "b").with_base("")]);

        // Widened context line "b" is the one base never had
        let regions = detector.detect_regions("a\nb\nnew\nc", "a\nb\nc", Some("a\nc"));
        assert_eq!(
            regions,
            vec![ConflictRegion::new(1, 2, "b\nnew", "b").with_base("")]
        );
    }

    #[test]
    fn test_map_span_past_the_diff() {
        let remote = ["a", "b"];
        let ops = capture_diff_slices(Algorithm::Myers, &remote, &remote);

        assert_eq!(map_span(&ops, &(0..2), 2), 0..2);
        assert_eq!(map_span(&ops, &(2..2), 2), 2..2);
        assert_eq!(map_span(&ops, &(5..7), 2), 2..2);
        assert_eq!(map_span(&ops, &(0..0), 2), 0..0);
        assert_eq!(map_span(&[], &(0..1), 0), 0..0);
    }

    #[test]
    fn test_regions_are_ordered_and_disjoint() {
        let local = "1\nx\n3\n4\n5\ny\n7\n\n9";
        let remote = "1\n2\n3\n4\n5\n6\n7\n8\n9";
        let regions = ConflictDetector::default().detect_regions(local, remote, None);

        assert_eq!(regions.len(), 3);
        for pair in regions.windows(2) {
            assert!(pair[0].end_line <= pair[1].start_line);
        }
    }

    #[test]
    fn test_matching_version_is_not_a_conflict() {
        let remote = RemoteDocument::new("a\nb");
        let attempt = SaveAttempt {
            file_id: "f".to_string(),
            file_name: "f.md".to_string(),
            content: "a\nchanged".to_string(),
            base_version: remote.version.clone(),
            base_content: None,
            author: None,
            modified_at: None,
        };
        assert!(ConflictDetector::default()
            .detect_save_conflict(&attempt, &remote)
            .is_none());
    }
}
