// src/image_codec.rs
//! Placeholder indirection for embedded base64 images.
//!
//! A note keeps its images inline as `![alt](data:image/<subtype>;base64,<payload>)`.
//! Those payloads are far too heavy for the live editor buffer, so the
//! editor works on an *editing form* where each image is swapped for
//! `![alt](IMAGE:<sizeKB>KB:<filename>)` and the original fragment is kept
//! in an [`ImageReplacements`] map. The *storage form* puts the payloads
//! back, and the *preview form* re-expands only the first few images so a
//! note with dozens of screenshots still renders quickly.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Link target used for images left out of a preview
pub const PREVIEW_MARKER: &str = "preview-placeholder";

/// Documents larger than this (bytes) are scanned without the regex engine
pub const DEFAULT_LINEAR_SCAN_THRESHOLD: usize = 512 * 1024;

const DATA_URI_OPEN: &str = "(data:image/";
const BASE64_MARKER: &str = ";base64,";

fn data_image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"!\[([^\]]*)\]\(data:image/([A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=]+)\)")
            .expect("data image pattern is valid")
    })
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"!\[([^\]]*)\]\(IMAGE:(\d+)KB:([^)\n]*)\)")
            .expect("placeholder pattern is valid")
    })
}

fn is_subtype_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'+' | b'-')
}

fn is_base64_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')
}

/// One embedded image found in a markdown document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFragment<'a> {
    /// Byte offset of the leading `!`
    pub start: usize,
    /// Byte offset just past the closing `)`
    pub end: usize,
    pub alt: &'a str,
    pub subtype: &'a str,
    pub payload: &'a str,
    /// The whole `![..](data:..)` text
    pub raw: &'a str,
}

impl ImageFragment<'_> {
    /// Decoded size estimate in bytes
    pub fn approximate_size(&self) -> usize {
        self.payload.len() * 3 / 4
    }

    /// Decoded size rounded to the nearest KB
    pub fn size_kb(&self) -> usize {
        (self.approximate_size() + 512) / 1024
    }

    /// Name shown in the placeholder: the alt text, or a generic name
    /// derived from the image type
    pub fn filename(&self) -> String {
        let alt = self.alt.trim();
        if alt.is_empty() {
            return format!("image.{}", extension_for(self.subtype));
        }
        alt.chars()
            .map(|c| match c {
                '(' | ')' | '\n' | '\r' => '_',
                other => other,
            })
            .collect()
    }
}

fn extension_for(subtype: &str) -> &str {
    match subtype {
        "jpeg" => "jpg",
        "svg+xml" => "svg",
        "x-icon" | "vnd.microsoft.icon" => "ico",
        other => other,
    }
}

/// How to look for image fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStrategy {
    Regex,
    /// Byte-wise scan with explicit bracket and parenthesis matching
    Linear,
}

impl ScanStrategy {
    pub fn for_len(len: usize, linear_scan_threshold: usize) -> Self {
        if len > linear_scan_threshold {
            ScanStrategy::Linear
        } else {
            ScanStrategy::Regex
        }
    }
}

/// Find every well-formed embedded image, in document order
pub fn find_image_fragments(markdown: &str, strategy: ScanStrategy) -> Vec<ImageFragment<'_>> {
    match strategy {
        ScanStrategy::Regex => scan_regex(markdown),
        ScanStrategy::Linear => scan_linear(markdown),
    }
}

fn scan_regex(markdown: &str) -> Vec<ImageFragment<'_>> {
    data_image_regex()
        .captures_iter(markdown)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(ImageFragment {
                start: whole.start(),
                end: whole.end(),
                alt: caps.get(1)?.as_str(),
                subtype: caps.get(2)?.as_str(),
                payload: caps.get(3)?.as_str(),
                raw: whole.as_str(),
            })
        })
        .collect()
}

fn scan_linear(markdown: &str) -> Vec<ImageFragment<'_>> {
    let mut fragments = Vec::new();
    let mut pos = 0;
    // First `]` at or after the last alt start looked at
    let mut close: Option<usize> = None;
    // A `]` whose data URI already failed to parse
    let mut dead_close: Option<usize> = None;

    while let Some(found) = markdown[pos..].find("![") {
        let start = pos + found;
        let alt_start = start + 2;
        let alt_end = match close {
            Some(c) if c >= alt_start => c,
            _ => match markdown[alt_start..].find(']') {
                Some(len) => {
                    close = Some(alt_start + len);
                    alt_start + len
                }
                None => break,
            },
        };

        if dead_close == Some(alt_end) {
            pos = start + 1;
            continue;
        }
        match parse_fragment(markdown, start, alt_end) {
            Some(fragment) => {
                pos = fragment.end;
                fragments.push(fragment);
            }
            None => {
                dead_close = Some(alt_end);
                pos = start + 1;
            }
        }
    }

    fragments
}

/// Read `![alt](data:image/..;base64,..)` where `start` is the `!` and
/// `alt_end` the closing `]`
fn parse_fragment(markdown: &str, start: usize, alt_end: usize) -> Option<ImageFragment<'_>> {
    let alt = &markdown[start + 2..alt_end];

    let uri_start = alt_end + 1;
    let tail = markdown[uri_start..].strip_prefix(DATA_URI_OPEN)?;
    let uri = parse_data_uri(tail).ok()?;

    let end = uri_start + DATA_URI_OPEN.len() + uri.consumed;
    Some(ImageFragment {
        start,
        end,
        alt,
        subtype: uri.subtype,
        payload: uri.payload,
        raw: &markdown[start..end],
    })
}

struct DataUri<'a> {
    subtype: &'a str,
    payload: &'a str,
    /// Bytes consumed, closing parenthesis included
    consumed: usize,
}

/// Parse `<subtype>;base64,<payload>)`, the part after `(data:image/`
fn parse_data_uri(tail: &str) -> Result<DataUri<'_>, &'static str> {
    let bytes = tail.as_bytes();

    let subtype_len = bytes.iter().take_while(|b| is_subtype_byte(**b)).count();
    if subtype_len == 0 {
        return Err("missing image subtype");
    }
    let after_subtype = &tail[subtype_len..];
    if !after_subtype.starts_with(BASE64_MARKER) {
        return Err("not a base64 data URI");
    }

    let payload_start = subtype_len + BASE64_MARKER.len();
    let payload_len = bytes[payload_start..]
        .iter()
        .take_while(|b| is_base64_byte(**b))
        .count();
    if payload_len == 0 {
        return Err("empty base64 payload");
    }

    let close = payload_start + payload_len;
    match bytes.get(close) {
        Some(b')') => Ok(DataUri {
            subtype: &tail[..subtype_len],
            payload: &tail[payload_start..close],
            consumed: close + 1,
        }),
        Some(_) => Err("invalid character in base64 payload"),
        None => Err("truncated base64 payload"),
    }
}

/// Data URIs that look like images but did not parse, outside any fragment
fn find_malformed(markdown: &str, fragments: &[ImageFragment<'_>]) -> Vec<CodecError> {
    let mut malformed = Vec::new();
    let mut covered = fragments.iter().peekable();

    for (offset, _) in markdown.match_indices(DATA_URI_OPEN) {
        while covered.peek().is_some_and(|f| f.end <= offset) {
            covered.next();
        }
        if covered.peek().is_some_and(|f| f.start <= offset) {
            continue;
        }
        if let Err(reason) = parse_data_uri(&markdown[offset + DATA_URI_OPEN.len()..]) {
            malformed.push(CodecError::MalformedFragment { offset, reason });
        }
    }

    malformed
}

/// Placeholder text → original image fragment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageReplacements {
    entries: HashMap<String, String>,
}

impl ImageReplacements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, placeholder: &str) -> Option<&str> {
        self.entries.get(placeholder).map(String::as_str)
    }

    pub fn contains(&self, placeholder: &str) -> bool {
        self.entries.contains_key(placeholder)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Store a fragment and return its placeholder.
    ///
    /// A placeholder already bound to a different fragment, or one in
    /// `literal` without an entry of its own, gets a `~N` suffix on its
    /// filename. `literal` holds the placeholder-shaped text already present
    /// in the document being contracted.
    pub fn register(&mut self, fragment: &ImageFragment<'_>, literal: &HashSet<&str>) -> String {
        let size_kb = fragment.size_kb();
        let filename = fragment.filename();

        let mut candidate = format_placeholder(fragment.alt, size_kb, &filename);
        let mut n = 1;
        loop {
            match self.entries.get(&candidate) {
                None if !literal.contains(candidate.as_str()) => {
                    self.entries.insert(candidate.clone(), fragment.raw.to_string());
                    return candidate;
                }
                Some(existing) if existing == fragment.raw => return candidate,
                _ => {
                    n += 1;
                    candidate =
                        format_placeholder(fragment.alt, size_kb, &format!("{}~{}", filename, n));
                }
            }
        }
    }

    /// Drop entries whose placeholder no longer occurs in `live_text`
    pub fn retain_used(&mut self, live_text: &str) -> usize {
        let used: HashSet<&str> = placeholder_regex()
            .find_iter(live_text)
            .map(|m| m.as_str())
            .collect();
        let before = self.entries.len();
        self.entries.retain(|placeholder, _| used.contains(placeholder.as_str()));
        before - self.entries.len()
    }
}

pub fn format_placeholder(alt: &str, size_kb: usize, filename: &str) -> String {
    format!("![{}](IMAGE:{}KB:{})", alt, size_kb, filename)
}

/// Result of converting a stored note to its editing form
#[derive(Debug, Clone, PartialEq)]
pub struct EditingForm {
    pub text: String,
    pub replacements: ImageReplacements,
    /// Image-like fragments that were left as literal text
    pub malformed: Vec<CodecError>,
}

/// Swap every embedded image for a placeholder, using a fresh map
pub fn to_editing_form(markdown: &str) -> EditingForm {
    let mut replacements = ImageReplacements::new();
    let (text, malformed) =
        contract_images(markdown, &mut replacements, DEFAULT_LINEAR_SCAN_THRESHOLD);
    EditingForm {
        text,
        replacements,
        malformed,
    }
}

/// Swap every embedded image for a placeholder, adding to `replacements`
pub fn contract_images(
    markdown: &str,
    replacements: &mut ImageReplacements,
    linear_scan_threshold: usize,
) -> (String, Vec<CodecError>) {
    let strategy = ScanStrategy::for_len(markdown.len(), linear_scan_threshold);
    let fragments = find_image_fragments(markdown, strategy);

    let malformed = find_malformed(markdown, &fragments);
    for err in &malformed {
        log::warn!("Leaving image fragment as text: {}", err);
    }

    if fragments.is_empty() {
        return (markdown.to_string(), malformed);
    }

    let literal: HashSet<&str> = placeholder_regex()
        .find_iter(markdown)
        .map(|m| m.as_str())
        .collect();

    let mut out = String::new();
    let mut cursor = 0;
    for fragment in &fragments {
        out.push_str(&markdown[cursor..fragment.start]);
        out.push_str(&replacements.register(fragment, &literal));
        cursor = fragment.end;
    }
    out.push_str(&markdown[cursor..]);

    log::debug!(
        "Contracted {} image(s) using {:?} scan ({} -> {} bytes)",
        fragments.len(),
        strategy,
        markdown.len(),
        out.len()
    );
    (out, malformed)
}

/// Put the original images back. Unknown placeholders pass through unchanged.
pub fn to_storage_form(editing_text: &str, replacements: &ImageReplacements) -> String {
    placeholder_regex()
        .replace_all(editing_text, |caps: &Captures<'_>| {
            let placeholder = &caps[0];
            match replacements.get(placeholder) {
                Some(original) => original.to_string(),
                None => {
                    log::debug!("No replacement for {}, keeping it", placeholder);
                    placeholder.to_string()
                }
            }
        })
        .into_owned()
}

/// Like [`to_storage_form`], but fails on the first unknown placeholder
pub fn to_storage_form_strict(
    editing_text: &str,
    replacements: &ImageReplacements,
) -> Result<String, CodecError> {
    if let Some(missing) = placeholder_regex()
        .find_iter(editing_text)
        .find(|m| !replacements.contains(m.as_str()))
    {
        return Err(CodecError::MissingReplacement {
            placeholder: missing.as_str().to_string(),
        });
    }
    Ok(to_storage_form(editing_text, replacements))
}

/// Expand the first `max_images` distinct placeholders; every other one
/// becomes `![name](preview-placeholder)`.
pub fn to_preview_form(
    editing_text: &str,
    replacements: &ImageReplacements,
    max_images: usize,
) -> String {
    let mut expanded: HashSet<String> = HashSet::new();
    let mut suppressed = 0usize;

    let out = placeholder_regex()
        .replace_all(editing_text, |caps: &Captures<'_>| {
            let placeholder = &caps[0];
            if let Some(original) = replacements.get(placeholder) {
                if expanded.contains(placeholder) {
                    return original.to_string();
                }
                if expanded.len() < max_images {
                    expanded.insert(placeholder.to_string());
                    return original.to_string();
                }
            }

            suppressed += 1;
            let name = if caps[1].is_empty() { &caps[3] } else { &caps[1] };
            format!("![{}]({})", name, PREVIEW_MARKER)
        })
        .into_owned();

    log::debug!(
        "Preview expanded {} image(s), suppressed {}",
        expanded.len(),
        suppressed
    );
    out
}
