//! Error types for conflict resolution and image placeholder handling

use thiserror::Error;

/// Errors raised while deciding or assembling a conflict resolution
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConflictError {
    /// Finalizing was attempted while some regions still lack a decision
    #[error("cannot resolve: {} region(s) still undecided {unresolved:?}", .unresolved.len())]
    IncompleteResolution { unresolved: Vec<usize> },

    /// A decision targeted a region that does not exist
    #[error("region index {index} out of range (document has {len} regions)")]
    RegionOutOfRange { index: usize, len: usize },

    /// A custom decision arrived without its text
    #[error("custom resolution for region {index} has no content")]
    MissingCustomContent { index: usize },
}

/// Errors from the image placeholder codec.
///
/// The lenient codec entry points never return these; they log and carry on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Something that looks like an embedded image but does not parse
    #[error("malformed image fragment at byte {offset}: {reason}")]
    MalformedFragment { offset: usize, reason: &'static str },

    /// A placeholder with no stored original
    #[error("no replacement recorded for placeholder {placeholder}")]
    MissingReplacement { placeholder: String },
}
