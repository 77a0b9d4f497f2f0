//! Merge-conflict resolution and base64 image placeholders for a markdown
//! notes editor.

pub mod models;
pub mod error;
pub mod conflict_detector;
pub mod conflict_resolver;
pub mod image_codec;
pub mod editing_session;
pub mod config;

pub use config::CodecSettings;
pub use conflict_detector::{content_version, ConflictDetector, RemoteDocument, SaveAttempt};
pub use conflict_resolver::ConflictResolver;
pub use editing_session::EditingSession;
pub use error::{CodecError, ConflictError};
pub use image_codec::{
    to_editing_form, to_preview_form, to_storage_form, EditingForm, ImageReplacements,
};
pub use models::{
    ChoiceKind, ConflictData, ConflictOutcome, ConflictRegion, Resolution, ResolutionChoice,
};

/// Install `env_logger` as the log backend.
///
/// Fails if a logger is already installed for this process.
pub fn init_logging() -> Result<(), log::SetLoggerError> {
    env_logger::try_init()?;
    log::debug!("Logging initialised");
    Ok(())
}
