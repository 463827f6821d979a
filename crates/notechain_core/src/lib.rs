//! Note versioning and diff engine.
//! Normalizes note text, computes line edit scripts and keeps an append-only,
//! hash-verified chain of revisions per note.

pub mod db;
pub mod diff;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod text;

pub use diff::{
    apply_script, diff_lines, diff_texts, ApplyError, DiffOp, DiffTag, EditScript, ScriptStats,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::note_version::{
    compute_content_hash, AuthorId, DiffStrategy, NoteId, NoteVersion, VersionNumber,
};
pub use repo::memory_repo::InMemoryNoteVersionRepository;
pub use repo::note_version_repo::{
    NoteVersionRepository, RepoError, RepoResult, SqliteNoteVersionRepository,
};
pub use service::note_view::{NoteView, NoteViewService};
pub use service::version_chain::{ChainConfig, ChainReport, SizeLimit, VersionChain, VersionError};
pub use text::normalize::{normalize, NormalizedText};
pub use text::outline::{changed_sections, Document, PREAMBLE_KEY};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
