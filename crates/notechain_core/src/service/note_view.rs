//! Note view assembly (latest content plus optional comparison).
//!
//! # Responsibility
//! - Build the caller-facing view of a note from its latest version.
//! - Diff latest against an arbitrary earlier version on demand.
//!
//! # Invariants
//! - Without `compare_to`, `diffs` is `None`; with it, `diffs` is `Some`
//!   even when the script has no changes.
//! - Comparison scripts are recomputed from stored full contents, never
//!   chained from adjacent stored diffs.

use crate::diff::{diff_lines, EditScript, ScriptStats};
use crate::model::note_version::{AuthorId, NoteId, VersionNumber};
use crate::repo::note_version_repo::NoteVersionRepository;
use crate::service::version_chain::{ChainConfig, VersionChain, VersionError};
use crate::text::normalize::{normalize, split_lines};
use crate::text::outline::{changed_sections, Document};
use serde::Serialize;

/// Caller-facing projection of a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteView {
    pub note_id: NoteId,
    /// Latest version number.
    pub version: VersionNumber,
    pub content: String,
    pub content_hash: String,
    /// Author of the latest version.
    pub author_id: AuthorId,
    /// Creation time of the latest version, epoch milliseconds.
    pub updated_at: i64,
    /// Version the diff was computed from, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compared_to: Option<VersionNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diffs: Option<EditScript>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ScriptStats>,
    /// Outline region keys that differ between the compared versions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_sections: Option<Vec<String>>,
}

impl NoteView {
    /// Whether a comparison was requested and attached.
    pub fn has_diff(&self) -> bool {
        self.diffs.is_some()
    }
}

/// Read-side service assembling note views over a version chain.
pub struct NoteViewService<R: NoteVersionRepository> {
    chain: VersionChain<R>,
}

impl<R: NoteVersionRepository> NoteViewService<R> {
    /// Creates a view service over the provided repository.
    pub fn new(repo: R) -> Self {
        Self::from_chain(VersionChain::with_config(repo, ChainConfig::default()))
    }

    /// Reuses an existing chain service.
    pub fn from_chain(chain: VersionChain<R>) -> Self {
        Self { chain }
    }

    /// Underlying chain for write paths.
    pub fn chain(&self) -> &VersionChain<R> {
        &self.chain
    }

    /// Builds the view of `note_id`, optionally diffed against `compare_to`.
    ///
    /// # Errors
    /// - `NoteNotFound` when the note has no versions.
    /// - `InvalidCompareVersion` unless `1 <= compare_to < latest`.
    /// - `Integrity` when either version fails hash verification.
    /// - `OversizeInput` when the comparison exceeds `max_diff_cells`.
    pub fn view(
        &self,
        note_id: NoteId,
        compare_to: Option<VersionNumber>,
    ) -> Result<NoteView, VersionError> {
        let latest = self
            .chain
            .latest(note_id)?
            .ok_or(VersionError::NoteNotFound(note_id))?;

        let mut view = NoteView {
            note_id,
            version: latest.version,
            content: latest.content,
            content_hash: latest.content_hash,
            author_id: latest.author_id,
            updated_at: latest.created_at,
            compared_to: None,
            diffs: None,
            stats: None,
            changed_sections: None,
        };

        let Some(base_version) = compare_to else {
            return Ok(view);
        };

        if base_version == 0 || base_version >= view.version {
            return Err(VersionError::InvalidCompareVersion {
                requested: base_version,
                latest: view.version,
            });
        }

        let base = self
            .chain
            .get(note_id, base_version)?
            .ok_or(VersionError::VersionNotFound {
                note_id,
                version: base_version,
            })?;

        let base_lines = split_lines(&base.content);
        let latest_lines = split_lines(&view.content);
        self.chain
            .config()
            .check_diff_size(base_lines.len(), latest_lines.len())?;
        let script = diff_lines(&base_lines, &latest_lines);
        let sections = changed_sections(
            &Document::from_normalized(normalize(&base.content)),
            &Document::from_normalized(normalize(&view.content)),
        );

        view.compared_to = Some(base_version);
        view.stats = Some(ScriptStats::of(&script));
        view.diffs = Some(script);
        view.changed_sections = Some(sections);
        Ok(view)
    }
}
