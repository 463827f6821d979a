//! Version chain use-case service.
//!
//! # Responsibility
//! - Append normalized revisions to a note's chain with create-time diffs.
//! - Serve integrity-checked reads of single versions and full history.
//! - Verify a whole chain end to end.
//!
//! # Invariants
//! - Version numbers are `1, 2, 3, ...` per note with no gaps or repeats.
//! - Re-submitting the latest content is a no-op returning the latest record.
//! - Every read compares `content_hash` against the stored content.
//! - Concurrent writers are arbitrated only by the repository's conditional
//!   insert; losers re-read and retry up to `ChainConfig::max_retries`.

use crate::diff::{apply_script, diff_lines, ScriptStats};
use crate::model::note_version::{
    compute_content_hash, now_epoch_ms, AuthorId, DiffStrategy, NoteId, NoteVersion,
    VersionNumber,
};
use crate::repo::note_version_repo::{NoteVersionRepository, RepoError};
use crate::text::normalize::{normalize, split_lines};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_MAX_CONTENT_BYTES: usize = 512 * 1024;
const DEFAULT_MAX_LINES: usize = 5_000;
const DEFAULT_MAX_DIFF_CELLS: usize = 25_000_000;

/// Tunables for write paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Re-read/recompute attempts after losing an insert race.
    pub max_retries: u32,
    /// Upper bound on normalized content size in bytes.
    pub max_content_bytes: usize,
    /// Upper bound on normalized line count of one version.
    pub max_lines: usize,
    /// Upper bound on `old_lines * new_lines` for one diff. The LCS table
    /// holds one `u32` per cell.
    pub max_diff_cells: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            max_lines: DEFAULT_MAX_LINES,
            max_diff_cells: DEFAULT_MAX_DIFF_CELLS,
        }
    }
}

impl ChainConfig {
    /// Rejects a diff whose LCS table would exceed `max_diff_cells`.
    pub fn check_diff_size(
        &self,
        old_lines: usize,
        new_lines: usize,
    ) -> Result<(), VersionError> {
        let cells = old_lines.saturating_mul(new_lines);
        if cells > self.max_diff_cells {
            return Err(VersionError::OversizeInput {
                limit: SizeLimit::DiffCells,
                max: self.max_diff_cells,
                actual: cells,
            });
        }
        Ok(())
    }
}

/// Which input bound was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeLimit {
    Bytes,
    Lines,
    DiffCells,
}

impl Display for SizeLimit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes => f.write_str("bytes"),
            Self::Lines => f.write_str("lines"),
            Self::DiffCells => f.write_str("diff cells"),
        }
    }
}

/// Service error for version chain and view use-cases.
#[derive(Debug)]
pub enum VersionError {
    /// Target note has no versions.
    NoteNotFound(NoteId),
    /// Requested version does not exist.
    VersionNotFound {
        note_id: NoteId,
        version: VersionNumber,
    },
    /// Concurrent writers kept winning; caller may resubmit.
    Conflict { note_id: NoteId, attempts: u32 },
    /// Stored hash does not match stored content.
    Integrity {
        note_id: NoteId,
        version: VersionNumber,
        expected: String,
        actual: String,
    },
    /// Stored chain is structurally inconsistent.
    BrokenChain {
        note_id: NoteId,
        version: VersionNumber,
        reason: String,
    },
    /// Content exceeds configured bounds.
    OversizeInput {
        limit: SizeLimit,
        max: usize,
        actual: usize,
    },
    /// `compare_to` is not an earlier version of the note.
    InvalidCompareVersion {
        requested: VersionNumber,
        latest: VersionNumber,
    },
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for VersionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteNotFound(note_id) => write!(f, "note not found: {note_id}"),
            Self::VersionNotFound { note_id, version } => {
                write!(f, "version {version} not found for note {note_id}")
            }
            Self::Conflict { note_id, attempts } => write!(
                f,
                "concurrent writers for note {note_id}; gave up after {attempts} attempts"
            ),
            Self::Integrity {
                note_id,
                version,
                expected,
                actual,
            } => write!(
                f,
                "content hash mismatch for note {note_id} version {version}: stored {expected}, computed {actual}"
            ),
            Self::BrokenChain {
                note_id,
                version,
                reason,
            } => write!(
                f,
                "broken version chain for note {note_id} at version {version}: {reason}"
            ),
            Self::OversizeInput { limit, max, actual } => {
                write!(f, "content too large: {actual} {limit} exceeds {max}")
            }
            Self::InvalidCompareVersion { requested, latest } => write!(
                f,
                "cannot compare against version {requested}; latest is {latest}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VersionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for VersionError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(note_id) => Self::NoteNotFound(note_id),
            other => Self::Repo(other),
        }
    }
}

/// Outcome of a full-chain verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub note_id: NoteId,
    /// Number of versions checked.
    pub versions: usize,
    pub latest_version: VersionNumber,
    pub latest_hash: String,
}

/// Append-only version chain over a repository.
pub struct VersionChain<R: NoteVersionRepository> {
    repo: R,
    config: ChainConfig,
}

impl<R: NoteVersionRepository> VersionChain<R> {
    /// Creates a chain service with default limits.
    pub fn new(repo: R) -> Self {
        Self::with_config(repo, ChainConfig::default())
    }

    /// Creates a chain service with explicit limits.
    pub fn with_config(repo: R, config: ChainConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Appends `raw_content` as the next version of `note_id`.
    ///
    /// # Contract
    /// - Content is normalized before size checks, hashing and diffing.
    /// - Unchanged content returns the current latest version untouched.
    /// - Version 1 stores no diffs; later versions store the delta from the
    ///   previous version.
    ///
    /// # Errors
    /// - `OversizeInput` when normalized content exceeds `ChainConfig`, or
    ///   when diffing against the current latest would exceed
    ///   `max_diff_cells`.
    /// - `Integrity` when the current latest version fails hash verification.
    /// - `Conflict` when the retry budget is exhausted.
    pub fn create_version(
        &self,
        note_id: NoteId,
        author_id: AuthorId,
        raw_content: &str,
    ) -> Result<NoteVersion, VersionError> {
        let started_at = Instant::now();
        let content = normalize(raw_content);
        self.check_size(content.byte_len(), content.line_count())?;
        let content_hash = compute_content_hash(content.as_str());
        let new_lines = content.lines();

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let previous = match self.repo.latest_version(note_id)? {
                Some(found) => Some(verify(found)?),
                None => None,
            };

            if let Some(latest) = previous.as_ref() {
                if latest.content_hash == content_hash && latest.content == content.as_str() {
                    debug!(
                        "event=note_version_create module=version_chain status=noop note_id={} version={}",
                        note_id, latest.version
                    );
                    return Ok(latest.clone());
                }
                self.config
                    .check_diff_size(split_lines(&latest.content).len(), new_lines.len())?;
            }

            let next_version = previous.as_ref().map_or(0, |latest| latest.version) + 1;
            let diffs = previous
                .as_ref()
                .map(|latest| diff_lines(&split_lines(&latest.content), &new_lines));
            let stats = diffs.as_deref().map(ScriptStats::of).unwrap_or_default();

            let record = NoteVersion {
                note_id,
                version: next_version,
                content: content.as_str().to_string(),
                content_hash: content_hash.clone(),
                author_id,
                created_at: now_epoch_ms(),
                diff_strategy: DiffStrategy::CURRENT,
                diffs,
            };

            match self.repo.insert_version(&record) {
                Ok(()) => {
                    info!(
                        "event=note_version_create module=version_chain status=ok note_id={} version={} attempts={} inserted={} deleted={} duration_ms={}",
                        note_id,
                        next_version,
                        attempt,
                        stats.inserted,
                        stats.deleted,
                        started_at.elapsed().as_millis()
                    );
                    return Ok(record);
                }
                Err(RepoError::VersionConflict { .. }) if attempt <= self.config.max_retries => {
                    warn!(
                        "event=note_version_create module=version_chain status=retry note_id={} version={} attempt={}",
                        note_id, next_version, attempt
                    );
                }
                Err(RepoError::VersionConflict { .. }) => {
                    error!(
                        "event=note_version_create module=version_chain status=error error_code=conflict note_id={} attempts={}",
                        note_id, attempt
                    );
                    return Err(VersionError::Conflict {
                        note_id,
                        attempts: attempt,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Returns the latest version, or `None` for an unknown note.
    pub fn latest(&self, note_id: NoteId) -> Result<Option<NoteVersion>, VersionError> {
        self.repo.latest_version(note_id)?.map(verify).transpose()
    }

    /// Returns one version, or `None` when it does not exist.
    pub fn get(
        &self,
        note_id: NoteId,
        version: VersionNumber,
    ) -> Result<Option<NoteVersion>, VersionError> {
        self.repo.get_version(note_id, version)?.map(verify).transpose()
    }

    /// Returns every version of `note_id`, ascending. Empty for unknown notes.
    pub fn history(&self, note_id: NoteId) -> Result<Vec<NoteVersion>, VersionError> {
        self.repo
            .list_versions(note_id)?
            .into_iter()
            .map(verify)
            .collect()
    }

    /// Checks hashes, numbering and stored diffs for the whole chain.
    ///
    /// # Errors
    /// - `NoteNotFound` when the note has no versions.
    /// - `Integrity` on the first hash mismatch.
    /// - `BrokenChain` on a numbering gap, a diff on version 1, a missing
    ///   diff later on, or a diff that does not replay to the stored content.
    pub fn verify_chain(&self, note_id: NoteId) -> Result<ChainReport, VersionError> {
        let versions = self.repo.list_versions(note_id)?;
        if versions.is_empty() {
            return Err(VersionError::NoteNotFound(note_id));
        }

        let mut previous: Option<&NoteVersion> = None;
        for (idx, current) in versions.iter().enumerate() {
            check_hash(current)?;
            let expected_number = idx as VersionNumber + 1;
            if current.version != expected_number {
                return Err(broken(
                    current,
                    format!("expected version {expected_number}, found {}", current.version),
                ));
            }

            match (previous, current.diffs.as_ref()) {
                (None, None) => {}
                (None, Some(_)) => {
                    return Err(broken(current, "first version must not carry diffs".into()));
                }
                (Some(_), None) => {
                    return Err(broken(current, "missing diffs".into()));
                }
                (Some(prior), Some(script)) => {
                    let replayed = apply_script(&split_lines(&prior.content), script)
                        .map_err(|err| broken(current, format!("diffs do not replay: {err}")))?;
                    if replayed != split_lines(&current.content) {
                        return Err(broken(
                            current,
                            "diffs replay to different content".into(),
                        ));
                    }
                }
            }
            previous = Some(current);
        }

        let latest = &versions[versions.len() - 1];
        info!(
            "event=note_chain_verify module=version_chain status=ok note_id={} versions={}",
            note_id,
            versions.len()
        );
        Ok(ChainReport {
            note_id,
            versions: versions.len(),
            latest_version: latest.version,
            latest_hash: latest.content_hash.clone(),
        })
    }

    /// Deletes the note and every version. Used when the owning container
    /// is removed.
    pub fn delete_note(&self, note_id: NoteId) -> Result<(), VersionError> {
        self.repo.delete_note(note_id)?;
        info!(
            "event=note_delete module=version_chain status=ok note_id={}",
            note_id
        );
        Ok(())
    }

    fn check_size(&self, bytes: usize, lines: usize) -> Result<(), VersionError> {
        if bytes > self.config.max_content_bytes {
            return Err(VersionError::OversizeInput {
                limit: SizeLimit::Bytes,
                max: self.config.max_content_bytes,
                actual: bytes,
            });
        }
        if lines > self.config.max_lines {
            return Err(VersionError::OversizeInput {
                limit: SizeLimit::Lines,
                max: self.config.max_lines,
                actual: lines,
            });
        }
        Ok(())
    }
}

fn verify(version: NoteVersion) -> Result<NoteVersion, VersionError> {
    check_hash(&version)?;
    Ok(version)
}

fn check_hash(version: &NoteVersion) -> Result<(), VersionError> {
    let actual = compute_content_hash(&version.content);
    if actual == version.content_hash {
        return Ok(());
    }

    error!(
        "event=note_version_read module=version_chain status=error error_code=integrity note_id={} version={}",
        version.note_id, version.version
    );
    Err(VersionError::Integrity {
        note_id: version.note_id,
        version: version.version,
        expected: version.content_hash.clone(),
        actual,
    })
}

fn broken(version: &NoteVersion, reason: String) -> VersionError {
    VersionError::BrokenChain {
        note_id: version.note_id,
        version: version.version,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::{ChainConfig, SizeLimit, VersionChain, VersionError};
    use crate::repo::memory_repo::InMemoryNoteVersionRepository;
    use uuid::Uuid;

    #[test]
    fn config_deserializes_with_defaults_for_missing_fields() {
        let config: ChainConfig = serde_json::from_str(r#"{"max_retries": 9}"#).unwrap();
        assert_eq!(config.max_retries, 9);
        assert_eq!(config.max_lines, ChainConfig::default().max_lines);
    }

    #[test]
    fn oversize_line_count_is_rejected_before_storage() {
        let repo = InMemoryNoteVersionRepository::new();
        let chain = VersionChain::with_config(
            &repo,
            ChainConfig {
                max_lines: 2,
                ..ChainConfig::default()
            },
        );

        let err = chain
            .create_version(Uuid::new_v4(), Uuid::new_v4(), "a\nb\nc\n")
            .unwrap_err();
        assert!(matches!(
            err,
            VersionError::OversizeInput {
                limit: SizeLimit::Lines,
                max: 2,
                actual: 3
            }
        ));
        assert_eq!(repo.total_versions().unwrap(), 0);
    }

    #[test]
    fn default_line_limit_fits_default_diff_budget() {
        let config = ChainConfig::default();
        assert!(config.max_lines * config.max_lines <= config.max_diff_cells);
    }

    #[test]
    fn diff_over_cell_budget_is_rejected_without_writing() {
        let repo = InMemoryNoteVersionRepository::new();
        let chain = VersionChain::with_config(
            &repo,
            ChainConfig {
                max_diff_cells: 8,
                ..ChainConfig::default()
            },
        );
        let note_id = Uuid::new_v4();

        // Version 1 has nothing to diff against.
        chain
            .create_version(note_id, Uuid::new_v4(), "a\nb\nc\n")
            .unwrap();
        let err = chain
            .create_version(note_id, Uuid::new_v4(), "x\ny\nz\n")
            .unwrap_err();
        assert!(matches!(
            err,
            VersionError::OversizeInput {
                limit: SizeLimit::DiffCells,
                max: 8,
                actual: 9
            }
        ));
        assert_eq!(repo.total_versions().unwrap(), 1);

        // Within budget still succeeds.
        assert_eq!(
            chain
                .create_version(note_id, Uuid::new_v4(), "a\nb\n")
                .unwrap()
                .version,
            2
        );
    }

    #[test]
    fn oversize_bytes_is_rejected() {
        let chain = VersionChain::with_config(
            InMemoryNoteVersionRepository::new(),
            ChainConfig {
                max_content_bytes: 4,
                ..ChainConfig::default()
            },
        );
        let err = chain
            .create_version(Uuid::new_v4(), Uuid::new_v4(), "abcdef")
            .unwrap_err();
        assert!(matches!(
            err,
            VersionError::OversizeInput {
                limit: SizeLimit::Bytes,
                ..
            }
        ));
    }
}
