//! Note version record.
//!
//! # Responsibility
//! - Define the immutable revision stored in a note's version chain.
//! - Own the content digest used for integrity checks.
//!
//! # Invariants
//! - `(note_id, version)` is unique and never reused.
//! - `content_hash == compute_content_hash(content)` for every valid record.
//! - `diffs` is `None` exactly for version 1.

use crate::diff::EditScript;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of a versioned note.
pub type NoteId = Uuid;

/// Opaque caller identity supplied by the authorization layer.
pub type AuthorId = Uuid;

/// Per-note revision number, starting at 1.
pub type VersionNumber = u32;

/// Algorithm that produced a version's `diffs`.
///
/// Stored alongside every record so older rows stay readable if the diff
/// algorithm changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStrategy {
    /// Line-level LCS with insert-before-delete tie-break.
    LineLcsV1,
}

impl DiffStrategy {
    /// Current strategy for new versions.
    pub const CURRENT: Self = Self::LineLcsV1;

    /// Storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LineLcsV1 => "line_lcs_v1",
        }
    }

    /// Parses the storage representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "line_lcs_v1" => Some(Self::LineLcsV1),
            _ => None,
        }
    }
}

/// One immutable revision of a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteVersion {
    pub note_id: NoteId,
    pub version: VersionNumber,
    /// Normalized note text at this revision.
    pub content: String,
    /// Lowercase hex SHA-256 of `content`.
    pub content_hash: String,
    pub author_id: AuthorId,
    /// Creation time in epoch milliseconds.
    pub created_at: i64,
    pub diff_strategy: DiffStrategy,
    /// Edit script from the previous version; absent for version 1.
    pub diffs: Option<EditScript>,
}

impl NoteVersion {
    /// Returns whether the stored hash matches the stored content.
    pub fn hash_matches(&self) -> bool {
        compute_content_hash(&self.content) == self.content_hash
    }
}

/// Computes the lowercase hex SHA-256 digest of `content`.
pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
