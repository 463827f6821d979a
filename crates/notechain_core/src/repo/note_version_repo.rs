//! Note version repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the storage interface the version chain depends on.
//! - Persist versions in `note_versions`, creating the owning `notes` row on
//!   first insert.
//!
//! # Invariants
//! - `insert_version` is a conditional insert: an existing
//!   `(note_id, version)` row yields `RepoError::VersionConflict`, never an
//!   overwrite.
//! - Read paths return rows as stored; hash verification is the chain's job.
//! - Deleting a note cascades to all of its versions.

use crate::db::{ensure_table, DbError};
use crate::diff::EditScript;
use crate::model::note_version::{DiffStrategy, NoteId, NoteVersion, VersionNumber};
use rusqlite::{params, Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const VERSION_SELECT_SQL: &str = "SELECT
    note_id,
    version,
    content,
    content_hash,
    author_id,
    created_at,
    diff_strategy,
    diffs
FROM note_versions";

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage error for version persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Target note has no stored versions.
    NotFound(NoteId),
    /// A record for `(note_id, version)` already exists.
    VersionConflict {
        note_id: NoteId,
        version: VersionNumber,
    },
    InvalidData(String),
    /// In-process store lock was poisoned by a panicking writer.
    StorePoisoned,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(note_id) => write!(f, "note not found: {note_id}"),
            Self::VersionConflict { note_id, version } => {
                write!(f, "version {version} already exists for note {note_id}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted version data: {message}"),
            Self::StorePoisoned => write!(f, "version store lock poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage interface for one or more version chains.
pub trait NoteVersionRepository {
    /// Inserts `version` unless `(note_id, version)` already exists.
    fn insert_version(&self, version: &NoteVersion) -> RepoResult<()>;
    /// Point lookup by `(note_id, version)`.
    fn get_version(
        &self,
        note_id: NoteId,
        version: VersionNumber,
    ) -> RepoResult<Option<NoteVersion>>;
    /// Returns the maximum-version record for `note_id`.
    fn latest_version(&self, note_id: NoteId) -> RepoResult<Option<NoteVersion>>;
    /// Returns every version of `note_id`, ascending.
    fn list_versions(&self, note_id: NoteId) -> RepoResult<Vec<NoteVersion>>;
    /// Removes the note and all its versions.
    fn delete_note(&self, note_id: NoteId) -> RepoResult<()>;
}

impl<R: NoteVersionRepository + ?Sized> NoteVersionRepository for &R {
    fn insert_version(&self, version: &NoteVersion) -> RepoResult<()> {
        (**self).insert_version(version)
    }

    fn get_version(
        &self,
        note_id: NoteId,
        version: VersionNumber,
    ) -> RepoResult<Option<NoteVersion>> {
        (**self).get_version(note_id, version)
    }

    fn latest_version(&self, note_id: NoteId) -> RepoResult<Option<NoteVersion>> {
        (**self).latest_version(note_id)
    }

    fn list_versions(&self, note_id: NoteId) -> RepoResult<Vec<NoteVersion>> {
        (**self).list_versions(note_id)
    }

    fn delete_note(&self, note_id: NoteId) -> RepoResult<()> {
        (**self).delete_note(note_id)
    }
}

/// SQLite-backed version repository.
///
/// Borrow one connection per thread; SQLite connections are not shared
/// across writers.
pub struct SqliteNoteVersionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteVersionRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table(conn, "notes", &["id", "created_at"])?;
        ensure_table(
            conn,
            "note_versions",
            &[
                "note_id",
                "version",
                "content",
                "content_hash",
                "author_id",
                "created_at",
                "diff_strategy",
                "diffs",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl NoteVersionRepository for SqliteNoteVersionRepository<'_> {
    fn insert_version(&self, version: &NoteVersion) -> RepoResult<()> {
        let note_id = version.note_id.to_string();
        let diffs = encode_diffs(version.diffs.as_ref())?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT OR IGNORE INTO notes (id, created_at) VALUES (?1, ?2);",
            params![note_id.as_str(), version.created_at],
        )?;

        let inserted = tx.execute(
            "INSERT INTO note_versions (
                note_id,
                version,
                content,
                content_hash,
                author_id,
                created_at,
                diff_strategy,
                diffs
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                note_id.as_str(),
                version.version,
                version.content.as_str(),
                version.content_hash.as_str(),
                version.author_id.to_string(),
                version.created_at,
                version.diff_strategy.as_str(),
                diffs,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(err) if is_primary_key_violation(&err) => {
                return Err(RepoError::VersionConflict {
                    note_id: version.note_id,
                    version: version.version,
                });
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit()?;
        Ok(())
    }

    fn get_version(
        &self,
        note_id: NoteId,
        version: VersionNumber,
    ) -> RepoResult<Option<NoteVersion>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VERSION_SELECT_SQL}
             WHERE note_id = ?1
               AND version = ?2;"
        ))?;

        let mut rows = stmt.query(params![note_id.to_string(), version])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_version_row(row)?));
        }

        Ok(None)
    }

    fn latest_version(&self, note_id: NoteId) -> RepoResult<Option<NoteVersion>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VERSION_SELECT_SQL}
             WHERE note_id = ?1
             ORDER BY version DESC
             LIMIT 1;"
        ))?;

        let mut rows = stmt.query([note_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_version_row(row)?));
        }

        Ok(None)
    }

    fn list_versions(&self, note_id: NoteId) -> RepoResult<Vec<NoteVersion>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VERSION_SELECT_SQL}
             WHERE note_id = ?1
             ORDER BY version ASC;"
        ))?;

        let mut rows = stmt.query([note_id.to_string()])?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next()? {
            versions.push(parse_version_row(row)?);
        }

        Ok(versions)
    }

    fn delete_note(&self, note_id: NoteId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [note_id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound(note_id));
        }

        Ok(())
    }
}

fn parse_version_row(row: &Row<'_>) -> RepoResult<NoteVersion> {
    let note_text: String = row.get("note_id")?;
    let note_id = parse_uuid(&note_text, "note_versions.note_id")?;

    let author_text: String = row.get("author_id")?;
    let author_id = parse_uuid(&author_text, "note_versions.author_id")?;

    let strategy_text: String = row.get("diff_strategy")?;
    let diff_strategy = DiffStrategy::parse(&strategy_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "unknown diff strategy `{strategy_text}` in note_versions.diff_strategy"
        ))
    })?;

    let diffs = match row.get::<_, Option<String>>("diffs")? {
        Some(json) => Some(serde_json::from_str::<EditScript>(&json).map_err(|err| {
            RepoError::InvalidData(format!("undecodable note_versions.diffs: {err}"))
        })?),
        None => None,
    };

    let version: i64 = row.get("version")?;
    let version = VersionNumber::try_from(version).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid version `{version}` in note_versions.version"
        ))
    })?;

    Ok(NoteVersion {
        note_id,
        version,
        content: row.get("content")?,
        content_hash: row.get("content_hash")?,
        author_id,
        created_at: row.get("created_at")?,
        diff_strategy,
        diffs,
    })
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn encode_diffs(diffs: Option<&EditScript>) -> RepoResult<Option<String>> {
    diffs
        .map(|script| {
            serde_json::to_string(script)
                .map_err(|err| RepoError::InvalidData(format!("unencodable diffs: {err}")))
        })
        .transpose()
}

fn is_primary_key_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}
