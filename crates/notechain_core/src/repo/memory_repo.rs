//! In-process version repository.
//!
//! # Responsibility
//! - Provide a dependency-free store with the same conditional-insert
//!   semantics as SQLite, for tests and embedded hosts.
//!
//! # Invariants
//! - The existence check and the insert happen under one lock.
//! - A poisoned lock surfaces as `RepoError::StorePoisoned`.

use crate::model::note_version::{NoteId, NoteVersion, VersionNumber};
use crate::repo::note_version_repo::{NoteVersionRepository, RepoError, RepoResult};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

type Chains = HashMap<NoteId, BTreeMap<VersionNumber, NoteVersion>>;

/// Thread-safe in-memory version store.
#[derive(Debug, Default)]
pub struct InMemoryNoteVersionRepository {
    chains: Mutex<Chains>,
}

impl InMemoryNoteVersionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of versions stored across all notes.
    pub fn total_versions(&self) -> RepoResult<usize> {
        Ok(self.lock()?.values().map(BTreeMap::len).sum())
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Chains>> {
        self.chains.lock().map_err(|_| RepoError::StorePoisoned)
    }
}

impl NoteVersionRepository for InMemoryNoteVersionRepository {
    fn insert_version(&self, version: &NoteVersion) -> RepoResult<()> {
        let mut chains = self.lock()?;
        let chain = chains.entry(version.note_id).or_default();
        match chain.entry(version.version) {
            Entry::Occupied(_) => Err(RepoError::VersionConflict {
                note_id: version.note_id,
                version: version.version,
            }),
            Entry::Vacant(slot) => {
                slot.insert(version.clone());
                Ok(())
            }
        }
    }

    fn get_version(
        &self,
        note_id: NoteId,
        version: VersionNumber,
    ) -> RepoResult<Option<NoteVersion>> {
        Ok(self
            .lock()?
            .get(&note_id)
            .and_then(|chain| chain.get(&version))
            .cloned())
    }

    fn latest_version(&self, note_id: NoteId) -> RepoResult<Option<NoteVersion>> {
        Ok(self
            .lock()?
            .get(&note_id)
            .and_then(|chain| chain.values().next_back())
            .cloned())
    }

    fn list_versions(&self, note_id: NoteId) -> RepoResult<Vec<NoteVersion>> {
        Ok(self
            .lock()?
            .get(&note_id)
            .map(|chain| chain.values().cloned().collect())
            .unwrap_or_default())
    }

    fn delete_note(&self, note_id: NoteId) -> RepoResult<()> {
        match self.lock()?.remove(&note_id) {
            Some(chain) if !chain.is_empty() => Ok(()),
            _ => Err(RepoError::NotFound(note_id)),
        }
    }
}
