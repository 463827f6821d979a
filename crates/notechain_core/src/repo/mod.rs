//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage contract consumed by the version chain.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Conditional insert is the only coordination primitive; there is no
//!   chain-wide lock.
//! - Repository APIs return typed semantic errors (`NotFound`,
//!   `VersionConflict`) in addition to transport errors.

pub mod memory_repo;
pub mod note_version_repo;
