//! Domain model for versioned notes.
//!
//! # Responsibility
//! - Define the records owned by a note's version chain.
//!
//! # Invariants
//! - A note has no state of its own; everything lives in its versions.
//! - Version records are immutable once stored.

pub mod note_version;
