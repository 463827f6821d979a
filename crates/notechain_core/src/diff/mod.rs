//! Line diff engine.
//!
//! # Responsibility
//! - Produce deterministic edit scripts persisted with each note version.
//!
//! # Invariants
//! - Diffing is pure and never fails; size limits are enforced by callers.

pub mod lcs;

pub use lcs::{
    apply_script, diff_lines, diff_texts, ApplyError, DiffOp, DiffTag, EditScript, ScriptStats,
};
