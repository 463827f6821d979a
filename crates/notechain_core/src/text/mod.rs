//! Text canonicalization and markdown structure helpers.
//!
//! # Responsibility
//! - Make note text comparable before it is hashed or diffed.
//! - Project notes into heading regions for section-level change reports.

pub mod normalize;
pub mod outline;
