//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate normalization, diffing and repository calls into the
//!   version chain and note view APIs.
//! - Keep callers decoupled from storage details.

pub mod note_view;
pub mod version_chain;
