//! Text canonicalization applied before any diff or hash.
//!
//! # Responsibility
//! - Collapse formatting noise (line endings, trailing blanks, missing final
//!   newline) so it never shows up as an edit.
//! - Provide the line view used by the differ.
//!
//! # Invariants
//! - `NormalizedText` is only constructed by `normalize`.
//! - `normalize(normalize(x)) == normalize(x)`.
//! - Line view and `from_lines` are inverse for every normalized text.

use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::ops::Deref;

/// Canonical note text: `\n` endings, no trailing space/tab per line, one
/// trailing newline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedText(String);

impl NormalizedText {
    /// Borrow the canonical text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the canonical text.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Returns the line sequence fed to the differ.
    ///
    /// Exactly one trailing `\n` is dropped before splitting, so `"\n"` is the
    /// empty sequence and trailing blank lines survive.
    pub fn lines(&self) -> Vec<&str> {
        split_lines(&self.0)
    }

    /// Number of lines in the line view.
    pub fn line_count(&self) -> usize {
        self.lines().len()
    }

    /// Number of UTF-8 bytes.
    pub fn byte_len(&self) -> usize {
        self.0.len()
    }
}

impl Deref for NormalizedText {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for NormalizedText {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonicalizes raw note text.
///
/// Rules, in order:
/// - `\r\n` and lone `\r` become `\n`.
/// - Trailing spaces and tabs are stripped from every line. Leading
///   whitespace and blank lines are kept.
/// - A final `\n` is appended when missing.
pub fn normalize(raw: &str) -> NormalizedText {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len() + 1);
    for (idx, line) in unified.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(line.trim_end_matches([' ', '\t']));
    }

    if !out.ends_with('\n') {
        out.push('\n');
    }

    NormalizedText(out)
}

/// Splits canonical text into its line view.
///
/// Accepts any `&str` so stored (possibly legacy) content can be viewed the
/// same way as a fresh `NormalizedText`.
pub fn split_lines(text: &str) -> Vec<&str> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    if body.is_empty() {
        return Vec::new();
    }
    body.split('\n').collect()
}

/// Rebuilds canonical text from a line view.
pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut out = String::new();
    for (idx, line) in lines.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(line.as_ref());
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::{from_lines, normalize, split_lines};

    #[test]
    fn normalize_converts_crlf_and_strips_trailing_blanks() {
        assert_eq!(normalize("a \r\nb\r\n").as_str(), "a\nb\n");
    }

    #[test]
    fn normalize_handles_lone_carriage_returns() {
        assert_eq!(normalize("one\rtwo\r\rthree").as_str(), "one\ntwo\n\nthree\n");
    }

    #[test]
    fn normalize_keeps_leading_whitespace_and_blank_lines() {
        assert_eq!(
            normalize("  indented\t\n\n\tcode  \n").as_str(),
            "  indented\n\n\tcode\n"
        );
    }

    #[test]
    fn normalize_empty_input_is_single_newline() {
        assert_eq!(normalize("").as_str(), "\n");
        assert!(normalize("").lines().is_empty());
    }

    #[test]
    fn line_view_preserves_trailing_blank_lines() {
        let text = normalize("a\n\n");
        assert_eq!(text.lines(), vec!["a", ""]);
        assert_eq!(from_lines(&text.lines()), text.as_str());
    }

    #[test]
    fn split_lines_of_blank_only_text() {
        assert_eq!(split_lines("\n\n"), vec!["", ""]);
        assert_eq!(from_lines(&split_lines("\n\n")), "\n\n");
    }
}
