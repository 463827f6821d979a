//! Markdown outline projection over normalized note text.
//!
//! # Responsibility
//! - Split a note into heading-delimited regions of hashed blocks.
//! - Report which regions differ between two revisions.
//!
//! # Invariants
//! - Lines inside fenced code blocks never start a region.
//! - Region keys are unique within one document.
//! - Block hashes use the same digest as version content hashes.

use crate::model::note_version::compute_content_hash;
use crate::text::normalize::{normalize, NormalizedText};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})(?:[ \t]+(.*))?$").expect("valid heading regex"));
static SLUG_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

const CODE_FENCE: &str = "```";

/// Key of the region holding text before the first heading.
pub const PREAMBLE_KEY: &str = "preamble";

/// Block category inside a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Code,
}

/// Contiguous non-blank lines (or one fenced code block).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
    /// SHA-256 hex digest of `text`.
    pub hash: String,
}

/// Heading plus the blocks that follow it up to the next heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    /// Slug of the heading text; `PREAMBLE_KEY` for text before the first
    /// heading.
    pub key: String,
    /// Heading depth `1..=6`, or `0` for the leading region.
    pub level: u8,
    pub heading_line: Option<String>,
    pub heading_text: String,
    pub blocks: Vec<Block>,
}

/// Outline of one normalized note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub normalized: NormalizedText,
    pub regions: Vec<Region>,
}

impl Document {
    /// Normalizes `raw` and splits it into regions.
    pub fn parse(raw: &str) -> Self {
        Self::from_normalized(normalize(raw))
    }

    /// Splits already normalized text into regions.
    pub fn from_normalized(normalized: NormalizedText) -> Self {
        let regions = build_regions(normalized.lines());
        Self {
            normalized,
            regions,
        }
    }

    /// Looks up one region by key.
    pub fn region(&self, key: &str) -> Option<&Region> {
        self.regions.iter().find(|region| region.key == key)
    }
}

/// Returns the heading level for a markdown heading line.
pub fn heading_level(line: &str) -> Option<u8> {
    HEADING_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|hashes| hashes.as_str().len() as u8)
}

/// Returns region keys whose heading or block hashes differ.
///
/// Keys present in `new` come first in `new` order; keys only present in
/// `old` follow in `old` order.
pub fn changed_sections(old: &Document, new: &Document) -> Vec<String> {
    let old_by_key: BTreeMap<&str, &Region> = old
        .regions
        .iter()
        .map(|region| (region.key.as_str(), region))
        .collect();
    let new_keys: HashSet<&str> = new.regions.iter().map(|region| region.key.as_str()).collect();

    let mut changed = Vec::new();
    for region in &new.regions {
        match old_by_key.get(region.key.as_str()) {
            Some(previous) if same_region(previous, region) => {}
            _ => changed.push(region.key.clone()),
        }
    }
    for region in &old.regions {
        if !new_keys.contains(region.key.as_str()) {
            changed.push(region.key.clone());
        }
    }
    changed
}

fn same_region(left: &Region, right: &Region) -> bool {
    left.heading_line == right.heading_line
        && left.blocks.len() == right.blocks.len()
        && left
            .blocks
            .iter()
            .zip(&right.blocks)
            .all(|(a, b)| a.hash == b.hash)
}

fn build_regions(lines: Vec<&str>) -> Vec<Region> {
    let mut regions = vec![Region {
        key: PREAMBLE_KEY.to_string(),
        level: 0,
        heading_line: None,
        heading_text: String::new(),
        blocks: Vec::new(),
    }];
    let mut used_keys: HashSet<String> = HashSet::from([PREAMBLE_KEY.to_string()]);
    let mut pending: Vec<&str> = Vec::new();
    let mut in_code = false;

    for line in lines {
        if line.trim_start().starts_with(CODE_FENCE) {
            if in_code {
                pending.push(line);
                flush_block(&mut regions, &mut pending, BlockKind::Code);
                in_code = false;
            } else {
                flush_block(&mut regions, &mut pending, BlockKind::Paragraph);
                pending.push(line);
                in_code = true;
            }
            continue;
        }

        if in_code {
            pending.push(line);
            continue;
        }

        if let Some(caps) = HEADING_RE.captures(line) {
            flush_block(&mut regions, &mut pending, BlockKind::Paragraph);
            let level = caps.get(1).map_or(0, |m| m.as_str().len()) as u8;
            let heading_text = caps
                .get(2)
                .map(|m| m.as_str().trim().trim_end_matches('#').trim_end().to_string())
                .unwrap_or_default();
            let key = unique_key(&mut used_keys, slugify(&heading_text));
            regions.push(Region {
                key,
                level,
                heading_line: Some(line.to_string()),
                heading_text,
                blocks: Vec::new(),
            });
            continue;
        }

        if line.trim().is_empty() {
            flush_block(&mut regions, &mut pending, BlockKind::Paragraph);
        } else {
            pending.push(line);
        }
    }

    // Unterminated fence still forms a code block.
    let trailing_kind = if in_code {
        BlockKind::Code
    } else {
        BlockKind::Paragraph
    };
    flush_block(&mut regions, &mut pending, trailing_kind);

    if regions[0].blocks.is_empty() && regions.len() > 1 {
        regions.remove(0);
    }
    regions
}

fn flush_block(regions: &mut [Region], pending: &mut Vec<&str>, kind: BlockKind) {
    if pending.is_empty() {
        return;
    }
    let text = pending.join("\n");
    pending.clear();
    if let Some(region) = regions.last_mut() {
        region.blocks.push(Block {
            kind,
            hash: compute_content_hash(&text),
            text,
        });
    }
}

fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    SLUG_STRIP_RE
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

fn unique_key(used: &mut HashSet<String>, base: String) -> String {
    let base = if base.is_empty() {
        "section".to_string()
    } else {
        base
    };
    let mut candidate = base.clone();
    let mut suffix = 2;
    while used.contains(&candidate) {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    used.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::{changed_sections, heading_level, BlockKind, Document, PREAMBLE_KEY};

    #[test]
    fn heading_level_requires_one_to_six_hashes() {
        assert_eq!(heading_level("# Title"), Some(1));
        assert_eq!(heading_level("###### Deep"), Some(6));
        assert_eq!(heading_level("####### Too deep"), None);
        assert_eq!(heading_level("#hashtag"), None);
    }

    #[test]
    fn parse_groups_blocks_under_headings() {
        let doc = Document::parse("intro line\n\n# Tanks\nPull left\nthen right\n\n## Heals\nCD on 3\n");
        let keys: Vec<&str> = doc.regions.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec![PREAMBLE_KEY, "tanks", "heals"]);
        assert_eq!(doc.region("tanks").unwrap().blocks[0].text, "Pull left\nthen right");
        assert_eq!(doc.region("heals").unwrap().level, 2);
    }

    #[test]
    fn parse_drops_empty_leading_region_and_dedupes_keys() {
        let doc = Document::parse("# Phase\na\n# Phase\nb\n");
        let keys: Vec<&str> = doc.regions.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["phase", "phase-2"]);
    }

    #[test]
    fn headings_inside_code_fences_are_ignored() {
        let doc = Document::parse("# Notes\n```\n# not a heading\n```\n");
        assert_eq!(doc.regions.len(), 1);
        let block = &doc.regions[0].blocks[0];
        assert_eq!(block.kind, BlockKind::Code);
        assert!(block.text.contains("# not a heading"));
    }

    #[test]
    fn changed_sections_reports_edited_added_and_removed_regions() {
        let old = Document::parse("# A\none\n# B\ntwo\n# C\nthree\n");
        let new = Document::parse("# A\none\n# B\nTWO\n# D\nfour\n");
        assert_eq!(changed_sections(&old, &new), vec!["b", "d", "c"]);
    }

    #[test]
    fn removed_preamble_is_reported_by_name() {
        let old = Document::parse("intro\n\n# A\none\n");
        let new = Document::parse("# A\none\n");
        assert_eq!(changed_sections(&old, &new), vec![PREAMBLE_KEY]);
    }

    #[test]
    fn heading_named_preamble_does_not_collide() {
        let doc = Document::parse("intro\n# Preamble\nbody\n");
        let keys: Vec<&str> = doc.regions.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["preamble", "preamble-2"]);
    }
}
