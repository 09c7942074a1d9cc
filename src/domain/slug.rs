//! Deterministic anchor slugs for rendered headings.
//!
//! ASCII slugification (`slug` crate) is combined with Chinese
//! transliteration (`pinyin` crate) so a heading like “基线对齐” becomes
//! `ji-xian-dui-qi`. Uniqueness is scoped to one document: the
//! [`AnchorSlugger`] is created per conversion and discarded afterwards.

use std::collections::{HashMap, HashSet};

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

/// Base used when a heading has no representable characters.
pub const FALLBACK_ANCHOR: &str = "section";

/// Errors that can occur while generating a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
}

/// Derive a base slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let transliterated = transliterate_to_ascii(input);
    let candidate = slugify(&transliterated);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Deterministically generate unique anchor slugs within a single document.
///
/// Headings processed in order receive monotonic suffixes when duplicates
/// occur (`overview`, `overview-2`, `overview-3`). Rendering the same text
/// twice yields the same sequence.
#[derive(Default, Debug)]
pub struct AnchorSlugger {
    occurrences: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl AnchorSlugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a slug for the heading text, unique within this slugger.
    /// Headings without a usable slug share the [`FALLBACK_ANCHOR`] counter.
    pub fn anchor_or_fallback(&mut self, heading: &str) -> String {
        match derive_slug(heading) {
            Ok(base) => self.claim(base),
            Err(_) => self.claim(FALLBACK_ANCHOR.to_string()),
        }
    }

    // A literal `x-2` heading must not collide with the second `x`.
    fn claim(&mut self, base: String) -> String {
        let count = self.occurrences.entry(base.clone()).or_insert(0);
        loop {
            *count += 1;
            let candidate = if *count == 1 {
                base.clone()
            } else {
                format!("{base}-{count}")
            };
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => {
                // slugify decides what to drop.
                output.push(ch);
            }
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_transliterates_chinese() {
        let slug = derive_slug("Rust 基础教程").expect("slug");
        assert_eq!(slug, "rust-ji-chu-jiao-cheng");
    }

    #[test]
    fn derive_slug_rejects_blank_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn anchor_slugger_produces_unique_slugs() {
        let mut slugger = AnchorSlugger::new();

        let first = slugger.anchor_or_fallback("Overview");
        let second = slugger.anchor_or_fallback("Overview");
        let third = slugger.anchor_or_fallback("深入理解");

        assert_eq!(first, "overview");
        assert_eq!(second, "overview-2");
        assert_eq!(third, "shen-ru-li-jie");
    }

    #[test]
    fn unrepresentable_headings_share_fallback_counter() {
        let mut slugger = AnchorSlugger::new();

        assert_eq!(slugger.anchor_or_fallback("!!!"), "section");
        assert_eq!(slugger.anchor_or_fallback("???"), "section-2");
        assert_eq!(slugger.anchor_or_fallback("Section"), "section-3");
    }

    #[test]
    fn suffixed_heading_text_does_not_collide() {
        let mut slugger = AnchorSlugger::new();

        assert_eq!(slugger.anchor_or_fallback("Step"), "step");
        assert_eq!(slugger.anchor_or_fallback("Step 2"), "step-2");
        assert_eq!(slugger.anchor_or_fallback("Step"), "step-3");
    }
}
