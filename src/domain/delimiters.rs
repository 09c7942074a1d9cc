//! Math delimiter model.

use serde::Deserialize;

/// A left/right token pair marking a math expression in source text.
///
/// Sequences of delimiters are ordered: when several left tokens match at
/// the same position, the earliest entry wins. `left == right` is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MathDelimiter {
    pub left: String,
    pub right: String,
    #[serde(default)]
    pub display: bool,
}

impl MathDelimiter {
    pub fn new(left: impl Into<String>, right: impl Into<String>, display: bool) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            display,
        }
    }

    pub fn inline(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::new(left, right, false)
    }

    pub fn display(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::new(left, right, true)
    }

    /// Delimiters with an empty side never match.
    pub fn is_usable(&self) -> bool {
        !self.left.is_empty() && !self.right.is_empty()
    }
}

/// `$$…$$` and `\[…\]` as display math, `$…$` and `\(…\)` inline.
/// `$$` precedes `$` so double dollars are never read as two inline fences.
pub fn default_delimiters() -> Vec<MathDelimiter> {
    vec![
        MathDelimiter::display("$$", "$$"),
        MathDelimiter::inline("$", "$"),
        MathDelimiter::inline("\\(", "\\)"),
        MathDelimiter::display("\\[", "\\]"),
    ]
}
