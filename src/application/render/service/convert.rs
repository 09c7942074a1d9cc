//! Markdown to HTML conversion for message text.
//!
//! Math spans are swapped for inert placeholders before comrak sees the text
//! and restored afterwards, so emphasis and escape rules never rewrite TeX.
//! Spans inside fenced blocks or backtick code are left for comrak. Every
//! conversion draws a fresh placeholder marker, so message text cannot forge
//! one.

use comrak::{Arena, format_html, nodes::NodeValue, parse_document};

use crate::application::render::types::{RenderConfig, RenderError};
use uuid::Uuid;

use crate::domain::{delimiters::MathDelimiter, slug::AnchorSlugger};

use super::{
    config::converter_options,
    escape::escape_html,
    highlight,
    rewrite::rewrite_ast,
    scan::{self, code_ranges},
};

const PLACEHOLDER_PREFIX: &str = "CHATMARKMATH";
const PLACEHOLDER_SUFFIX: &str = "END";

/// Converts normalized text into (unsanitized) HTML.
pub struct MarkupConverter {
    options: comrak::Options<'static>,
    enable_markdown: bool,
    header_anchors: bool,
    delimiters: Vec<MathDelimiter>,
}

impl MarkupConverter {
    pub fn new(config: &RenderConfig, delimiters: &[MathDelimiter]) -> Self {
        Self {
            options: converter_options(config),
            enable_markdown: config.enable_markdown,
            header_anchors: config.header_anchors_enabled,
            delimiters: delimiters.to_vec(),
        }
    }

    pub fn convert(&self, text: &str) -> Result<String, RenderError> {
        if !self.enable_markdown {
            return Ok(escape_html(text).into_owned());
        }

        let protected = protect_math(text, &self.delimiters);

        let arena = Arena::new();
        let root = parse_document(&arena, &protected.text, &self.options);

        let outcome = rewrite_ast(root, highlight::syntax_set(), self.header_anchors);
        let mut slugger = AnchorSlugger::new();
        for heading in outcome.headings {
            let slug = slugger.anchor_or_fallback(&protected.restore_text(&heading.text));
            let node = arena.alloc(NodeValue::HtmlInline(anchor_html(&slug)).into());
            heading.node.prepend(node);
        }

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;

        Ok(protected.restore(html))
    }
}

fn anchor_html(slug: &str) -> String {
    let slug = escape_html(slug);
    format!("<a class=\"heading-anchor\" id=\"{slug}\" href=\"#{slug}\" aria-hidden=\"true\"></a>")
}

struct ProtectedText {
    text: String,
    marker: String,
    fragments: Vec<String>,
}

impl ProtectedText {
    fn new(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
            marker: format!("{PLACEHOLDER_PREFIX}{}N", Uuid::new_v4().simple()),
            fragments: Vec::new(),
        }
    }

    fn placeholder(&self, idx: usize) -> String {
        format!("{}{idx}{PLACEHOLDER_SUFFIX}", self.marker)
    }

    /// Put the escaped math text back into rendered HTML.
    fn restore(&self, html: String) -> String {
        self.substitute(html, |fragment| escape_html(fragment).into_owned())
    }

    /// Put the raw math text back into plain text such as a heading title.
    fn restore_text(&self, text: &str) -> String {
        self.substitute(text.to_string(), str::to_string)
    }

    fn substitute(&self, input: String, render: impl Fn(&str) -> String) -> String {
        if self.fragments.is_empty() {
            return input;
        }
        self.fragments
            .iter()
            .enumerate()
            .fold(input, |acc, (idx, fragment)| {
                acc.replace(&self.placeholder(idx), &render(fragment))
            })
    }
}

fn protect_math(text: &str, delimiters: &[MathDelimiter]) -> ProtectedText {
    let mut protected = ProtectedText::new(text.len());
    if !scan::may_contain_math(text, delimiters) {
        protected.text.push_str(text);
        return protected;
    }

    let mut cursor = 0;
    for code in code_ranges(text) {
        protect_segment(&text[cursor..code.start], delimiters, &mut protected);
        protected.text.push_str(&text[code.clone()]);
        cursor = code.end;
    }
    protect_segment(&text[cursor..], delimiters, &mut protected);
    protected
}

fn protect_segment(segment: &str, delimiters: &[MathDelimiter], protected: &mut ProtectedText) {
    let mut cursor = 0;
    for span in scan::find_spans(segment, delimiters) {
        protected.text.push_str(&segment[cursor..span.outer.start]);
        let placeholder = protected.placeholder(protected.fragments.len());
        protected.text.push_str(&placeholder);
        protected
            .fragments
            .push(segment[span.outer.clone()].to_string());
        cursor = span.outer.end;
    }
    protected.text.push_str(&segment[cursor..]);
}
