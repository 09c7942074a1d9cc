use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};
use syntect::parsing::SyntaxSet;
use tracing::warn;

use super::highlight;

/// A heading that should receive an anchor once the walk is over.
pub(crate) struct HeadingAnchor<'a> {
    pub(crate) node: &'a AstNode<'a>,
    /// Inline text of the heading with whitespace runs collapsed.
    pub(crate) text: String,
}

#[derive(Default)]
pub(crate) struct RewriteOutcome<'a> {
    pub(crate) headings: Vec<HeadingAnchor<'a>>,
}

/// Replace fenced code with highlighted HTML and, when enabled, collect every
/// heading in document order.
pub(crate) fn rewrite_ast<'a>(
    root: &'a AstNode<'a>,
    syntax_set: &SyntaxSet,
    header_anchors: bool,
) -> RewriteOutcome<'a> {
    let mut walker = RewriteWalker {
        syntax_set,
        header_anchors,
        outcome: RewriteOutcome::default(),
    };
    walker.visit_nodes(root);
    walker.outcome
}

struct RewriteWalker<'s, 'a> {
    syntax_set: &'s SyntaxSet,
    header_anchors: bool,
    outcome: RewriteOutcome<'a>,
}

impl<'a> RewriteWalker<'_, 'a> {
    fn visit_nodes(&mut self, node: &'a AstNode<'a>) {
        if self.header_anchors && is_heading(node) {
            let text = collect_inline_text(node);
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            self.outcome.headings.push(HeadingAnchor { node, text });
        }

        if let Some((info, literal)) = extract_code_block(node) {
            let language = info.split_whitespace().next().map(str::to_string);
            let html = highlight::highlight_code(language.as_deref(), &literal, self.syntax_set)
                .unwrap_or_else(|err| {
                    warn!(
                        target = "chatmark::render::highlight",
                        error = %err,
                        "syntax highlighting failed; emitting plain code block"
                    );
                    highlight::plain_code_block(language.as_deref(), &literal)
                });

            let mut data = node.data.borrow_mut();
            data.value = NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal: html,
            });
        }

        let mut child = node.first_child();
        while let Some(next) = child {
            self.visit_nodes(next);
            child = next.next_sibling();
        }
    }
}

fn is_heading(node: &AstNode<'_>) -> bool {
    matches!(node.data.borrow().value, NodeValue::Heading(_))
}

fn extract_code_block(node: &AstNode<'_>) -> Option<(String, String)> {
    let data = node.data.borrow();
    if let NodeValue::CodeBlock(block) = &data.value {
        Some((block.info.trim().to_string(), block.literal.clone()))
    } else {
        None
    }
}

fn collect_inline_text(node: &AstNode<'_>) -> String {
    fn walk(node: &AstNode<'_>, buffer: &mut String) {
        {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::Text(text) => buffer.push_str(text),
                NodeValue::Code(code) => buffer.push_str(&code.literal),
                NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
                _ => {}
            }
        }
        let mut child = node.first_child();
        while let Some(next) = child {
            walk(next, buffer);
            child = next.next_sibling();
        }
    }

    let mut text = String::new();
    let mut child = node.first_child();
    while let Some(next) = child {
        walk(next, &mut text);
        child = next.next_sibling();
    }
    text
}
