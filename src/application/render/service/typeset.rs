//! Math typesetting over a committed surface.
//!
//! The surface HTML is streamed through `lol_html`. Text nodes are buffered
//! until their last chunk arrives, decoded, scanned for delimiter spans and
//! written back as HTML. Text inside code, raw-text elements and previously
//! typeset output is skipped by tracking how many such elements are open.
//! With trusted commands enabled, each KaTeX fragment is cleaned by the
//! sanitizer before it is spliced in.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use lol_html::{
    EndTagHandler, RewriteStrSettings, doc_text, element, html_content::ContentType, rewrite_str,
};
use metrics::counter;
use tracing::warn;

use crate::application::render::{
    surface::RenderedSurface,
    types::{MathOptions, RenderError, TypesetReport, TypesetResult, UnparseableFallback},
};
use crate::domain::delimiters::MathDelimiter;

use super::{
    escape::{decode_entities, escape_html},
    links::LinkContext,
    math::typeset_expression,
    sanitize::SanitizerAdapter,
    scan,
};

const METRIC_MATH_TYPESET: &str = "chatmark_math_typeset_total";
const METRIC_MATH_UNPARSEABLE: &str = "chatmark_math_unparseable_total";

const SKIPPED_SUBTREES: &str = "script, style, textarea, pre, code, .katex, .katex-display, .math-error, [data-math-rendered]";

/// Typeset a surface on its own. Trusted math links resolve against the
/// default [`LinkContext`].
pub fn typeset_surface(
    surface: &mut RenderedSurface,
    delimiters: &[MathDelimiter],
    options: &MathOptions,
) -> Result<TypesetReport, RenderError> {
    let guard = SanitizerAdapter::new(LinkContext::default());
    typeset_surface_guarded(surface, delimiters, options, Some(&guard))
}

/// `guard` cleans trusted KaTeX output; `None` leaves it as emitted, which is
/// only right when the whole message is trusted.
pub(crate) fn typeset_surface_guarded(
    surface: &mut RenderedSurface,
    delimiters: &[MathDelimiter],
    options: &MathOptions,
    guard: Option<&SanitizerAdapter>,
) -> Result<TypesetReport, RenderError> {
    if surface.is_empty() || !delimiters.iter().any(MathDelimiter::is_usable) {
        return Ok(TypesetReport::default());
    }
    if !scan::may_contain_math(&decode_entities(surface.html()), delimiters) {
        return Ok(TypesetReport::default());
    }

    let skip_depth = Rc::new(Cell::new(0usize));
    let buffer = RefCell::new(String::new());
    let report = RefCell::new(TypesetReport::default());
    let error_slot: RefCell<Option<RenderError>> = RefCell::new(None);

    let rewritten = rewrite_str(
        surface.html(),
        RewriteStrSettings {
            element_content_handlers: vec![element!(SKIPPED_SUBTREES, {
                let skip_depth = Rc::clone(&skip_depth);
                move |el| {
                    if let Some(handlers) = el.end_tag_handlers() {
                        skip_depth.set(skip_depth.get() + 1);
                        let skip_depth = Rc::clone(&skip_depth);
                        let handler: EndTagHandler<'static> = Box::new(move |_end| {
                            skip_depth.set(skip_depth.get().saturating_sub(1));
                            Ok(())
                        });
                        handlers.push(handler);
                    }
                    Ok(())
                }
            })],
            document_content_handlers: vec![doc_text!(|chunk| {
                if skip_depth.get() > 0 || error_slot.borrow().is_some() {
                    return Ok(());
                }

                let mut pending = buffer.borrow_mut();
                pending.push_str(chunk.as_str());
                if !chunk.last_in_text_node() {
                    chunk.remove();
                    return Ok(());
                }

                let raw = std::mem::take(&mut *pending);
                match typeset_text(&raw, delimiters, options, guard, &mut report.borrow_mut()) {
                    Ok(Some(html)) => chunk.replace(&html, ContentType::Html),
                    Ok(None) => chunk.replace(&raw, ContentType::Html),
                    Err(err) => {
                        chunk.replace(&raw, ContentType::Html);
                        *error_slot.borrow_mut() = Some(err);
                    }
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Document {
        message: err.to_string(),
    })?;

    if let Some(err) = error_slot.borrow_mut().take() {
        return Err(err);
    }

    let report = report.into_inner();
    if report.typeset > 0 || report.unparseable > 0 {
        surface.replace_typeset(rewritten);
    }
    Ok(report)
}

/// Typeset every span in one decoded text node. `None` means the node holds no
/// math and should be written back unchanged.
fn typeset_text(
    raw: &str,
    delimiters: &[MathDelimiter],
    options: &MathOptions,
    guard: Option<&SanitizerAdapter>,
    report: &mut TypesetReport,
) -> Result<Option<String>, RenderError> {
    let text = decode_entities(raw);
    let spans = scan::find_spans(&text, delimiters);
    if spans.is_empty() {
        return Ok(None);
    }

    let mut html = String::with_capacity(text.len() * 4);
    let mut cursor = 0;
    for span in spans {
        html.push_str(&escape_html(&text[cursor..span.outer.start]));
        cursor = span.outer.end;

        let expression = &text[span.inner.clone()];
        let literal = &text[span.outer.clone()];
        match typeset_expression(expression, span.display, options)? {
            TypesetResult::Typeset(markup) => {
                let markup = match guard {
                    Some(guard) if options.trust => guard.guard_typeset_math(&markup)?,
                    _ => markup,
                };
                report.typeset = report.typeset.saturating_add(1);
                counter!(METRIC_MATH_TYPESET).increment(1);
                let mode = if span.display { "display" } else { "inline" };
                html.push_str("<span data-math-rendered=\"");
                html.push_str(mode);
                html.push_str("\">");
                html.push_str(&markup);
                html.push_str("</span>");
            }
            TypesetResult::Unparseable { source, reason } => {
                report.unparseable = report.unparseable.saturating_add(1);
                counter!(METRIC_MATH_UNPARSEABLE).increment(1);
                warn!(
                    target = "chatmark::render::math",
                    expression = %source,
                    reason = %reason,
                    "math expression could not be typeset"
                );
                if options.throw_on_error {
                    return Err(RenderError::Math {
                        message: format!("`{source}`: {reason}"),
                    });
                }
                push_fallback(&mut html, literal, &reason, options.fallback);
            }
        }
    }
    html.push_str(&escape_html(&text[cursor..]));

    Ok(Some(html))
}

fn push_fallback(html: &mut String, literal: &str, reason: &str, fallback: UnparseableFallback) {
    match fallback {
        UnparseableFallback::Literal => html.push_str(&escape_html(literal)),
        UnparseableFallback::Marker => {
            html.push_str("<span class=\"math-error\" title=\"");
            html.push_str(&escape_html(reason));
            html.push_str("\">");
            html.push_str(&escape_html(literal));
            html.push_str("</span>");
        }
    }
}
