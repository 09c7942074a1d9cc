use std::{cell::RefCell, rc::Rc};

use lol_html::{RewriteStrSettings, element, html_content::Element, rewrite_str};
use tracing::debug;

use crate::application::render::types::RenderError;

use super::{
    config::{ALLOWED_URL_SCHEMES, build_message_sanitizer},
    links::{LinkContext, NavigableNode, active_link_hook},
};

/// Allow-list sanitizing followed by the link-trust hook.
pub struct SanitizerAdapter {
    context: LinkContext,
}

impl SanitizerAdapter {
    pub fn new(context: LinkContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &LinkContext {
        &self.context
    }

    pub fn sanitize(&self, html: &str) -> Result<String, RenderError> {
        let cleaned = build_message_sanitizer().clean(html).to_string();
        if !cleaned.contains("href") {
            return Ok(cleaned);
        }
        apply_link_hook(&cleaned, &self.context)
    }

    /// Clean KaTeX output produced with trusted commands enabled. `\href`,
    /// `\url` and `\includegraphics` carry author URLs: destinations outside
    /// the allowed schemes are removed and surviving links go through the
    /// link hook like any other message link.
    pub(crate) fn guard_typeset_math(&self, html: &str) -> Result<String, RenderError> {
        if !html.contains("href") && !html.contains("src") {
            return Ok(html.to_string());
        }

        let hook = active_link_hook();
        let context = &self.context;
        let error_slot: Rc<RefCell<Option<RenderError>>> = Rc::new(RefCell::new(None));

        let rewritten = rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: vec![
                    element!("[src]", |el| {
                        drop_disallowed_url(el, "src", context);
                        Ok(())
                    }),
                    element!("[href]", {
                        let error_slot = Rc::clone(&error_slot);
                        move |el| {
                            if !drop_disallowed_url(el, "href", context)
                                || error_slot.borrow().is_some()
                            {
                                return Ok(());
                            }
                            if let Err(err) = hook(el as &mut dyn NavigableNode, context) {
                                *error_slot.borrow_mut() = Some(err);
                            }
                            Ok(())
                        }
                    }),
                ],
                ..RewriteStrSettings::default()
            },
        )
        .map_err(|err| RenderError::Sanitisation {
            message: err.to_string(),
        })?;

        if let Some(err) = error_slot.borrow_mut().take() {
            return Err(err);
        }

        Ok(rewritten)
    }
}

/// Removes `attribute` unless it resolves to an allowed scheme. Returns
/// whether the attribute is still present.
fn drop_disallowed_url(el: &mut Element<'_, '_>, attribute: &str, context: &LinkContext) -> bool {
    let Some(value) = el.get_attribute(attribute) else {
        return false;
    };
    let allowed = context
        .document_url()
        .join(value.trim())
        .is_ok_and(|url| ALLOWED_URL_SCHEMES.contains(&url.scheme()));
    if !allowed {
        debug!(
            target = "chatmark::render::sanitize",
            attribute,
            value = %value,
            "removed math URL with a disallowed scheme"
        );
        el.remove_attribute(attribute);
    }
    allowed
}

fn apply_link_hook(html: &str, context: &LinkContext) -> Result<String, RenderError> {
    let hook = active_link_hook();
    let error_slot: Rc<RefCell<Option<RenderError>>> = Rc::new(RefCell::new(None));

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("a[href], area[href]", {
                let error_slot = Rc::clone(&error_slot);
                move |el| {
                    if error_slot.borrow().is_some() {
                        return Ok(());
                    }
                    if let Err(err) = hook(el as &mut dyn NavigableNode, context) {
                        *error_slot.borrow_mut() = Some(err);
                    }
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Sanitisation {
        message: err.to_string(),
    })?;

    if let Some(err) = error_slot.borrow_mut().take() {
        return Err(err);
    }

    Ok(rewritten)
}
