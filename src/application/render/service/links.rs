//! Link-trust hook applied to every navigable node that survives sanitizing.
//!
//! The hook is a plain function pointer held in a process-wide cell. It carries
//! no state of its own; the document URL it needs arrives through
//! [`LinkContext`] on every call, so any number of pipelines can share it.

use std::collections::BTreeSet;

use lol_html::html_content::Element;
use metrics::counter;
use once_cell::sync::OnceCell;
use tracing::debug;
use url::Url;

use crate::application::render::types::{LinkVerdict, RenderConfigError, RenderError};

const METRIC_LINKS_HARDENED: &str = "chatmark_links_hardened_total";
const REQUIRED_REL: [&str; 2] = ["noopener", "noreferrer"];

/// An element the hook can inspect and annotate.
pub trait NavigableNode {
    fn attribute(&self, name: &str) -> Option<String>;
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), RenderError>;
}

impl NavigableNode for Element<'_, '_> {
    fn attribute(&self, name: &str) -> Option<String> {
        self.get_attribute(name)
    }

    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), RenderError> {
        Element::set_attribute(self, name, value).map_err(|err| RenderError::Sanitisation {
            message: format!("failed to set `{name}`: {err}"),
        })
    }
}

/// Where the rendered document lives; relative links resolve against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkContext {
    document_url: Url,
}

impl LinkContext {
    pub fn new(document_url: Url) -> Self {
        Self { document_url }
    }

    pub fn parse(document_url: &str) -> Result<Self, url::ParseError> {
        Url::parse(document_url).map(Self::new)
    }

    pub fn document_url(&self) -> &Url {
        &self.document_url
    }
}

impl Default for LinkContext {
    fn default() -> Self {
        Self {
            document_url: Url::parse("http://localhost/").expect("static URL is valid"),
        }
    }
}

pub type LinkHook = fn(&mut dyn NavigableNode, &LinkContext) -> Result<LinkVerdict, RenderError>;

static LINK_HOOK: OnceCell<LinkHook> = OnceCell::new();

/// Install a replacement hook. Only the first registration in a process wins.
pub fn register_link_hook(hook: LinkHook) -> Result<(), RenderConfigError> {
    LINK_HOOK
        .set(hook)
        .map_err(|_| RenderConfigError::AlreadyConfigured)
}

/// The registered hook, or [`harden_external_link`] when none was registered.
pub fn active_link_hook() -> LinkHook {
    LINK_HOOK.get().copied().unwrap_or(harden_external_link)
}

/// Open cross-origin destinations in a new browsing context without an
/// opener handle or referrer.
pub fn harden_external_link(
    node: &mut dyn NavigableNode,
    context: &LinkContext,
) -> Result<LinkVerdict, RenderError> {
    let Some(href) = node.attribute("href") else {
        return Ok(LinkVerdict::Unresolvable);
    };

    let resolved = match context.document_url.join(href.trim()) {
        Ok(url) => url,
        Err(err) => {
            debug!(
                target = "chatmark::render::links",
                href = %href,
                error = %err,
                "link destination could not be resolved"
            );
            return Ok(LinkVerdict::Unresolvable);
        }
    };

    if resolved.origin() == context.document_url.origin() {
        return Ok(LinkVerdict::SameOrigin);
    }

    let rel = node.attribute("rel");
    let opens_blank = node.attribute("target").as_deref() == Some("_blank");
    if opens_blank && has_required_rel(rel.as_deref()) {
        return Ok(LinkVerdict::AlreadyHardened);
    }

    node.set_attribute("target", "_blank")?;
    node.set_attribute("rel", &merge_rel(rel, &REQUIRED_REL))?;
    counter!(METRIC_LINKS_HARDENED).increment(1);

    Ok(LinkVerdict::Hardened)
}

fn has_required_rel(rel: Option<&str>) -> bool {
    let tokens: BTreeSet<&str> = rel.unwrap_or_default().split_whitespace().collect();
    REQUIRED_REL.iter().all(|token| tokens.contains(token))
}

fn merge_rel(existing: Option<String>, required: &[&str]) -> String {
    let mut tokens: BTreeSet<String> = existing
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    for &token in required {
        tokens.insert(token.to_string());
    }
    tokens.into_iter().collect::<Vec<_>>().join(" ")
}
