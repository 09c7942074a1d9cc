mod config;
mod convert;
mod escape;
mod highlight;
mod links;
mod math;
mod normalize;
mod rewrite;
mod sanitize;
mod scan;
mod typeset;

pub use convert::MarkupConverter;
pub use highlight::{theme_names, theme_stylesheet};
pub use links::{
    LinkContext, LinkHook, NavigableNode, active_link_hook, harden_external_link,
    register_link_hook,
};
pub use normalize::normalize_source;
pub use sanitize::SanitizerAdapter;
pub use typeset::typeset_surface;
pub(crate) use typeset::typeset_surface_guarded;
