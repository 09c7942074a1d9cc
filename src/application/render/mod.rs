//! Message rendering.
//!
//! Phase A converts source text to sanitized markup and is pure apart from the
//! pipeline's generation counter. Phase B typesets math on a surface the host
//! has already committed. Both report failures as [`RenderError`].

mod pipeline;
mod service;
mod surface;
mod types;

pub use pipeline::{RenderPipeline, after_surface_update, render};
pub use service::{
    LinkContext, LinkHook, MarkupConverter, NavigableNode, SanitizerAdapter, active_link_hook,
    harden_external_link, normalize_source, register_link_hook, theme_names, theme_stylesheet,
    typeset_surface,
};
pub use surface::RenderedSurface;
pub use types::{
    Generation, LinkVerdict, Markup, MathOptions, PassOutcome, PipelineId, RenderConfig, RenderConfigError,
    RenderError, TypesetReport, TypesetResult, UnparseableFallback,
};
