use thiserror::Error;
use uuid::Uuid;

/// Toggles that shape one render pipeline. Changing any of them means
/// building a new pipeline, since the converter is configured from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    /// Interpret Markdown; when off the source is shown as escaped literal text.
    pub enable_markdown: bool,
    /// Run the sanitizer and link hardening. Turning this off trusts the source fully.
    pub enable_sanitize: bool,
    /// Render every single newline as `<br />`.
    pub line_breaks_as_newlines: bool,
    /// Prefix headings with a linkable anchor.
    pub header_anchors_enabled: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enable_markdown: true,
            enable_sanitize: true,
            line_breaks_as_newlines: false,
            header_anchors_enabled: false,
        }
    }
}

/// What to emit for a math span the engine cannot parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnparseableFallback {
    /// Leave the span as visible literal text, delimiters included.
    #[default]
    Literal,
    /// Wrap the literal text in `<span class="math-error">` carrying the reason.
    Marker,
}

/// Options for the math typesetting pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathOptions {
    /// Abort the pass on the first unparseable span instead of falling back.
    pub throw_on_error: bool,
    pub fallback: UnparseableFallback,
    /// Allow KaTeX commands such as `\href` and `\url`.
    pub trust: bool,
    /// Macro definitions handed to KaTeX, e.g. `("\\RR", "\\mathbb{R}")`.
    pub macros: Vec<(String, String)>,
}

impl Default for MathOptions {
    fn default() -> Self {
        Self {
            throw_on_error: false,
            fallback: UnparseableFallback::Literal,
            trust: false,
            macros: Vec::new(),
        }
    }
}

/// Monotonic render counter of one pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one pipeline instance. Generations are only comparable
/// between markup of the same pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(Uuid);

impl PipelineId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for PipelineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Output of Phase A: sanitized markup stamped with the generation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup {
    pub html: String,
    pub generation: Generation,
    /// The pipeline that produced the markup; `None` outside a pipeline.
    pub pipeline: Option<PipelineId>,
}

impl Markup {
    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

/// Result of handing one expression to the math engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypesetResult {
    Typeset(String),
    Unparseable { source: String, reason: String },
}

/// Counts reported by one math pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypesetReport {
    pub typeset: u32,
    pub unparseable: u32,
}

/// What Phase B did with a committed surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Typeset(TypesetReport),
    /// The surface holds no content or no delimiters are configured.
    Skipped,
    /// The surface was already typeset for its generation.
    AlreadyTypeset,
    /// A newer Phase A ran after this surface was committed.
    Superseded { surface: Generation, latest: Generation },
    /// The surface holds markup from a different pipeline.
    Foreign,
}

/// What the link hook decided for one navigable node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkVerdict {
    /// Same origin as the document; left as is.
    SameOrigin,
    /// The destination could not be resolved; treated as not external.
    Unresolvable,
    /// Cross-origin and newly given `target`/`rel`.
    Hardened,
    /// Cross-origin and already carrying the required attributes.
    AlreadyHardened,
}

/// Structured errors surfaced by the rendering pipeline.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markdown conversion failed: {message}")]
    Markdown { message: String },
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
    #[error("sanitisation failed: {message}")]
    Sanitisation { message: String },
    #[error("math typesetting failed: {message}")]
    Math { message: String },
    #[error("document processing failed: {message}")]
    Document { message: String },
    #[error("unknown highlighting theme `{name}`")]
    Theme { name: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderConfigError {
    #[error("link hook already registered")]
    AlreadyConfigured,
}
