use super::types::{Generation, Markup, PipelineId};

/// The output region after Phase A markup has been committed to it.
///
/// A surface only exists once something was committed, which is what lets the
/// math pass require a realized surface by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSurface {
    html: String,
    generation: Generation,
    pipeline: Option<PipelineId>,
    typeset_generation: Option<Generation>,
}

impl RenderedSurface {
    pub fn commit(markup: &Markup) -> Self {
        Self {
            html: markup.html.clone(),
            generation: markup.generation,
            pipeline: markup.pipeline,
            typeset_generation: None,
        }
    }

    /// Replace the surface content with newer markup, dropping the typeset mark.
    pub fn recommit(&mut self, markup: &Markup) {
        *self = Self::commit(markup);
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn pipeline(&self) -> Option<PipelineId> {
        self.pipeline
    }

    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty()
    }

    pub fn is_typeset(&self) -> bool {
        self.typeset_generation == Some(self.generation)
    }

    pub(crate) fn replace_typeset(&mut self, html: String) {
        self.html = html;
        self.typeset_generation = Some(self.generation);
    }
}
