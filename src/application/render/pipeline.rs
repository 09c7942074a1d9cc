//! Two-phase render orchestration.
//!
//! Phase A ([`RenderPipeline::update`]) turns source text into sanitized markup
//! and stamps it with a new generation. The host commits that markup to a
//! [`RenderedSurface`] and then runs Phase B ([`RenderPipeline::on_committed`]),
//! which typesets math only if no newer Phase A has happened since. Markup is
//! stamped with the pipeline's identity too, so a surface committed from
//! another pipeline is never mistaken for current output.

use metrics::counter;
use tracing::{debug, warn};

use crate::domain::delimiters::MathDelimiter;

use super::{
    service::{
        LinkContext, MarkupConverter, SanitizerAdapter, normalize_source, typeset_surface,
        typeset_surface_guarded,
    },
    surface::RenderedSurface,
    types::{
        Generation, Markup, MathOptions, PassOutcome, PipelineId, RenderConfig, RenderError,
        TypesetReport,
    },
};

const METRIC_RENDER: &str = "chatmark_render_total";
const METRIC_RENDER_FAILED: &str = "chatmark_render_failed_total";
const METRIC_TYPESET_SUPERSEDED: &str = "chatmark_typeset_superseded_total";

pub struct RenderPipeline {
    id: PipelineId,
    config: RenderConfig,
    delimiters: Vec<MathDelimiter>,
    math: MathOptions,
    converter: MarkupConverter,
    sanitizer: SanitizerAdapter,
    generation: Generation,
    latest: Markup,
}

impl RenderPipeline {
    pub fn new(
        config: RenderConfig,
        delimiters: Vec<MathDelimiter>,
        math: MathOptions,
        links: LinkContext,
    ) -> Self {
        let converter = MarkupConverter::new(&config, &delimiters);
        let id = PipelineId::new();
        Self {
            id,
            config,
            delimiters,
            math,
            converter,
            sanitizer: SanitizerAdapter::new(links),
            generation: Generation::default(),
            latest: Markup {
                html: String::new(),
                generation: Generation::default(),
                pipeline: Some(id),
            },
        }
    }

    /// Phase A. On failure the latest markup is emptied before the error is
    /// returned, so nothing half-processed can be committed.
    pub fn update(&mut self, source: &str) -> Result<Markup, RenderError> {
        self.generation = self.generation.next();
        counter!(METRIC_RENDER).increment(1);

        match self.produce(source) {
            Ok(html) => {
                self.latest = Markup {
                    html,
                    generation: self.generation,
                    pipeline: Some(self.id),
                };
                Ok(self.latest.clone())
            }
            Err(err) => {
                counter!(METRIC_RENDER_FAILED).increment(1);
                warn!(
                    target = "chatmark::render::pipeline",
                    generation = %self.generation,
                    error = %err,
                    "render failed; markup cleared"
                );
                self.latest = Markup {
                    html: String::new(),
                    generation: self.generation,
                    pipeline: Some(self.id),
                };
                Err(err)
            }
        }
    }

    fn produce(&self, source: &str) -> Result<String, RenderError> {
        if source.trim().is_empty() {
            return Ok(String::new());
        }

        let normalized = normalize_source(source, &self.delimiters);
        let html = self.converter.convert(&normalized)?;
        if self.config.enable_sanitize {
            self.sanitizer.sanitize(&html)
        } else {
            Ok(html)
        }
    }

    /// Phase B, run by the host after committing markup from [`Self::update`].
    pub fn on_committed(&self, surface: &mut RenderedSurface) -> Result<PassOutcome, RenderError> {
        if surface.pipeline() != Some(self.id) {
            debug!(
                target = "chatmark::render::pipeline",
                pipeline = %self.id,
                "math pass skipped for a surface from another pipeline"
            );
            return Ok(PassOutcome::Foreign);
        }
        if surface.generation() != self.generation {
            counter!(METRIC_TYPESET_SUPERSEDED).increment(1);
            debug!(
                target = "chatmark::render::pipeline",
                surface = %surface.generation(),
                latest = %self.generation,
                "math pass superseded by a newer render"
            );
            return Ok(PassOutcome::Superseded {
                surface: surface.generation(),
                latest: self.generation,
            });
        }
        if surface.is_typeset() {
            return Ok(PassOutcome::AlreadyTypeset);
        }
        if surface.is_empty() || self.delimiters.is_empty() {
            return Ok(PassOutcome::Skipped);
        }

        let guard = self.config.enable_sanitize.then_some(&self.sanitizer);
        typeset_surface_guarded(surface, &self.delimiters, &self.math, guard)
            .map(PassOutcome::Typeset)
    }

    pub fn id(&self) -> PipelineId {
        self.id
    }

    pub fn latest_markup(&self) -> &Markup {
        &self.latest
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

/// One-shot Phase A with the default link context.
pub fn render(
    source: &str,
    config: &RenderConfig,
    delimiters: &[MathDelimiter],
) -> Result<String, RenderError> {
    let mut pipeline = RenderPipeline::new(
        *config,
        delimiters.to_vec(),
        MathOptions::default(),
        LinkContext::default(),
    );
    pipeline.update(source).map(|markup| markup.html)
}

/// One-shot Phase B with default math options.
pub fn after_surface_update(
    surface: &mut RenderedSurface,
    delimiters: &[MathDelimiter],
) -> Result<TypesetReport, RenderError> {
    typeset_surface(surface, delimiters, &MathOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::delimiters::default_delimiters;

    fn pipeline() -> RenderPipeline {
        RenderPipeline::new(
            RenderConfig::default(),
            default_delimiters(),
            MathOptions::default(),
            LinkContext::default(),
        )
    }

    #[test]
    fn update_bumps_generation_and_stores_markup() {
        let mut pipeline = pipeline();
        let first = pipeline.update("one").expect("render");
        let second = pipeline.update("two").expect("render");

        assert_eq!(first.generation, Generation(1));
        assert_eq!(second.generation, Generation(2));
        assert_eq!(pipeline.latest_markup(), &second);
    }

    #[test]
    fn blank_source_yields_empty_markup() {
        let mut pipeline = pipeline();
        let markup = pipeline.update("  \n\t ").expect("render");
        assert!(markup.is_empty());

        let mut surface = RenderedSurface::commit(&markup);
        assert_eq!(
            pipeline.on_committed(&mut surface).expect("phase b"),
            PassOutcome::Skipped
        );
    }

    #[test]
    fn stale_surface_is_left_untouched() {
        let mut pipeline = pipeline();
        let old = pipeline.update("$x$").expect("render");
        let mut surface = RenderedSurface::commit(&old);
        pipeline.update("$y$").expect("render");

        let outcome = pipeline.on_committed(&mut surface).expect("phase b");
        assert_eq!(
            outcome,
            PassOutcome::Superseded {
                surface: Generation(1),
                latest: Generation(2),
            }
        );
        assert_eq!(surface.html(), old.html);
    }

    #[test]
    fn second_phase_b_is_a_no_op() {
        let mut pipeline = pipeline();
        let markup = pipeline.update("$x$").expect("render");
        let mut surface = RenderedSurface::commit(&markup);

        let first = pipeline.on_committed(&mut surface).expect("phase b");
        assert!(matches!(first, PassOutcome::Typeset(report) if report.typeset == 1));
        let html = surface.html().to_string();

        assert_eq!(
            pipeline.on_committed(&mut surface).expect("phase b"),
            PassOutcome::AlreadyTypeset
        );
        assert_eq!(surface.html(), html);
    }

    #[test]
    fn no_delimiters_skips_math() {
        let mut pipeline = RenderPipeline::new(
            RenderConfig::default(),
            Vec::new(),
            MathOptions::default(),
            LinkContext::default(),
        );
        let markup = pipeline.update("$x$").expect("render");
        let mut surface = RenderedSurface::commit(&markup);

        assert_eq!(
            pipeline.on_committed(&mut surface).expect("phase b"),
            PassOutcome::Skipped
        );
        assert_eq!(surface.html().trim_end(), "<p>$x$</p>");
    }

    #[test]
    fn sanitize_off_trusts_source() {
        let config = RenderConfig {
            enable_sanitize: false,
            ..RenderConfig::default()
        };
        let html = render("<b onclick=\"x\">hi</b>", &config, &[]).expect("render");
        assert!(html.contains("onclick"));
    }

    #[test]
    fn one_shot_helpers_compose() {
        let html = render("$a$", &RenderConfig::default(), &default_delimiters()).expect("render");
        let mut surface = RenderedSurface::commit(&Markup {
            html,
            generation: Generation(1),
            pipeline: None,
        });

        let report = after_surface_update(&mut surface, &default_delimiters()).expect("phase b");
        assert_eq!(report.typeset, 1);
    }

    #[test]
    fn surface_from_another_pipeline_is_foreign() {
        let mut first = pipeline();
        let mut second = pipeline();
        let markup = first.update("$x$").expect("render");
        second.update("$y$").expect("render");

        let mut surface = RenderedSurface::commit(&markup);
        assert_eq!(
            second.on_committed(&mut surface).expect("phase b"),
            PassOutcome::Foreign
        );
        assert_eq!(surface.html(), markup.html);
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn trusted_math_links_are_hardened_against_document() {
        let mut pipeline = RenderPipeline::new(
            RenderConfig::default(),
            default_delimiters(),
            MathOptions {
                trust: true,
                ..MathOptions::default()
            },
            LinkContext::parse("https://chat.example.com/").expect("url"),
        );
        let markup = pipeline
            .update(r"$\href{javascript:alert(1)}{x}$ and $\href{https://evil.example.net/}{y}$ and $\href{/rooms/2}{z}$")
            .expect("render");
        let mut surface = RenderedSurface::commit(&markup);
        pipeline.on_committed(&mut surface).expect("phase b");

        let html = surface.html();
        assert!(!html.contains("javascript:"));
        assert!(html.contains(r#"href="https://evil.example.net/""#));
        assert!(html.contains(r#"target="_blank""#));
        assert!(html.contains(r#"rel="noopener noreferrer""#));
        assert!(html.contains(r#"href="/rooms/2""#));
        assert_eq!(html.matches("target=").count(), 1);
    }
}
