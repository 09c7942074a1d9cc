use std::thread;

use chatmark::application::render::{
    Generation, LinkContext, MathOptions, PassOutcome, RenderConfig, RenderPipeline,
    RenderedSurface, after_surface_update, render,
};
use chatmark::domain::delimiters::default_delimiters;

fn pipeline(config: RenderConfig) -> RenderPipeline {
    RenderPipeline::new(
        config,
        default_delimiters(),
        MathOptions::default(),
        LinkContext::parse("https://chat.example.com/rooms/1").expect("document url"),
    )
}

fn render_and_typeset(pipeline: &mut RenderPipeline, source: &str) -> RenderedSurface {
    let markup = pipeline.update(source).expect("phase a");
    let mut surface = RenderedSurface::commit(&markup);
    pipeline.on_committed(&mut surface).expect("phase b");
    surface
}

fn decode_text(html: &str) -> String {
    html.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[test]
fn chat_fixture_renders_every_feature() {
    let mut pipeline = pipeline(RenderConfig {
        header_anchors_enabled: true,
        ..RenderConfig::default()
    });
    let surface = render_and_typeset(&mut pipeline, include_str!("fixtures/chat_message.md"));
    let html = surface.html();

    assert!(html.contains(r##"<a class="heading-anchor" id="release-notes" href="#release-notes" aria-hidden="true"></a>Release notes"##));
    assert!(html.contains("<del>next week</del>"));
    assert!(html.contains("<table>"));
    assert!(html.contains(r#"type="checkbox""#));
    assert!(html.contains(
        r#"<a href="https://issues.example.org/42" target="_blank" rel="noopener noreferrer">the tracker</a>"#
    ));
    assert!(html.contains(r#"<a href="/docs/render">our docs</a>"#));
    assert!(html.contains(r#"data-math-rendered="inline""#));
    assert!(html.contains(r#"data-math-rendered="display""#));
    assert!(html.contains(r#"<pre class="syntax-highlight" data-language="rust">"#));
    assert!(html.contains("$5$"), "math inside fenced code must stay literal");
    assert!(html.contains("<code>$not math$</code>"));
    assert!(surface.is_typeset());
}

#[test]
fn script_injection_never_survives() {
    let payloads = [
        "<script>alert(1)</script>",
        "<img src=x onerror=alert(1)>",
        "<svg onload=alert(1)><circle/></svg>",
        "[click](javascript:alert(1))",
        r#"<a href="JaVaScRiPt:alert(1)">x</a>"#,
        r#"<iframe src="https://evil.example.net"></iframe>"#,
        r#"<p style="background:url(javascript:alert(1))" onclick="x()">p</p>"#,
        "<scr<script>ipt>alert(1)</script>",
        r"$\href{javascript:alert(1)}{x}$",
        "```html\n<script>alert(1)</script>\n```",
    ];

    for payload in payloads {
        let mut pipeline = pipeline(RenderConfig::default());
        let surface = render_and_typeset(&mut pipeline, payload);
        let html = surface.html().to_ascii_lowercase();

        assert!(!html.contains("<script"), "{payload} -> {html}");
        assert!(!html.contains("<iframe"), "{payload} -> {html}");
        assert!(!html.contains("<svg"), "{payload} -> {html}");
        assert!(!html.contains("href=\"javascript"), "{payload} -> {html}");
        assert!(!html.contains(" onerror"), "{payload} -> {html}");
        assert!(!html.contains(" onload"), "{payload} -> {html}");
        assert!(!html.contains(" onclick"), "{payload} -> {html}");
        assert!(!html.contains("url(javascript"), "{payload} -> {html}");
    }
}

#[test]
fn simple_markdown_snapshot() {
    let html = render(
        "**hi** <script>x</script>",
        &RenderConfig::default(),
        &default_delimiters(),
    )
    .expect("render");
    insta::assert_snapshot!(html.trim_end(), @"<p><strong>hi</strong> </p>");
}

#[test]
fn literal_mode_round_trips_visible_text() {
    let source = "**bold** <i>x</i> & \"quoted\" 'single'\nnext line";
    let config = RenderConfig {
        enable_markdown: false,
        ..RenderConfig::default()
    };
    let html = render(source, &config, &default_delimiters()).expect("render");

    assert!(!html.contains("<i>"));
    assert!(!html.contains("<strong>"));
    assert_eq!(decode_text(&html), source);
}

#[test]
fn blank_input_renders_nothing() {
    for source in ["", "   ", "\n\t \r\n"] {
        let mut pipeline = pipeline(RenderConfig::default());
        let markup = pipeline.update(source).expect("render");
        assert!(markup.is_empty());

        let mut surface = RenderedSurface::commit(&markup);
        assert_eq!(
            pipeline.on_committed(&mut surface).expect("phase b"),
            PassOutcome::Skipped
        );
        assert_eq!(surface.html(), "");
    }
}

#[test]
fn dollar_amount_with_math_is_typeset() {
    let mut pipeline = pipeline(RenderConfig::default());
    let markup = pipeline.update("price is $5$ dollars").expect("phase a");
    assert_eq!(markup.html.trim_end(), "<p>price is $5$ dollars</p>");

    let mut surface = RenderedSurface::commit(&markup);
    let outcome = pipeline.on_committed(&mut surface).expect("phase b");

    assert!(matches!(outcome, PassOutcome::Typeset(report) if report.typeset == 1));
    assert!(surface.html().starts_with("<p>price is <span data-math-rendered=\"inline\">"));
    assert!(surface.html().trim_end().ends_with("</span> dollars</p>"));
}

#[test]
fn unparseable_math_is_left_visible() {
    let mut pipeline = pipeline(RenderConfig::default());
    let markup = pipeline.update(r"broken $\notacommand{x}$ math").expect("phase a");
    let mut surface = RenderedSurface::commit(&markup);

    let outcome = pipeline.on_committed(&mut surface).expect("phase b");
    assert!(matches!(outcome, PassOutcome::Typeset(report) if report.unparseable == 1));
    assert!(surface.html().contains(r"$\notacommand{x}$"));
}

#[test]
fn stale_phase_b_is_dropped() {
    let mut pipeline = pipeline(RenderConfig::default());
    let first = pipeline.update("first $a$").expect("phase a");
    let mut stale = RenderedSurface::commit(&first);
    let second = pipeline.update("second $b$").expect("phase a");

    assert_eq!(
        pipeline.on_committed(&mut stale).expect("phase b"),
        PassOutcome::Superseded {
            surface: Generation(1),
            latest: Generation(2),
        }
    );
    assert_eq!(stale.html(), first.html);

    let mut fresh = RenderedSurface::commit(&second);
    assert!(matches!(
        pipeline.on_committed(&mut fresh).expect("phase b"),
        PassOutcome::Typeset(_)
    ));
}

#[test]
fn rendering_is_deterministic() {
    let source = include_str!("fixtures/chat_message.md");
    let first = render(source, &RenderConfig::default(), &default_delimiters()).expect("render");
    let second = render(source, &RenderConfig::default(), &default_delimiters()).expect("render");
    assert_eq!(first, second);
}

#[test]
fn crlf_input_matches_lf_input() {
    let crlf = render("a\r\nb\r\n\r\n$x +\r\ny$", &RenderConfig::default(), &default_delimiters())
        .expect("render");
    let lf = render("a\nb\n\n$x + y$", &RenderConfig::default(), &default_delimiters())
        .expect("render");
    assert_eq!(crlf, lf);
}

#[test]
fn pinyin_heading_anchors_are_unique() {
    let config = RenderConfig {
        header_anchors_enabled: true,
        ..RenderConfig::default()
    };
    let html = render("# 你好\n\n## 你好\n", &config, &default_delimiters()).expect("render");

    assert!(html.contains(r#"id="ni-hao""#));
    assert!(html.contains(r#"id="ni-hao-2""#));
}

#[test]
fn sanitize_off_skips_link_hook() {
    let config = RenderConfig {
        enable_sanitize: false,
        ..RenderConfig::default()
    };
    let html = render("[x](https://evil.example.net/)", &config, &default_delimiters())
        .expect("render");
    assert!(!html.contains("target="));
}

#[test]
fn one_shot_phase_b_typesets_host_markup() {
    let mut surface = RenderedSurface::commit(&chatmark::application::render::Markup {
        html: "<div>\\(a+b\\) and <code>$c$</code></div>".to_string(),
        generation: Generation(7),
        pipeline: None,
    });
    let report = after_surface_update(&mut surface, &default_delimiters()).expect("phase b");

    assert_eq!(report.typeset, 1);
    assert!(surface.html().contains("<code>$c$</code>"));
}

#[test]
fn pipelines_run_on_separate_threads() {
    let handles: Vec<_> = (0..4)
        .map(|idx| {
            thread::spawn(move || {
                let mut pipeline = pipeline(RenderConfig::default());
                let surface =
                    render_and_typeset(&mut pipeline, &format!("thread {idx}: $x_{idx}$"));
                surface.into_html()
            })
        })
        .collect();

    for handle in handles {
        let html = handle.join().expect("thread");
        assert!(html.contains("data-math-rendered=\"inline\""));
    }
}

fn text_content(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    decode_text(&text)
}

#[test]
fn shell_fence_keeps_its_lines() {
    let html = render(
        "```sh\necho $A\necho $B\n```\n",
        &RenderConfig::default(),
        &default_delimiters(),
    )
    .expect("render");

    assert!(text_content(&html).contains("echo $A\necho $B"));
}

#[test]
fn dollar_amounts_in_separate_paragraphs_stay_separate() {
    let mut pipeline = pipeline(RenderConfig::default());
    let surface = render_and_typeset(&mut pipeline, "I paid $5 today.\n\nYou paid $10 yesterday.");

    assert_eq!(
        surface.html().trim_end(),
        "<p>I paid $5 today.</p>\n<p>You paid $10 yesterday.</p>"
    );
}

#[test]
fn math_heading_anchor_uses_expression_text() {
    let mut pipeline = pipeline(RenderConfig {
        header_anchors_enabled: true,
        ..RenderConfig::default()
    });
    let markup = pipeline.update("# About $x$").expect("phase a");

    assert!(markup.html.contains(r##"id="about-x" href="#about-x""##));
    assert!(!markup.html.to_ascii_lowercase().contains("chatmarkmath"));
}

#[test]
fn marker_lookalike_text_is_kept_verbatim() {
    let html = render(
        "literal CHATMARKMATH0END then $x$",
        &RenderConfig::default(),
        &default_delimiters(),
    )
    .expect("render");

    assert_eq!(html.trim_end(), "<p>literal CHATMARKMATH0END then $x$</p>");
}
