use once_cell::sync::Lazy;
use syntect::{
    dumps::from_uncompressed_data,
    highlighting::ThemeSet,
    html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

use crate::application::render::types::RenderError;

use super::escape::escape_html;

pub(crate) const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "syntax-" };

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(|| {
    let syntax_bytes = include_bytes!(env!("SYNTAX_PACK_FILE"));
    from_uncompressed_data(syntax_bytes).expect("syntax pack must be valid")
});

static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

pub(crate) fn syntax_set() -> &'static SyntaxSet {
    &SYNTAX_SET
}

pub(crate) fn highlight_code(
    language: Option<&str>,
    code: &str,
    syntax_set: &SyntaxSet,
) -> Result<String, RenderError> {
    let lang_token = language.unwrap_or("text");
    let syntax =
        find_syntax(syntax_set, lang_token).unwrap_or_else(|| syntax_set.find_syntax_plain_text());

    let mut code_with_newline = code.to_string();
    if !code_with_newline.ends_with('\n') {
        code_with_newline.push('\n');
    }

    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, CLASS_STYLE);

    for line in LinesWithEndings::from(code_with_newline.as_str()) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .map_err(|err| RenderError::Highlighting {
                language: lang_token.to_string(),
                message: err.to_string(),
            })?;
    }

    let highlighted = generator.finalize();
    let lowercase = lang_token.to_ascii_lowercase();
    let lang_class = escape_html(&lowercase);

    Ok(format!(
        "<pre class=\"syntax-highlight\" data-language=\"{lang_class}\"><code class=\"language-{lang_class}\">{highlighted}</code></pre>"
    ))
}

/// Escaped `<pre><code>` used when highlighting itself fails.
pub(crate) fn plain_code_block(language: Option<&str>, code: &str) -> String {
    let mut html = String::from("<pre class=\"syntax-highlight\"");
    if let Some(language) = language.filter(|lang| !lang.is_empty()) {
        html.push_str(" data-language=\"");
        html.push_str(&escape_html(language));
        html.push('"');
    }
    html.push_str("><code>");
    html.push_str(&escape_html(code));
    if !code.ends_with('\n') {
        html.push('\n');
    }
    html.push_str("</code></pre>");
    html
}

/// CSS for one of syntect's bundled themes, scoped to the `syntax-` classes
/// emitted by [`highlight_code`].
pub fn theme_stylesheet(name: &str) -> Result<String, RenderError> {
    let theme = THEME_SET.themes.get(name).ok_or_else(|| RenderError::Theme {
        name: name.to_string(),
    })?;

    css_for_theme_with_class_style(theme, CLASS_STYLE).map_err(|err| RenderError::Document {
        message: format!("failed to build theme stylesheet: {err}"),
    })
}

/// Names accepted by [`theme_stylesheet`].
pub fn theme_names() -> Vec<&'static str> {
    THEME_SET.themes.keys().map(String::as_str).collect()
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(&lowercase))
        .or_else(|| syntax_set.find_syntax_by_extension(&lowercase))
}
