//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::render::{LinkContext, MathOptions, RenderConfig, UnparseableFallback};
use crate::domain::delimiters::{MathDelimiter, default_delimiters};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "chatmark";
const DEFAULT_DOCUMENT_URL: &str = "http://localhost/";

/// Command-line arguments for the chatmark binary.
#[derive(Debug, Parser)]
#[command(name = "chatmark", version, about = "Render chat messages to safe HTML")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CHATMARK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render a message and print the typeset HTML.
    Render(RenderArgs),
    /// Print the stylesheet for a bundled highlighting theme.
    #[command(name = "theme-css")]
    ThemeCss(ThemeCssArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: RenderOverrides,

    /// Message file to render; standard input when omitted.
    #[arg(value_name = "INPUT", value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ThemeCssArgs {
    /// Theme name, e.g. `base16-ocean.light`.
    #[arg(value_name = "NAME")]
    pub name: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Interpret Markdown.
    #[arg(long = "markdown", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub markdown: Option<bool>,

    /// Sanitize output and harden external links.
    #[arg(long = "sanitize", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub sanitize: Option<bool>,

    /// Render single newlines as line breaks.
    #[arg(long = "line-breaks", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub line_breaks: Option<bool>,

    /// Give headings linkable anchors.
    #[arg(
        long = "header-anchors",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub header_anchors: Option<bool>,

    /// URL of the document the message is shown in.
    #[arg(long = "document-url", value_name = "URL")]
    pub document_url: Option<String>,

    /// What to show for unparseable math (literal|marker).
    #[arg(long = "math-fallback", value_name = "MODE")]
    pub math_fallback: Option<String>,

    /// Fail the render on the first unparseable math expression.
    #[arg(
        long = "math-throw-on-error",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub math_throw_on_error: Option<bool>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(long = "log-json", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub log_json: Option<bool>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub render: RenderSettings,
    pub math: MathSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub config: RenderConfig,
    pub links: LinkContext,
}

#[derive(Debug, Clone)]
pub struct MathSettings {
    pub delimiters: Vec<MathDelimiter>,
    pub options: MathOptions,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("CHATMARK").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    if let Some(Command::Render(args)) = cli.command.as_ref() {
        raw.apply_render_overrides(&args.overrides);
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    render: RawRenderSettings,
    math: RawMathSettings,
}

impl RawSettings {
    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(value) = overrides.markdown {
            self.render.markdown = Some(value);
        }
        if let Some(value) = overrides.sanitize {
            self.render.sanitize = Some(value);
        }
        if let Some(value) = overrides.line_breaks {
            self.render.line_breaks = Some(value);
        }
        if let Some(value) = overrides.header_anchors {
            self.render.header_anchors = Some(value);
        }
        if let Some(url) = overrides.document_url.as_ref() {
            self.render.document_url = Some(url.clone());
        }
        if let Some(fallback) = overrides.math_fallback.as_ref() {
            self.math.fallback = Some(fallback.clone());
        }
        if let Some(value) = overrides.math_throw_on_error {
            self.math.throw_on_error = Some(value);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            render,
            math,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let render = build_render_settings(render)?;
        let math = build_math_settings(math)?;

        Ok(Self {
            logging,
            render,
            math,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::WARN,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let defaults = RenderConfig::default();
    let config = RenderConfig {
        enable_markdown: render.markdown.unwrap_or(defaults.enable_markdown),
        enable_sanitize: render.sanitize.unwrap_or(defaults.enable_sanitize),
        line_breaks_as_newlines: render.line_breaks.unwrap_or(defaults.line_breaks_as_newlines),
        header_anchors_enabled: render
            .header_anchors
            .unwrap_or(defaults.header_anchors_enabled),
    };

    let document_url = render
        .document_url
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_DOCUMENT_URL);
    let links = LinkContext::parse(document_url).map_err(|err| {
        LoadError::invalid(
            "render.document_url",
            format!("`{document_url}` is not an absolute URL: {err}"),
        )
    })?;

    Ok(RenderSettings { config, links })
}

fn build_math_settings(math: RawMathSettings) -> Result<MathSettings, LoadError> {
    let delimiters = math.delimiters.unwrap_or_else(default_delimiters);
    if let Some(bad) = delimiters.iter().find(|delimiter| !delimiter.is_usable()) {
        return Err(LoadError::invalid(
            "math.delimiters",
            format!(
                "left and right must be non-empty (got `{}` / `{}`)",
                bad.left, bad.right
            ),
        ));
    }

    let fallback = match math.fallback.as_deref().map(str::trim) {
        None | Some("") => UnparseableFallback::default(),
        Some(value) => parse_fallback(value)?,
    };

    let macros = math.macros.unwrap_or_default();
    if let Some(bad) = macros
        .iter()
        .find(|entry| !entry.name.starts_with('\\') || entry.name.len() < 2)
    {
        return Err(LoadError::invalid(
            "math.macros",
            format!(
                "macro name `{}` must be a control sequence such as `\\RR`",
                bad.name
            ),
        ));
    }

    Ok(MathSettings {
        delimiters,
        options: MathOptions {
            throw_on_error: math.throw_on_error.unwrap_or(false),
            fallback,
            trust: math.trust.unwrap_or(false),
            macros: macros
                .into_iter()
                .map(|entry| (entry.name, entry.expansion))
                .collect(),
        },
    })
}

fn parse_fallback(value: &str) -> Result<UnparseableFallback, LoadError> {
    match value.to_ascii_lowercase().as_str() {
        "literal" => Ok(UnparseableFallback::Literal),
        "marker" => Ok(UnparseableFallback::Marker),
        other => Err(LoadError::invalid(
            "math.fallback",
            format!("expected `literal` or `marker`, got `{other}`"),
        )),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    markdown: Option<bool>,
    sanitize: Option<bool>,
    line_breaks: Option<bool>,
    header_anchors: Option<bool>,
    document_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMathSettings {
    delimiters: Option<Vec<MathDelimiter>>,
    throw_on_error: Option<bool>,
    fallback: Option<String>,
    trust: Option<bool>,
    macros: Option<Vec<RawMacro>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawMacro {
    name: String,
    expansion: String,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
