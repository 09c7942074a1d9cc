use std::{
    fs,
    io::{self, Read, Write},
    path::Path,
    process,
};

use chatmark::{
    application::render::{PassOutcome, RenderPipeline, RenderedSurface, theme_stylesheet},
    config::{self, Command, RenderArgs, Settings},
    infra::{error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

fn main() {
    if let Err(error) = run() {
        report_error(&error);
        process::exit(1);
    }
}

fn report_error(error: &InfraError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "chatmark failed");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "chatmark failed");
    });
}

fn run() -> Result<(), InfraError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let command = cli_args
        .command
        .unwrap_or_else(|| Command::Render(RenderArgs::default()));

    match command {
        Command::Render(args) => run_render(settings, args),
        Command::ThemeCss(args) => {
            let css = theme_stylesheet(&args.name)?;
            io::stdout().write_all(css.as_bytes())?;
            Ok(())
        }
    }
}

fn run_render(settings: Settings, args: RenderArgs) -> Result<(), InfraError> {
    let source = read_input(args.input.as_deref())?;

    let mut pipeline = RenderPipeline::new(
        settings.render.config,
        settings.math.delimiters,
        settings.math.options,
        settings.render.links,
    );

    let markup = pipeline.update(&source)?;
    let mut surface = RenderedSurface::commit(&markup);
    match pipeline.on_committed(&mut surface)? {
        PassOutcome::Typeset(report) => info!(
            target = "chatmark::cli",
            typeset = report.typeset,
            unparseable = report.unparseable,
            "math pass finished"
        ),
        outcome => info!(target = "chatmark::cli", ?outcome, "math pass not run"),
    }

    let mut stdout = io::stdout().lock();
    stdout.write_all(surface.html().as_bytes())?;
    if !surface.html().ends_with('\n') && !surface.is_empty() {
        stdout.write_all(b"\n")?;
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String, InfraError> {
    match path {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}
