use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to standard error so rendered HTML on standard output stays clean.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "chatmark_render_total",
            Unit::Count,
            "Total number of Phase A renders started."
        );
        describe_counter!(
            "chatmark_render_failed_total",
            Unit::Count,
            "Total number of Phase A renders that failed and cleared their markup."
        );
        describe_counter!(
            "chatmark_links_hardened_total",
            Unit::Count,
            "Total number of cross-origin links given target and rel attributes."
        );
        describe_counter!(
            "chatmark_math_typeset_total",
            Unit::Count,
            "Total number of math expressions typeset."
        );
        describe_counter!(
            "chatmark_math_unparseable_total",
            Unit::Count,
            "Total number of math expressions the engine could not parse."
        );
        describe_counter!(
            "chatmark_typeset_superseded_total",
            Unit::Count,
            "Total number of math passes skipped because a newer render existed."
        );
    });
}
