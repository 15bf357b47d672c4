use crate::config::FormatterConfig;
use crate::error::InitError;
use crate::formatter::{JsonFormatter, TextFormatter};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::{DefaultFields, FormatEvent};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, Registry};

/// Install the global `tracing` subscriber with `formatter` writing to
/// `writer`.
///
/// **Parameters**
/// - `formatter`: [`JsonFormatter`], [`TextFormatter`] or any other
///   `FormatEvent` implementation.
/// - `writer`: destination of the formatted lines, one per event.
/// - `max_level`: most verbose level that is formatted at all.
///
/// **Returns**
/// - `Err(InitError::AlreadyInstalled)` if a global subscriber was set
///   before; the existing one stays in place.
pub fn init_with_writer<F, W>(formatter: F, writer: W, max_level: LevelFilter) -> Result<(), InitError>
where
    F: FormatEvent<Registry, DefaultFields> + Send + Sync + 'static,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer::<Registry>()
        .event_format(formatter)
        .with_writer(writer)
        .with_filter(max_level);
    let subscriber = Registry::default().with(layer);
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::debug!(%max_level, "record formatter installed");
    Ok(())
}

/// Initialize structured (JSON) logging to stdout at `INFO` and above.
///
/// Equivalent to calling [`init_with_writer`] with a [`JsonFormatter`].
/// This is the recommended entrypoint for typical services; combine with
/// [`FormatterConfig::from_env`] to let deployments tune size limits.
pub fn init_json(config: FormatterConfig) -> Result<(), InitError> {
    init_with_writer(JsonFormatter::new(config), std::io::stdout, LevelFilter::INFO)
}

/// Initialize templated logging to stdout at `INFO` and above.
pub fn init_text(template: &str, config: FormatterConfig) -> Result<(), InitError> {
    let formatter = TextFormatter::new(template, config)?;
    init_with_writer(formatter, std::io::stdout, LevelFilter::INFO)
}
