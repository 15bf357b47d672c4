use crate::attributes::{AttributeBuilder, AttributeMap};
use crate::config::FormatterConfig;
use crate::error::TemplateError;
use crate::event::LogEvent;
use crate::template::Template;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

/// Serializes a finished attribute map into one line.
pub trait Encoder: Send + Sync {
    fn encode(&self, attributes: &AttributeMap) -> String;
}

/// Single-line JSON through `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactJson;

impl Encoder for CompactJson {
    fn encode(&self, attributes: &AttributeMap) -> String {
        serde_json::to_string(attributes).unwrap_or_else(|err| {
            let mut fallback = AttributeMap::new();
            fallback.insert(
                "formatter_errors".to_string(),
                Value::String(format!("failed to encode record: {}", err)),
            );
            Value::Object(fallback).to_string()
        })
    }
}

/// Structured front-end: one JSON object per record.
///
/// Attribute order and override rules are those of [`AttributeBuilder`]:
/// providers in configured order, then the built-in fields, then
/// `formatter_errors`.
#[derive(Clone)]
pub struct JsonFormatter {
    config: Arc<FormatterConfig>,
    encoder: Arc<dyn Encoder>,
}

impl JsonFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self {
            config: Arc::new(config),
            encoder: Arc::new(CompactJson),
        }
    }

    pub fn with_encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoder = Arc::new(encoder);
        self
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    pub fn attributes(&self, event: &LogEvent) -> AttributeMap {
        AttributeBuilder::new(&self.config).build(event)
    }

    /// Encoded record, without trailing newline.
    pub fn format(&self, event: &LogEvent) -> String {
        self.encoder.encode(&self.attributes(event))
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new(FormatterConfig::default())
    }
}

impl fmt::Debug for JsonFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFormatter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Templated front-end.
///
/// Computed attributes are offered to the template next to the event's
/// own fields, but never replace them: if the event already has a field of
/// the same name (intrinsic, or recorded at the call site) the event's
/// value is rendered. This differs from [`JsonFormatter`], where the
/// built-in attributes always win.
///
/// `message` is one of those event fields, so `{message}` renders the full
/// message even when it exceeds `message_size_limit`; the violation is
/// still reported through `{formatter_errors}`.
///
/// ```
/// use tracing::Level;
/// use tracing_record_formatter::{FormatterConfig, LogEvent, TextFormatter};
///
/// let formatter = TextFormatter::new("{level} {location} | {message}", FormatterConfig::default()).unwrap();
/// let event = LogEvent::builder(Level::WARN, "disk almost full")
///     .module("app")
///     .function("check")
///     .line(7)
///     .build();
/// assert_eq!(formatter.format(&event), "WARN app-check#7 | disk almost full");
/// ```
#[derive(Debug, Clone)]
pub struct TextFormatter {
    template: Template,
    config: Arc<FormatterConfig>,
}

impl TextFormatter {
    pub fn new(template: &str, config: FormatterConfig) -> Result<Self, TemplateError> {
        Ok(Self {
            template: Template::parse(template)?,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Event fields plus every computed attribute that does not collide
    /// with one of them.
    pub fn fields(&self, event: &LogEvent) -> AttributeMap {
        let mut fields = event.native_fields();
        for (key, value) in AttributeBuilder::new(&self.config).build(event) {
            if !event.has_native_field(&key) {
                fields.insert(key, value);
            }
        }
        fields
    }

    /// Rendered line, without trailing newline.
    pub fn format(&self, event: &LogEvent) -> String {
        let fields = self.fields(event);
        self.template.render(|name| fields.get(name).cloned())
    }
}

/// Snapshot a `tracing` event, using the innermost span as the function.
fn capture<S, N>(ctx: &FmtContext<'_, S, N>, event: &Event<'_>) -> LogEvent
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let function = ctx
        .event_scope()
        .and_then(|mut scope| scope.next())
        .map(|span| span.name());
    LogEvent::from_tracing(event, function)
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let record = capture(ctx, event);
        writeln!(writer, "{}", self.format(&record))
    }
}

impl<S, N> FormatEvent<S, N> for TextFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let record = capture(ctx, event);
        writeln!(writer, "{}", self.format(&record))
    }
}
