//! Merge of provider output and built-in fields into one record.

use crate::config::FormatterConfig;
use crate::error::{ErrorRecorder, FormatterError};
use crate::event::{format_timestamp, ExceptionInfo, LogEvent};
use crate::provider::Provider;
use crate::truncate::{truncate, truncate_field};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};

/// Insertion-ordered attribute map. Re-inserting a key replaces its value
/// and keeps its original position.
pub type AttributeMap = serde_json::Map<String, Value>;

/// Keys written by the builder itself, after every provider.
pub const BUILTIN_KEYS: [&str; 5] = ["timestamp", "status", "message", "location", "file"];

pub const ERROR_KEY: &str = "error";
pub const STACK_INFO_KEY: &str = "stack_info";
pub const FORMATTER_ERRORS_KEY: &str = "formatter_errors";

/// Builds the attribute map of one record.
///
/// The map and error list live only for one [`AttributeBuilder::build`]
/// call, so a single builder (or the config behind it) can serve any
/// number of threads at once.
#[derive(Debug, Clone, Copy)]
pub struct AttributeBuilder<'a> {
    config: &'a FormatterConfig,
}

impl<'a> AttributeBuilder<'a> {
    pub fn new(config: &'a FormatterConfig) -> Self {
        Self { config }
    }

    /// Run every provider, then add the built-in fields and diagnostics.
    ///
    /// Never fails: provider errors, panics and oversized values are
    /// reported under `formatter_errors` instead.
    pub fn build(&self, event: &LogEvent) -> AttributeMap {
        let mut result = AttributeMap::new();
        let mut errors = Vec::new();

        for (index, provider) in self.config.providers().iter().enumerate() {
            if let Some(attributes) = run_provider(index, provider.as_ref(), event, &mut errors) {
                for (key, value) in attributes {
                    result.insert(key, value);
                }
            }
        }

        let stack_limit = self.config.stack_limit();

        result.insert(
            "timestamp".to_string(),
            Value::String(format_timestamp(&event.timestamp)),
        );
        result.insert(
            "status".to_string(),
            Value::String(event.level.as_str().to_string()),
        );
        result.insert(
            "message".to_string(),
            Value::String(truncate_field(
                event.message.clone(),
                self.config.message_limit(),
                "message",
                &mut errors,
            )),
        );
        result.insert(
            "location".to_string(),
            Value::String(format!("{}-{}#{}", event.module, event.function, event.line)),
        );
        result.insert("file".to_string(), Value::String(event.file.clone()));

        if let Some(exception) = &event.exception {
            let text = truncate_field(exception.format(), stack_limit, ERROR_KEY, &mut errors);
            result.insert(ERROR_KEY.to_string(), Value::String(text));
        }

        if let Some(stack) = &event.stack_info {
            let text = truncate_field(stack.clone(), stack_limit, STACK_INFO_KEY, &mut errors);
            result.insert(STACK_INFO_KEY.to_string(), Value::String(text));
        }

        if !errors.is_empty() {
            let block = errors
                .iter()
                .map(FormatterError::render)
                .collect::<Vec<_>>()
                .join("\n\n");
            // The block's own overflow is not reported into itself.
            let block = truncate(&block, stack_limit).unwrap_or(block);
            result.shift_remove(FORMATTER_ERRORS_KEY);
            result.insert(FORMATTER_ERRORS_KEY.to_string(), Value::String(block));
        }

        result
    }
}

/// Call one provider inside a fault boundary.
///
/// `Err` results and panics both become a diagnostic and make the
/// provider contribute nothing.
fn run_provider(
    index: usize,
    provider: &dyn Provider,
    event: &LogEvent,
    errors: &mut Vec<FormatterError>,
) -> Option<AttributeMap> {
    let name = provider.name();
    let mut recorder = ErrorRecorder::new();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        provider.get_attributes(event, &mut recorder)
    }));

    let attributes = match outcome {
        Ok(Ok(attributes)) => attributes,
        Ok(Err(err)) => {
            errors.push(FormatterError::with_exception(
                format!("Provider index {} ({}) raised an exception: {}", index, name, err),
                ExceptionInfo::from_error(&*err),
            ));
            None
        }
        Err(payload) => {
            let exception = ExceptionInfo::from_panic(&*payload);
            errors.push(FormatterError::with_exception(
                format!(
                    "Provider index {} ({}) raised an exception: {}",
                    index, name, exception.message
                ),
                exception,
            ));
            None
        }
    };

    let prefix = format!("Provider index {} ({})", index, name);
    errors.extend(
        recorder
            .drain()
            .into_iter()
            .chain(provider.take_errors())
            .map(|error| error.prefixed(&prefix)),
    );

    attributes
}
