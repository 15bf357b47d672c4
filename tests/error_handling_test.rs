mod common;

use common::capture;
use std::sync::Mutex;
use tracing::info;
use tracing_record_formatter::config::DEFAULT_STACK_SIZE_LIMIT;
use tracing_record_formatter::truncate::TRUNCATION_SUFFIX;
use tracing_record_formatter::{
    AttributeMap, BoxError, ErrorRecorder, FormatterConfig, FormatterError, JsonFormatter, LogEvent,
    Provider,
};

struct ExceptionProvider;

impl Provider for ExceptionProvider {
    fn get_attributes(
        &self,
        _event: &LogEvent,
        _errors: &mut ErrorRecorder,
    ) -> Result<Option<AttributeMap>, BoxError> {
        Err("Something went wrong".into())
    }
}

struct InternalErrorProvider;

impl Provider for InternalErrorProvider {
    fn get_attributes(
        &self,
        _event: &LogEvent,
        errors: &mut ErrorRecorder,
    ) -> Result<Option<AttributeMap>, BoxError> {
        errors.record_error("Something went wrong, but it's not an exception");
        let mut result = AttributeMap::new();
        result.insert("something".to_string(), 123.into());
        Ok(Some(result))
    }
}

struct LongExceptionProvider;

impl Provider for LongExceptionProvider {
    fn get_attributes(
        &self,
        _event: &LogEvent,
        _errors: &mut ErrorRecorder,
    ) -> Result<Option<AttributeMap>, BoxError> {
        Err(format!("Something went wrong{}", "*".repeat(DEFAULT_STACK_SIZE_LIMIT)).into())
    }
}

/// Buffers diagnostics between calls and hands them over through
/// `take_errors`.
#[derive(Default)]
struct BufferedErrorProvider {
    pending: Mutex<Vec<FormatterError>>,
}

impl Provider for BufferedErrorProvider {
    fn get_attributes(
        &self,
        _event: &LogEvent,
        _errors: &mut ErrorRecorder,
    ) -> Result<Option<AttributeMap>, BoxError> {
        self.pending
            .lock()
            .unwrap()
            .push(FormatterError::new("optional header unreadable"));
        Ok(Some(AttributeMap::new()))
    }

    fn take_errors(&self) -> Vec<FormatterError> {
        std::mem::take(&mut *self.pending.lock().unwrap())
    }
}

struct Constant(&'static str, i64);

impl Provider for Constant {
    fn get_attributes(
        &self,
        _event: &LogEvent,
        _errors: &mut ErrorRecorder,
    ) -> Result<Option<AttributeMap>, BoxError> {
        let mut result = AttributeMap::new();
        result.insert(self.0.to_string(), self.1.into());
        Ok(Some(result))
    }
}

#[test]
fn test_provider_exception() {
    let formatter = JsonFormatter::new(FormatterConfig::new().with_provider(ExceptionProvider));
    let out = capture(formatter, || info!("hello world!"));

    let record = out.single();
    let errors = record["formatter_errors"].as_str().unwrap();
    assert!(errors.contains("ExceptionProvider"));
    assert!(errors.contains("Error: Something went wrong"));
    assert_eq!(record["message"], "hello world!");
    assert_eq!(record["status"], "INFO");
}

#[test]
fn test_provider_internal_error() {
    let formatter = JsonFormatter::new(FormatterConfig::new().with_provider(InternalErrorProvider));
    let out = capture(formatter, || info!("hello world!"));

    let record = out.single();
    assert_eq!(
        record["formatter_errors"],
        "Provider index 0 (InternalErrorProvider): Something went wrong, but it's not an exception"
    );
    assert_eq!(record["message"], "hello world!");
    assert_eq!(record["status"], "INFO");
    assert_eq!(record["something"], 123);
}

#[test]
fn test_provider_truncate_error_message() {
    let formatter = JsonFormatter::new(FormatterConfig::new().with_provider(LongExceptionProvider));
    let out = capture(formatter, || info!("hello world!"));

    let record = out.single();
    let errors = record["formatter_errors"].as_str().unwrap();
    assert_eq!(errors.len(), DEFAULT_STACK_SIZE_LIMIT);
    assert!(errors.starts_with("Provider index 0 (LongExceptionProvider) raised an exception: "));
    assert!(errors.contains("Something went wrong"));
    assert!(errors.ends_with(TRUNCATION_SUFFIX));
    assert!(!errors.contains("'formatter_errors' value is too long"));
    assert_eq!(record["message"], "hello world!");
    assert_eq!(record["status"], "INFO");
}

#[test]
fn test_fault_isolation_keeps_other_providers() {
    let formatter = JsonFormatter::new(
        FormatterConfig::new()
            .with_provider(Constant("a", 1))
            .with_provider(Constant("b", 2))
            .with_provider(ExceptionProvider)
            .with_provider(Constant("c", 3)),
    );
    let out = capture(formatter, || info!("hello world!"));

    let record = out.single();
    assert_eq!(record["a"], 1);
    assert_eq!(record["b"], 2);
    assert_eq!(record["c"], 3);
    assert_eq!(record["status"], "INFO");
    let errors = record["formatter_errors"].as_str().unwrap();
    assert!(errors.contains("Provider index 2"));
    assert!(errors.contains("Something went wrong"));
}

#[test]
fn test_buffered_errors_are_drained_once() {
    let formatter =
        JsonFormatter::new(FormatterConfig::new().with_provider(BufferedErrorProvider::default()));
    let event = LogEvent::builder(tracing::Level::INFO, "hello world!").build();

    for _ in 0..2 {
        let record = formatter.attributes(&event);
        assert_eq!(
            record["formatter_errors"],
            "Provider index 0 (BufferedErrorProvider): optional header unreadable"
        );
    }
}

#[test]
fn test_errors_are_joined_in_order() {
    let formatter = JsonFormatter::new(
        FormatterConfig::new()
            .with_provider(InternalErrorProvider)
            .with_provider(ExceptionProvider)
            .message_size_limit(Some(20)),
    );
    let event = LogEvent::builder(tracing::Level::INFO, "a message that is far too long").build();

    let record = formatter.attributes(&event);
    let errors = record["formatter_errors"].as_str().unwrap();
    let blocks: Vec<&str> = errors.split("\n\n").collect();
    assert_eq!(
        blocks,
        [
            "Provider index 0 (InternalErrorProvider): Something went wrong, but it's not an exception",
            "Provider index 1 (ExceptionProvider) raised an exception: Something went wrong\nError: Something went wrong",
            "Attribute 'message' value is too long: 30 (limit: 20)",
        ]
    );
}
