use crate::attributes::AttributeMap;
use crate::runtime::{self, Identity};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt::Write as _;
use tracing::field::{Field, Visit};
use tracing::{Event, Level};

/// Function name used for events emitted outside of any span.
pub const TOP_LEVEL_FUNCTION: &str = "<module>";

/// Fields every [`LogEvent`] carries natively, independent of what the
/// call site recorded.
pub const NATIVE_FIELDS: &[&str] = &[
    "timestamp",
    "level",
    "target",
    "message",
    "module",
    "function",
    "line",
    "file",
    "thread_name",
    "thread_id",
    "process_name",
    "process_id",
    "task_name",
];

/// Captured error attached to a log call, together with its cause chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub kind: String,
    pub message: String,
    pub causes: Vec<String>,
    pub backtrace: Option<String>,
}

impl ExceptionInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            causes: Vec::new(),
            backtrace: None,
        }
    }

    /// Capture an error and walk its `source()` chain.
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            kind: "Error".to_string(),
            message: err.to_string(),
            causes,
            backtrace: None,
        }
    }

    /// Capture the payload of a caught panic.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };
        Self::new("panic", message)
    }

    pub fn with_backtrace(mut self, backtrace: impl Into<String>) -> Self {
        self.backtrace = Some(backtrace.into());
        self
    }

    /// Multi-line, human readable rendering used for the `error` attribute.
    pub fn format(&self) -> String {
        let mut out = format!("{}: {}", self.kind, self.message);
        if !self.causes.is_empty() {
            out.push_str("\n\nCaused by:");
            for (idx, cause) in self.causes.iter().enumerate() {
                let _ = write!(out, "\n    {}: {}", idx, cause);
            }
        }
        if let Some(backtrace) = &self.backtrace {
            out.push_str("\n\nStack backtrace:\n");
            out.push_str(backtrace);
        }
        out
    }
}

/// Read-only snapshot of one logging call.
///
/// Built either from a `tracing` [`Event`] by the formatter front-ends, or
/// by hand through [`LogEvent::builder`] when records originate elsewhere.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub target: String,
    pub message: String,
    pub module: String,
    pub function: String,
    pub line: u32,
    /// Call-site path as `tracing` reports it, i.e. relative to the
    /// crate's manifest directory rather than absolute.
    pub file: String,
    pub thread: Identity,
    pub process: Identity,
    pub task: Option<String>,
    pub exception: Option<ExceptionInfo>,
    pub stack_info: Option<String>,
    /// Caller-supplied fields, in call-site order.
    pub extra: AttributeMap,
}

impl LogEvent {
    pub fn builder(level: Level, message: impl Into<String>) -> LogEventBuilder {
        LogEventBuilder::new(level, message)
    }

    /// Snapshot a `tracing` event.
    ///
    /// `function` is the name of the innermost span the event was emitted
    /// in, which is the closest thing `tracing` has to a calling function.
    pub fn from_tracing(event: &Event<'_>, function: Option<&str>) -> Self {
        let meta = event.metadata();
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let stack_info = visitor
            .capture_stack
            .then(|| Backtrace::force_capture().to_string());

        LogEvent {
            timestamp: Utc::now(),
            level: *meta.level(),
            target: meta.target().to_string(),
            message: visitor.message.unwrap_or_default(),
            module: meta.module_path().unwrap_or(meta.target()).to_string(),
            function: function.unwrap_or(TOP_LEVEL_FUNCTION).to_string(),
            line: meta.line().unwrap_or(0),
            file: meta.file().unwrap_or("<unknown>").to_string(),
            thread: runtime::current_thread(),
            process: runtime::current_process(),
            task: runtime::current_task_name(),
            exception: visitor.exception,
            stack_info,
            extra: visitor.fields,
        }
    }

    /// Whether `name` is a field this event already carries, either
    /// intrinsically or as a caller-supplied extra.
    pub fn has_native_field(&self, name: &str) -> bool {
        NATIVE_FIELDS.contains(&name) || self.extra.contains_key(name)
    }

    pub fn native_field(&self, name: &str) -> Option<Value> {
        let value = match name {
            "timestamp" => Value::String(format_timestamp(&self.timestamp)),
            "level" => Value::String(self.level.as_str().to_string()),
            "target" => Value::String(self.target.clone()),
            "message" => Value::String(self.message.clone()),
            "module" => Value::String(self.module.clone()),
            "function" => Value::String(self.function.clone()),
            "line" => Value::from(self.line),
            "file" => Value::String(self.file.clone()),
            "thread_name" => Value::String(self.thread.name.clone()),
            "thread_id" => Value::from(self.thread.id),
            "process_name" => Value::String(self.process.name.clone()),
            "process_id" => Value::from(self.process.id),
            "task_name" => Value::from(self.task.clone()),
            other => return self.extra.get(other).cloned(),
        };
        Some(value)
    }

    /// All native fields: intrinsic ones first, then the extras.
    pub fn native_fields(&self) -> AttributeMap {
        let mut fields = AttributeMap::new();
        for name in NATIVE_FIELDS {
            if let Some(value) = self.native_field(name) {
                fields.insert(name.to_string(), value);
            }
        }
        for (key, value) in &self.extra {
            fields.insert(key.clone(), value.clone());
        }
        fields
    }
}

/// RFC 3339 rendering shared by the `timestamp` attribute and the native
/// template field.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Builder for hand-made [`LogEvent`]s. Identity fields default to the
/// calling thread, process and task.
#[derive(Debug, Clone)]
pub struct LogEventBuilder {
    event: LogEvent,
}

impl LogEventBuilder {
    fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            event: LogEvent {
                timestamp: Utc::now(),
                level,
                target: String::new(),
                message: message.into(),
                module: String::new(),
                function: TOP_LEVEL_FUNCTION.to_string(),
                line: 0,
                file: String::new(),
                thread: runtime::current_thread(),
                process: runtime::current_process(),
                task: runtime::current_task_name(),
                exception: None,
                stack_info: None,
                extra: AttributeMap::new(),
            },
        }
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.event.target = target.into();
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.event.module = module.into();
        self
    }

    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.event.function = function.into();
        self
    }

    pub fn line(mut self, line: u32) -> Self {
        self.event.line = line;
        self
    }

    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.event.file = file.into();
        self
    }

    pub fn thread(mut self, thread: Identity) -> Self {
        self.event.thread = thread;
        self
    }

    pub fn process(mut self, process: Identity) -> Self {
        self.event.process = process;
        self
    }

    pub fn task(mut self, task: Option<String>) -> Self {
        self.event.task = task;
        self
    }

    pub fn exception(mut self, exception: ExceptionInfo) -> Self {
        self.event.exception = Some(exception);
        self
    }

    pub fn stack_info(mut self, stack: impl Into<String>) -> Self {
        self.event.stack_info = Some(stack.into());
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.event.extra.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> LogEvent {
        self.event
    }
}

/// Collects the fields of a `tracing` event into a [`LogEvent`].
#[derive(Default)]
struct FieldVisitor {
    fields: AttributeMap,
    message: Option<String>,
    exception: Option<ExceptionInfo>,
    capture_stack: bool,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "stack_info" {
            self.capture_stack = value;
        } else {
            self.insert(field, Value::from(value));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.exception.is_none() {
            let mut exception = ExceptionInfo::from_error(value);
            // Honours RUST_BACKTRACE / RUST_LIB_BACKTRACE.
            let backtrace = Backtrace::capture();
            if backtrace.status() == BacktraceStatus::Captured {
                exception = exception.with_backtrace(backtrace.to_string());
            }
            self.exception = Some(exception);
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, Value::String(format!("{:?}", value)));
        }
    }
}
