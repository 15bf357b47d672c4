use crate::attributes::AttributeMap;
use crate::context::{ContextVar, WithContext};
use crate::error::{BoxError, ErrorRecorder};
use crate::event::LogEvent;
use crate::provider::Provider;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::OnceLock;
use std::thread::ThreadId;

static TASK_NAME: ContextVar<String> = ContextVar::new("task_name");

/// Name and numeric id of a thread or process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub id: u64,
}

impl Identity {
    pub fn new(name: impl Into<String>, id: u64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

pub fn current_thread() -> Identity {
    let thread = std::thread::current();
    Identity::new(
        thread.name().unwrap_or("<unnamed>"),
        thread_id_number(thread.id()),
    )
}

// `ThreadId::as_u64` is unstable; its Debug form is `ThreadId(N)`.
fn thread_id_number(id: ThreadId) -> u64 {
    format!("{:?}", id)
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

pub fn current_process() -> Identity {
    static NAME: OnceLock<String> = OnceLock::new();
    let name = NAME.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "<unknown>".to_string())
    });
    Identity::new(name.clone(), u64::from(std::process::id()))
}

/// Name given to the current unit of work through [`named_task`].
pub fn current_task_name() -> Option<String> {
    TASK_NAME.get().map(|name| name.to_string())
}

/// Run `future` as a named task; log calls made while it runs report
/// `name` as their task.
pub fn named_task<F: Future>(name: impl Into<String>, future: F) -> WithContext<F> {
    TASK_NAME.scope_future(name.into(), future)
}

/// Spawn a named tokio task that also inherits the caller's context.
pub fn spawn_named<F>(name: impl Into<String>, future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(named_task(name, future))
}

/// Adds `process`, `thread` and, inside a named task, `task`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeProvider;

impl Provider for RuntimeProvider {
    fn get_attributes(
        &self,
        event: &LogEvent,
        _errors: &mut ErrorRecorder,
    ) -> Result<Option<AttributeMap>, BoxError> {
        let mut result = AttributeMap::new();
        result.insert("process".to_string(), Value::String(event.process.to_string()));
        result.insert("thread".to_string(), Value::String(event.thread.to_string()));
        if let Some(task) = &event.task {
            result.insert("task".to_string(), Value::String(task.clone()));
        }
        Ok(Some(result))
    }
}
