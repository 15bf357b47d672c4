//! Providers backed by ambient context, and the scoped log context.

use crate::attributes::AttributeMap;
use crate::context::{Context, ContextGuard, ContextVar, WithContext};
use crate::error::{BoxError, ContextError, ErrorRecorder};
use crate::event::LogEvent;
use crate::provider::{short_type_name, Provider};
use serde_json::Value;
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

/// Converts a scoped context value into attributes.
///
/// Wrapped by [`ContextProvider`], which only calls it while a value is
/// set, so implementations never deal with the "no active scope" case.
pub trait ContextExtractor: Send + Sync {
    type Value: Send + Sync + 'static;

    fn context_attributes(
        &self,
        event: &LogEvent,
        value: &Self::Value,
        errors: &mut ErrorRecorder,
    ) -> Result<Option<AttributeMap>, BoxError>;
}

/// [`Provider`] reading a [`ContextVar`] and delegating to a
/// [`ContextExtractor`] when it is set.
pub struct ContextProvider<X: ContextExtractor + 'static> {
    var: &'static ContextVar<X::Value>,
    extractor: X,
}

impl<X: ContextExtractor + 'static> ContextProvider<X> {
    pub fn new(var: &'static ContextVar<X::Value>, extractor: X) -> Self {
        Self { var, extractor }
    }
}

impl<X: ContextExtractor + 'static> Provider for ContextProvider<X> {
    fn get_attributes(
        &self,
        event: &LogEvent,
        errors: &mut ErrorRecorder,
    ) -> Result<Option<AttributeMap>, BoxError> {
        match self.var.get() {
            Some(value) => self.extractor.context_attributes(event, &value, errors),
            None => Ok(None),
        }
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(short_type_name(std::any::type_name::<X>()))
    }
}

/// Fields injected with [`inject_log_context`] and friends.
pub static LOG_CONTEXT: ContextVar<AttributeMap> = ContextVar::new("log_context");

/// Returns the merged log context as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogContextExtractor;

impl ContextExtractor for LogContextExtractor {
    type Value = AttributeMap;

    fn context_attributes(
        &self,
        _event: &LogEvent,
        value: &AttributeMap,
        _errors: &mut ErrorRecorder,
    ) -> Result<Option<AttributeMap>, BoxError> {
        Ok(Some(value.clone()))
    }
}

pub type LogContextProvider = ContextProvider<LogContextExtractor>;

impl LogContextProvider {
    pub fn log_context() -> Self {
        ContextProvider::new(&LOG_CONTEXT, LogContextExtractor)
    }
}

impl Default for LogContextProvider {
    fn default() -> Self {
        Self::log_context()
    }
}

/// Add `fields` to every record logged until the guard is dropped.
///
/// Scopes nest: inner fields are merged over the enclosing ones. A key
/// that an enclosing scope already set is rejected with
/// [`ContextError::KeyConflict`]; use
/// [`inject_log_context_with_override`] to replace it deliberately.
///
/// ```
/// use serde_json::json;
/// use tracing_record_formatter::context_provider::inject_log_context;
///
/// let _outer = inject_log_context([("tenant", json!("acme"))]).unwrap();
/// let _inner = inject_log_context([("job", json!(7))]).unwrap();
/// assert!(inject_log_context([("tenant", json!("other"))]).is_err());
/// ```
pub fn inject_log_context<I, K, V>(fields: I) -> Result<ContextGuard, ContextError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    Ok(LOG_CONTEXT.set(merged_log_context(fields, false)?))
}

pub fn inject_log_context_with_override<I, K, V>(fields: I) -> Result<ContextGuard, ContextError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    Ok(LOG_CONTEXT.set(merged_log_context(fields, true)?))
}

/// Run `f` with `fields` injected.
pub fn log_context_scope<I, K, V, R>(fields: I, f: impl FnOnce() -> R) -> Result<R, ContextError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let _guard = inject_log_context(fields)?;
    Ok(f())
}

fn merged_log_context<I, K, V>(fields: I, allow_override: bool) -> Result<AttributeMap, ContextError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let mut merged = LOG_CONTEXT
        .get()
        .map(|outer| (*outer).clone())
        .unwrap_or_default();
    for (key, value) in fields {
        let key = key.into();
        if !allow_override && merged.contains_key(&key) {
            return Err(ContextError::KeyConflict { key });
        }
        merged.insert(key, value.into());
    }
    Ok(merged)
}

/// Future counterpart of [`inject_log_context`].
pub trait LogContextFutureExt: Future + Sized {
    /// Run this future with `fields` injected. Conflicts are checked
    /// against the context current at the time of the call.
    fn in_log_context<I, K, V>(self, fields: I) -> Result<WithContext<Self>, ContextError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let merged = merged_log_context(fields, false)?;
        let context = Context::current().with_value(&LOG_CONTEXT, Arc::new(merged));
        Ok(crate::context::ContextFutureExt::with_context(self, context))
    }
}

impl<F: Future> LogContextFutureExt for F {}
