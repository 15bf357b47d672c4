use crate::attributes::AttributeMap;
use crate::error::{BoxError, ErrorRecorder, FormatterError};
use crate::event::LogEvent;
use std::borrow::Cow;

/// Pluggable source of record attributes.
///
/// Providers run in the order they were configured and a later provider
/// overrides keys produced by an earlier one. They can never override the
/// built-in fields (`timestamp`, `status`, `message`, `location`, `file`),
/// which are written after every provider has run.
///
/// Providers are called concurrently from every thread that logs, so they
/// must be `Send + Sync` and should keep any per-call state on the stack.
pub trait Provider: Send + Sync {
    /// Extract attributes for `event`.
    ///
    /// **Returns**
    /// - `Ok(None)` if the provider does not apply to this event (e.g. no
    ///   active request). An empty map is equally valid.
    /// - `Ok(Some(map))` with the attributes to merge into the record.
    /// - `Err(..)` if extraction failed. The error is reported under
    ///   `formatter_errors` and the provider contributes nothing; the
    ///   record is still produced.
    ///
    /// `errors` receives non-fatal diagnostics that should be surfaced
    /// without discarding the returned attributes.
    fn get_attributes(
        &self,
        event: &LogEvent,
        errors: &mut ErrorRecorder,
    ) -> Result<Option<AttributeMap>, BoxError>;

    /// Diagnostics the provider buffered internally, drained once after
    /// each [`Provider::get_attributes`] call.
    ///
    /// Default implementation returns nothing.
    fn take_errors(&self) -> Vec<FormatterError> {
        Vec::new()
    }

    /// Kind name used in diagnostics. Defaults to the short type name.
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(short_type_name(std::any::type_name::<Self>()))
    }
}

/// `my_crate::providers::Foo<Bar>` -> `Foo`.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
