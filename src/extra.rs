use crate::attributes::AttributeMap;
use crate::error::{BoxError, ErrorRecorder};
use crate::event::LogEvent;
use crate::provider::Provider;

/// Forwards the fields recorded at the call site, e.g.
/// `info!(user_id = 42, "login")` contributes `user_id`.
///
/// Place it after context-backed providers so call-site fields win over
/// ambient ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtraProvider;

impl Provider for ExtraProvider {
    fn get_attributes(
        &self,
        event: &LogEvent,
        _errors: &mut ErrorRecorder,
    ) -> Result<Option<AttributeMap>, BoxError> {
        if event.extra.is_empty() {
            return Ok(None);
        }
        Ok(Some(event.extra.clone()))
    }
}
