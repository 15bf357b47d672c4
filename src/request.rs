use crate::attributes::AttributeMap;
use crate::context::{ContextGuard, ContextVar, WithContext};
use crate::context_provider::{ContextExtractor, ContextProvider};
use crate::error::{BoxError, ErrorRecorder};
use crate::event::LogEvent;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;

/// Request currently being served, set by the web layer for the duration
/// of a request.
pub static REQUEST_CONTEXT: ContextVar<RequestInfo> = ContextVar::new("request");

/// Framework-neutral snapshot of an incoming HTTP request.
///
/// Web integrations fill this in from their own request type and install
/// it with [`RequestInfo::enter`] or [`RequestInfo::scope`]. Background
/// jobs can carry the originating request as JSON and deserialize it on
/// the worker side; missing fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    /// Matched route template, e.g. `/users/{id}`.
    pub route: Option<String>,
    pub url: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    /// Raw `X-Forwarded-For` header.
    pub forwarded_for: Option<String>,
    pub remote_addr: Option<String>,
    pub user: Option<RequestUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RequestUser {
    pub id: u64,
    pub authenticated: bool,
    pub name: String,
    pub email: Option<String>,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            method: method.into(),
            url: path.clone(),
            path,
            ..Self::default()
        }
    }

    /// `"{method} {route}"`, falling back to the raw path when no route
    /// matched.
    pub fn resource(&self) -> String {
        format!("{} {}", self.method, self.route.as_deref().unwrap_or(&self.path))
    }

    /// Client address: forwarded-for header, then peer address.
    pub fn client_addr(&self) -> &str {
        self.forwarded_for
            .as_deref()
            .filter(|value| !value.is_empty())
            .or(self.remote_addr.as_deref())
            .unwrap_or("unknown")
    }

    pub fn enter(self) -> ContextGuard {
        REQUEST_CONTEXT.set(self)
    }

    pub fn scope<F: Future>(self, future: F) -> WithContext<F> {
        REQUEST_CONTEXT.scope_future(self, future)
    }
}

/// Turns the active [`RequestInfo`] into `resource`, `http.*` and, when a
/// user is attached, `user.*` attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestExtractor;

impl ContextExtractor for RequestExtractor {
    type Value = RequestInfo;

    fn context_attributes(
        &self,
        _event: &LogEvent,
        request: &RequestInfo,
        _errors: &mut ErrorRecorder,
    ) -> Result<Option<AttributeMap>, BoxError> {
        let mut result = AttributeMap::new();
        result.insert("resource".to_string(), Value::String(request.resource()));
        result.insert("http.url".to_string(), Value::String(request.url.clone()));
        result.insert("http.method".to_string(), Value::String(request.method.clone()));
        result.insert("http.referrer".to_string(), Value::from(request.referrer.clone()));
        result.insert("http.useragent".to_string(), Value::from(request.user_agent.clone()));
        result.insert(
            "http.remote_addr".to_string(),
            Value::String(request.client_addr().to_string()),
        );

        if let Some(user) = &request.user {
            let id = if user.authenticated { user.id } else { 0 };
            result.insert("user.id".to_string(), Value::from(id));
            result.insert("user.name".to_string(), Value::String(user.name.clone()));
            result.insert("user.email".to_string(), Value::from(user.email.clone()));
        }

        Ok(Some(result))
    }
}

pub type RequestProvider = ContextProvider<RequestExtractor>;

impl RequestProvider {
    pub fn request() -> Self {
        ContextProvider::new(&REQUEST_CONTEXT, RequestExtractor)
    }
}

impl Default for RequestProvider {
    fn default() -> Self {
        Self::request()
    }
}
