use crate::env::{self, LOG_FORMAT_MESSAGE_SIZE_LIMIT_ENV, LOG_FORMAT_STACK_SIZE_LIMIT_ENV};
use crate::error::ConfigError;
use crate::provider::Provider;
use std::fmt;
use std::sync::Arc;

/// Default `message` limit, 64 KiB.
pub const DEFAULT_MESSAGE_SIZE_LIMIT: usize = 64 * 1024;

/// Default limit for `error`, `stack_info` and `formatter_errors`, 128 KiB.
pub const DEFAULT_STACK_SIZE_LIMIT: usize = 128 * 1024;

/// Configuration shared by both formatter front-ends.
///
/// **Fields**
/// - `providers`: attribute providers, run in order for every record.
/// - `message_size_limit`: maximum length of `message` in characters,
///   `None` disables truncation.
/// - `stack_size_limit`: maximum length of `error`, `stack_info` and the
///   `formatter_errors` block, `None` disables truncation.
///
/// Formatters take ownership of the configuration and never mutate it, so
/// one instance is safely shared by every thread that logs.
#[derive(Clone)]
pub struct FormatterConfig {
    providers: Vec<Arc<dyn Provider>>,
    message_size_limit: Option<usize>,
    stack_size_limit: Option<usize>,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            message_size_limit: Some(DEFAULT_MESSAGE_SIZE_LIMIT),
            stack_size_limit: Some(DEFAULT_STACK_SIZE_LIMIT),
        }
    }
}

impl FormatterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with limits overridden by [`LOG_FORMAT_MESSAGE_SIZE_LIMIT_ENV`]
    /// and [`LOG_FORMAT_STACK_SIZE_LIMIT_ENV`] when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let message = env::env_or(
            LOG_FORMAT_MESSAGE_SIZE_LIMIT_ENV,
            &DEFAULT_MESSAGE_SIZE_LIMIT.to_string(),
        );
        let stack = env::env_or(
            LOG_FORMAT_STACK_SIZE_LIMIT_ENV,
            &DEFAULT_STACK_SIZE_LIMIT.to_string(),
        );
        Ok(Self {
            providers: Vec::new(),
            message_size_limit: env::parse_limit(LOG_FORMAT_MESSAGE_SIZE_LIMIT_ENV, &message)?,
            stack_size_limit: env::parse_limit(LOG_FORMAT_STACK_SIZE_LIMIT_ENV, &stack)?,
        })
    }

    pub fn with_provider(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn with_shared_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_providers(mut self, providers: impl IntoIterator<Item = Arc<dyn Provider>>) -> Self {
        self.providers.extend(providers);
        self
    }

    pub fn message_size_limit(mut self, limit: Option<usize>) -> Self {
        self.message_size_limit = limit;
        self
    }

    pub fn stack_size_limit(mut self, limit: Option<usize>) -> Self {
        self.stack_size_limit = limit;
        self
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    pub fn message_limit(&self) -> Option<usize> {
        self.message_size_limit
    }

    pub fn stack_limit(&self) -> Option<usize> {
        self.stack_size_limit
    }
}

impl fmt::Debug for FormatterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<_> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("FormatterConfig")
            .field("providers", &providers)
            .field("message_size_limit", &self.message_size_limit)
            .field("stack_size_limit", &self.stack_size_limit)
            .finish()
    }
}
