use crate::event::ExceptionInfo;
use std::error::Error;

/// Error type providers use to signal a failed extraction.
///
/// Same shape as the boxed errors the rest of the `tracing` ecosystem
/// passes around; anything that implements [`std::error::Error`] converts
/// into it with `?` or `.into()`.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// A non-fatal diagnostic collected while building one record.
///
/// Errors never escape a format call. They are rendered into the
/// `formatter_errors` attribute of the record that was being built when
/// they happened.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatterError {
    pub message: String,
    pub exception: Option<ExceptionInfo>,
}

impl FormatterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            exception: None,
        }
    }

    pub fn with_exception(message: impl Into<String>, exception: ExceptionInfo) -> Self {
        Self {
            message: message.into(),
            exception: Some(exception),
        }
    }

    /// Rewrite the message as `"{prefix}: {message}"`, keeping the
    /// captured exception.
    pub(crate) fn prefixed(self, prefix: &str) -> Self {
        Self {
            message: format!("{}: {}", prefix, self.message),
            exception: self.exception,
        }
    }

    /// Text form used inside `formatter_errors`.
    pub fn render(&self) -> String {
        match &self.exception {
            Some(exception) => format!("{}\n{}", self.message, exception.format()),
            None => self.message.clone(),
        }
    }
}

/// Per-invocation error channel handed to a [`Provider`](crate::provider::Provider).
///
/// Providers call [`ErrorRecorder::record_error`] to surface a problem
/// without failing the whole extraction, e.g. when an optional sub-field
/// could not be read.
#[derive(Debug, Default)]
pub struct ErrorRecorder {
    errors: Vec<FormatterError>,
}

impl ErrorRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(FormatterError::new(message));
    }

    pub fn record(&mut self, error: FormatterError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn drain(&mut self) -> Vec<FormatterError> {
        std::mem::take(&mut self.errors)
    }
}

/// Invalid formatter configuration read from the environment.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer or `none`, got {value:?}")]
    InvalidLimit { key: String, value: String },
}

/// Misuse of a scoped log context, reported at scope entry.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ContextError {
    #[error("log context key {key:?} is already set by an enclosing scope")]
    KeyConflict { key: String },
}

/// Malformed line template.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed placeholder starting at offset {0}")]
    Unclosed(usize),

    #[error("unmatched `}}` at offset {0}")]
    UnmatchedClose(usize),

    #[error("empty placeholder at offset {0}")]
    EmptyPlaceholder(usize),
}

/// Failure to install the formatter as the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}
