pub mod attributes;
pub mod config;
pub mod context;
pub mod context_provider;
pub mod env;
pub mod error;
pub mod event;
pub mod extra;
pub mod formatter;
pub mod init;
pub mod provider;
pub mod request;
pub mod runtime;
pub mod template;
pub mod truncate;

pub use attributes::{AttributeBuilder, AttributeMap};
pub use config::FormatterConfig;
pub use context_provider::{inject_log_context, LogContextProvider};
pub use error::{BoxError, ErrorRecorder, FormatterError};
pub use event::{ExceptionInfo, LogEvent};
pub use extra::ExtraProvider;
pub use formatter::{JsonFormatter, TextFormatter};
pub use provider::Provider;
pub use request::{RequestInfo, RequestProvider};
pub use runtime::RuntimeProvider;
