//! `dd_log_formatter` turns structured log events into single-line JSON documents understood by
//! the Datadog log intake.
//!
//! It offers:
//! - A [`LogFormatter`] that enriches the JSON representation of a [`LogEvent`] with `ddsource`,
//!   `service`, `host`, `ddtags`, `env`, `version` and trace correlation identifiers, and renames
//!   framework field names to Datadog's reserved attributes.
//! - A [`ServiceTagOverrides`] context, shared between the formatter and the rest of the
//!   application, for overriding `env` and `version` at runtime.
//! - With the `tracing` feature, a [`DatadogFormattingLayer`] and a [`SpanFieldsLayer`] that feed
//!   [`tracing`] events into the formatter.
//!
//! Shipping the produced lines to Datadog (batching, HTTP transport, retries) is left to the
//! caller.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use dd_log_formatter::{LogEvent, LogFormatter, LogLevel, ServiceTagOverrides};
//!
//! let overrides = Arc::new(ServiceTagOverrides::default());
//! overrides.set_env(Some("prod"));
//!
//! let formatter = LogFormatter::new(
//!     None,
//!     Some("api".to_string()),
//!     Some("box1".to_string()),
//!     Some(vec!["team:core".to_string()]),
//!     Arc::clone(&overrides),
//! );
//!
//! let event = LogEvent::new(LogLevel::Information, "started");
//! let line = formatter.format(&event).expect("formatting never fails for built-in events");
//!
//! assert!(line.contains(r#""ddsource":"csharp""#));
//! assert!(line.contains(r#""env":"prod""#));
//! assert!(line.contains(r#""message":"started""#));
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod document;
mod event;
mod formatter;
#[cfg(feature = "tracing")]
mod layer;
mod overrides;
mod serializer;

pub use self::{
    document::OutputDocument,
    event::{LogEvent, LogLevel},
    formatter::{FormatterConfig, LogFormatter, DEFAULT_SOURCE},
    overrides::{EnvLookup, ProcessEnv, ServiceTagOverrides, DD_ENV, DD_VERSION},
    serializer::{EventSerializer, JsonEventSerializer},
};
#[cfg(feature = "tracing")]
pub use self::layer::{DatadogFormattingLayer, SpanFieldsLayer};

/// Keys of the documents handled by this crate.
pub mod keys {
    /// Top-level key holding the trace correlation object.
    pub const DD: &str = "dd";
    /// Span identifier inside the [`DD`] object.
    pub const SPAN_ID: &str = "span_id";
    /// Trace identifier inside the [`DD`] object.
    pub const TRACE_ID: &str = "trace_id";
    /// Deployment environment.
    pub const ENV: &str = "env";
    /// Application version.
    pub const VERSION: &str = "version";
    /// Integration that produced the log.
    pub const DDSOURCE: &str = "ddsource";
    /// Service name.
    pub const SERVICE: &str = "service";
    /// Host name.
    pub const HOST: &str = "host";
    /// Comma-separated tags.
    pub const DDTAGS: &str = "ddtags";
    /// Rendered message, after renaming.
    pub const MESSAGE: &str = "message";
    /// Severity, after renaming.
    pub const LEVEL: &str = "level";

    /// Keys emitted by the base serializer.
    pub mod intermediate {
        /// Event timestamp.
        pub const TIMESTAMP: &str = "Timestamp";
        /// Severity name.
        pub const LEVEL: &str = "Level";
        /// Unrendered message template.
        pub const MESSAGE_TEMPLATE: &str = "MessageTemplate";
        /// Message with properties substituted in.
        pub const RENDERED_MESSAGE: &str = "RenderedMessage";
        /// Exception details, if any.
        pub const EXCEPTION: &str = "Exception";
        /// Custom properties attached to the event.
        pub const PROPERTIES: &str = "Properties";
    }

    /// Property carrying the span identifier of the active trace.
    pub const DD_SPAN_ID_PROPERTY: &str = "dd_span_id";
    /// Property carrying the trace identifier of the active trace.
    pub const DD_TRACE_ID_PROPERTY: &str = "dd_trace_id";
}

/// Errors that can occur while formatting an event.
///
/// Every variant indicates that the base serializer broke its contract with the formatter, or
/// that the final document could not be written out. None of them is retried.
#[derive(Debug, thiserror::Error)]
pub enum FormatterError {
    /// The intermediate representation is not valid JSON.
    #[error("Base serializer produced malformed JSON: {0}")]
    MalformedIntermediate(#[source] serde_json::Error),

    /// The intermediate representation is valid JSON, but not an object.
    #[error("Base serializer produced a JSON value that is not an object")]
    NotAnObject,

    /// A key about to be inserted is already present in the document.
    #[error("Key `{0}` is already present in the document")]
    DuplicateKey(String),

    /// The enriched document could not be serialized.
    #[error("JSON serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}
