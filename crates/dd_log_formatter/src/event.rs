//! The in-memory log event handed to the formatter.

use std::fmt;

use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Severity of a [`LogEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Tracing information and debugging minutiae.
    Verbose,

    /// Internal system events that aren't necessarily observable from the outside.
    Debug,

    /// Things that happen in the system that correspond to its responsibilities.
    Information,

    /// The system is degraded or used in an unexpected way.
    Warning,

    /// Functionality is unavailable or expectations are broken.
    Error,

    /// The system cannot continue.
    Fatal,
}

impl LogLevel {
    /// Name of the level as it appears in the serialized event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verbose => "Verbose",
            Self::Debug => "Debug",
            Self::Information => "Information",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Fatal => "Fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "tracing")]
impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Verbose,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Information,
            tracing::Level::WARN => Self::Warning,
            _ => Self::Error,
        }
    }
}

/// A single structured record produced by the application's logging pipeline.
///
/// The formatter never mutates an event; it only reads it through the base serializer.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEvent {
    /// When the event occurred.
    pub timestamp: OffsetDateTime,

    /// Severity of the event.
    pub level: LogLevel,

    /// The message template, before property substitution.
    pub message_template: String,

    /// The message with properties substituted in. `None` leaves the message out of the output.
    pub rendered_message: Option<String>,

    /// Textual representation of an error attached to the event.
    pub exception: Option<String>,

    /// Custom properties, kept in insertion order.
    pub properties: Map<String, Value>,
}

impl LogEvent {
    /// Creates an event timestamped now, whose template and rendered message are both `message`.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            timestamp: OffsetDateTime::now_utc(),
            level,
            rendered_message: Some(message.clone()),
            message_template: message,
            exception: None,
            properties: Map::new(),
        }
    }

    /// Replaces the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Replaces the message template, keeping the rendered message.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = template.into();
        self
    }

    /// Attaches error details.
    #[must_use]
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Adds or replaces a custom property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
