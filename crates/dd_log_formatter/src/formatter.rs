//! Provides the [`LogFormatter`], which enriches serialized log events with Datadog metadata.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    document::OutputDocument,
    event::LogEvent,
    keys,
    overrides::ServiceTagOverrides,
    serializer::{EventSerializer, JsonEventSerializer},
    FormatterError,
};

/// `ddsource` used when no source is configured.
pub const DEFAULT_SOURCE: &str = "csharp";

/// Static enrichment settings of a [`LogFormatter`].
///
/// Can be deserialized from an application's configuration file; every field is optional.
///
/// ```
/// let config: dd_log_formatter::FormatterConfig =
///     serde_json::from_str(r#"{"service": "checkout", "tags": ["team:payments"]}"#).unwrap();
/// assert_eq!(config.service.as_deref(), Some("checkout"));
/// assert_eq!(config.source, None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Integration name sent as `ddsource`. Defaults to [`DEFAULT_SOURCE`].
    pub source: Option<String>,

    /// Service name sent as `service`.
    pub service: Option<String>,

    /// Host name sent as `host`.
    pub host: Option<String>,

    /// Tags joined with `,` and sent as `ddtags`.
    pub tags: Option<Vec<String>>,
}

impl FormatterConfig {
    /// Fills in `host` with the machine's hostname, unless it is already set.
    #[must_use]
    pub fn with_system_hostname(mut self) -> Self {
        if self.host.is_none() {
            self.host = Some(gethostname::gethostname().to_string_lossy().into_owned());
        }
        self
    }
}

/// Turns [`LogEvent`]s into single-line JSON documents for the Datadog log intake.
///
/// The event is first written out by an [`EventSerializer`], then parsed back into an
/// [`OutputDocument`] and enriched with:
/// - `dd`: `{span_id, trace_id}` taken from the `dd_span_id` and `dd_trace_id` properties, added
///   only when the event has properties.
/// - `env` and `version` from the shared [`ServiceTagOverrides`].
/// - `ddsource`, and `service`, `host` and `ddtags` when configured.
///
/// `RenderedMessage` and `Level` are renamed to `message` and `level`, and `null` values are
/// dropped from the output.
///
/// A formatter holds no per-call state and may be shared between threads.
#[derive(Debug)]
pub struct LogFormatter<S = JsonEventSerializer> {
    source: String,
    service: Option<String>,
    host: Option<String>,
    tags: Option<String>,
    overrides: Arc<ServiceTagOverrides>,
    serializer: S,
}

impl LogFormatter {
    /// Creates a formatter using the [`JsonEventSerializer`].
    ///
    /// A missing `source` defaults to [`DEFAULT_SOURCE`]. `tags` are joined with `,` in the
    /// given order, without deduplication. No value is validated.
    pub fn new(
        source: Option<String>,
        service: Option<String>,
        host: Option<String>,
        tags: Option<Vec<String>>,
        overrides: Arc<ServiceTagOverrides>,
    ) -> Self {
        Self {
            source: source.unwrap_or_else(|| DEFAULT_SOURCE.to_owned()),
            service,
            host,
            tags: tags.map(|tags| tags.join(",")),
            overrides,
            serializer: JsonEventSerializer,
        }
    }

    /// Creates a formatter from a [`FormatterConfig`].
    pub fn from_config(config: FormatterConfig, overrides: Arc<ServiceTagOverrides>) -> Self {
        Self::new(
            config.source,
            config.service,
            config.host,
            config.tags,
            overrides,
        )
    }
}

impl<S> LogFormatter<S>
where
    S: EventSerializer,
{
    /// Replaces the base serializer.
    pub fn with_serializer<T: EventSerializer>(self, serializer: T) -> LogFormatter<T> {
        LogFormatter {
            source: self.source,
            service: self.service,
            host: self.host,
            tags: self.tags,
            overrides: self.overrides,
            serializer,
        }
    }

    /// The overrides this formatter reads `env` and `version` from.
    pub fn overrides(&self) -> &Arc<ServiceTagOverrides> {
        &self.overrides
    }

    /// Formats `event` into a single line of JSON, without a trailing newline.
    ///
    /// # Errors
    ///
    /// Fails only if the base serializer does not produce a JSON object, or produces one that
    /// already holds a key this formatter adds.
    pub fn format(&self, event: &LogEvent) -> Result<String, FormatterError> {
        let mut buffer = Vec::new();
        self.serializer.serialize(event, &mut buffer)?;

        let mut document = OutputDocument::parse(&buffer)?;
        self.enrich(&mut document)?;
        document.to_json_string()
    }

    /// Adds the Datadog attributes to `document` and renames framework keys.
    fn enrich(&self, document: &mut OutputDocument) -> Result<(), FormatterError> {
        // Only added when `Properties` exists and is an object.
        if let Some(Value::Object(properties)) = document.get(keys::intermediate::PROPERTIES) {
            let trace_context = Self::trace_context(properties);
            document.insert(keys::DD, trace_context)?;
        }

        document.insert(keys::ENV, self.overrides.env().map_or(Value::Null, Value::String))?;
        document.insert(
            keys::VERSION,
            self.overrides.version().map_or(Value::Null, Value::String),
        )?;

        document.insert(keys::DDSOURCE, self.source.as_str())?;
        document.insert_if_some(keys::SERVICE, self.service.as_deref())?;
        document.insert_if_some(keys::HOST, self.host.as_deref())?;
        document.insert_if_some(keys::DDTAGS, self.tags.as_deref())?;

        document.rename(keys::intermediate::RENDERED_MESSAGE, keys::MESSAGE)?;
        document.rename(keys::intermediate::LEVEL, keys::LEVEL)?;

        Ok(())
    }

    fn trace_context(properties: &Map<String, Value>) -> Value {
        let lookup = |key: &str| properties.get(key).cloned().unwrap_or(Value::Null);

        let mut trace_context = Map::new();
        trace_context.insert(keys::SPAN_ID.to_owned(), lookup(keys::DD_SPAN_ID_PROPERTY));
        trace_context.insert(keys::TRACE_ID.to_owned(), lookup(keys::DD_TRACE_ID_PROPERTY));
        Value::Object(trace_context)
    }
}
