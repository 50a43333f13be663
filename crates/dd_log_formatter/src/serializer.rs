//! Base serialization of a [`LogEvent`] into its intermediate JSON representation.

use serde::ser::{SerializeMap, Serializer};
use time::format_description::well_known::Rfc3339;

use crate::{event::LogEvent, keys::intermediate as keys, FormatterError};

/// Converts a [`LogEvent`] into the JSON object the [`LogFormatter`][crate::LogFormatter]
/// enriches.
///
/// Implementations must write exactly one JSON object. Its custom properties, if any, are
/// expected under the `Properties` key, the rendered message under `RenderedMessage` and the
/// severity under `Level`.
pub trait EventSerializer: Send + Sync {
    /// Appends the JSON representation of `event` to `buffer`.
    fn serialize(&self, event: &LogEvent, buffer: &mut Vec<u8>) -> Result<(), FormatterError>;
}

/// Writes events in the compact layout used by structured logging frameworks:
///
/// ```json
/// {"Timestamp":"...","Level":"Information","MessageTemplate":"...","RenderedMessage":"...","Properties":{...}}
/// ```
///
/// `RenderedMessage`, `Exception` and `Properties` are left out when the event has nothing to
/// put there.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonEventSerializer;

impl EventSerializer for JsonEventSerializer {
    fn serialize(&self, event: &LogEvent, buffer: &mut Vec<u8>) -> Result<(), FormatterError> {
        let mut serializer = serde_json::Serializer::new(buffer);
        let mut map_serializer = serializer
            .serialize_map(None)
            .map_err(FormatterError::Serialization)?;

        if let Ok(timestamp) = event.timestamp.format(&Rfc3339) {
            map_serializer
                .serialize_entry(keys::TIMESTAMP, &timestamp)
                .map_err(FormatterError::Serialization)?;
        }
        map_serializer
            .serialize_entry(keys::LEVEL, event.level.as_str())
            .map_err(FormatterError::Serialization)?;
        map_serializer
            .serialize_entry(keys::MESSAGE_TEMPLATE, &event.message_template)
            .map_err(FormatterError::Serialization)?;

        if let Some(rendered_message) = &event.rendered_message {
            map_serializer
                .serialize_entry(keys::RENDERED_MESSAGE, rendered_message)
                .map_err(FormatterError::Serialization)?;
        }
        if let Some(exception) = &event.exception {
            map_serializer
                .serialize_entry(keys::EXCEPTION, exception)
                .map_err(FormatterError::Serialization)?;
        }
        if !event.properties.is_empty() {
            map_serializer
                .serialize_entry(keys::PROPERTIES, &event.properties)
                .map_err(FormatterError::Serialization)?;
        }

        map_serializer.end().map_err(FormatterError::Serialization)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::indexing_slicing)]

    use serde_json::{json, Value};
    use time::macros::datetime;

    use super::*;
    use crate::event::LogLevel;

    fn serialize(event: &LogEvent) -> Value {
        let mut buffer = Vec::new();
        JsonEventSerializer
            .serialize(event, &mut buffer)
            .expect("serialization of a built-in event succeeds");
        serde_json::from_slice(&buffer).expect("serializer output is valid JSON")
    }

    #[test]
    fn writes_expected_layout() {
        let event = LogEvent::new(LogLevel::Warning, "disk at 91%")
            .with_template("disk at {Percent}%")
            .with_timestamp(datetime!(2024-03-01 12:30:00 UTC))
            .with_property("Percent", 91);

        assert_eq!(
            serialize(&event),
            json!({
                "Timestamp": "2024-03-01T12:30:00Z",
                "Level": "Warning",
                "MessageTemplate": "disk at {Percent}%",
                "RenderedMessage": "disk at 91%",
                "Properties": {"Percent": 91},
            })
        );
    }

    #[test]
    fn omits_empty_sections() {
        let mut event = LogEvent::new(LogLevel::Information, "ping");
        event.rendered_message = None;

        let value = serialize(&event);
        let object = value.as_object().expect("serializer output is an object");
        assert!(!object.contains_key("Properties"));
        assert!(!object.contains_key("RenderedMessage"));
        assert!(!object.contains_key("Exception"));
    }

    #[test]
    fn writes_exception_when_present() {
        let event = LogEvent::new(LogLevel::Error, "boom").with_exception("io error: refused");
        assert_eq!(serialize(&event)["Exception"], "io error: refused");
    }

    #[test]
    fn output_is_single_line() {
        let event = LogEvent::new(LogLevel::Information, "multi\nline")
            .with_property("nested", json!({"a": [1, 2, {"b": null}]}));

        let mut buffer = Vec::new();
        JsonEventSerializer
            .serialize(&event, &mut buffer)
            .expect("serialization of a built-in event succeeds");
        assert!(!buffer.contains(&b'\n'));
    }
}
