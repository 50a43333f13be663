//! Provides a [`tracing_subscriber::Layer`] ([`DatadogFormattingLayer`]) that writes every event
//! as a Datadog-enriched JSON line.

use std::io::Write;

use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    fmt::MakeWriter,
    layer::Context,
    registry::{LookupSpan, SpanRef},
    Layer,
};

use super::storage::Storage;
use crate::{
    event::{LogEvent, LogLevel},
    formatter::LogFormatter,
    serializer::{EventSerializer, JsonEventSerializer},
};

/// Property holding the target of the tracing event.
const SOURCE_CONTEXT: &str = "SourceContext";

/// A [`tracing_subscriber::Layer`] that converts tracing events into [`LogEvent`]s, formats them
/// with a [`LogFormatter`] and writes one line per event to a [`MakeWriter`].
///
/// Event fields become properties of the [`LogEvent`], along with the fields of the enclosing
/// spans captured by [`SpanFieldsLayer`][super::SpanFieldsLayer], if that layer is installed.
/// Event fields take precedence over span fields of the same name. The event's target is added
/// as the `SourceContext` property.
///
/// Events that fail to format are dropped; reporting them through `tracing` would feed them back
/// into this layer.
#[derive(Debug)]
pub struct DatadogFormattingLayer<W, S = JsonEventSerializer>
where
    W: for<'a> MakeWriter<'a> + 'static,
    S: EventSerializer,
{
    formatter: LogFormatter<S>,
    dst_writer: W,
}

impl<W, S> DatadogFormattingLayer<W, S>
where
    W: for<'a> MakeWriter<'a> + 'static,
    S: EventSerializer,
{
    /// Creates a new [`DatadogFormattingLayer`] writing lines produced by `formatter` to
    /// `dst_writer`.
    pub fn new(formatter: LogFormatter<S>, dst_writer: W) -> Self {
        Self {
            formatter,
            dst_writer,
        }
    }

    /// The formatter used by this layer.
    pub fn formatter(&self) -> &LogFormatter<S> {
        &self.formatter
    }

    /// Write a formatted line followed by a newline.
    ///
    /// Should be done by a single `write_all` call to avoid fragmentation of log because of
    /// multithreading.
    fn flush(&self, line: String) -> Result<(), std::io::Error> {
        let mut buffer = line.into_bytes();
        buffer.push(b'\n');
        self.dst_writer.make_writer().write_all(&buffer)
    }

    /// Builds a [`LogEvent`] from a tracing event and the span it was emitted in.
    fn log_event<R>(event: &Event<'_>, span: Option<&SpanRef<'_, R>>) -> LogEvent
    where
        R: Subscriber + for<'a> LookupSpan<'a>,
    {
        let mut storage = Storage::default();
        event.record(&mut storage);

        let metadata = event.metadata();
        let mut properties = Map::new();

        if let Some(span) = span {
            let extensions = span.extensions();
            if let Some(span_storage) = extensions.get::<Storage>() {
                properties.extend(span_storage.values().clone());
            }
        }
        for (key, value) in storage.values() {
            properties.insert(key.clone(), value.clone());
        }
        properties.insert(
            SOURCE_CONTEXT.to_owned(),
            Value::from(metadata.target()),
        );

        // Obtain the value of the `message` field if set, or the `target` from metadata otherwise.
        let message = storage.message().unwrap_or_else(|| metadata.target());

        LogEvent {
            timestamp: OffsetDateTime::now_utc(),
            level: LogLevel::from(*metadata.level()),
            message_template: message.to_owned(),
            rendered_message: Some(message.to_owned()),
            exception: None,
            properties,
        }
    }
}

impl<R, W, S> Layer<R> for DatadogFormattingLayer<W, S>
where
    R: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'a> MakeWriter<'a> + 'static,
    S: EventSerializer + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, R>) {
        // Obtain the parent span for the event
        let span = ctx.lookup_current();

        let log_event = Self::log_event(event, span.as_ref());
        if let Ok(line) = self.formatter.format(&log_event) {
            let _ = self.flush(line);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

    use std::{
        collections::HashMap,
        io,
        sync::{Arc, Mutex},
    };

    use serde_json::json;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;
    use crate::{layer::SpanFieldsLayer, overrides::ServiceTagOverrides};

    #[derive(Clone, Default)]
    struct TestWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for TestWriter {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl TestWriter {
        fn lines(&self) -> Vec<Map<String, Value>> {
            let buffer = self.0.lock().unwrap().clone();
            String::from_utf8(buffer)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    fn formatter() -> LogFormatter {
        let overrides = Arc::new(ServiceTagOverrides::new(HashMap::from([(
            "DD_ENV".to_string(),
            "test".to_string(),
        )])));
        LogFormatter::new(
            Some("rust".to_string()),
            Some("checkout".to_string()),
            Some("box1".to_string()),
            Some(vec!["team:payments".to_string()]),
            overrides,
        )
    }

    #[test]
    fn events_are_written_as_enriched_lines() {
        let writer = TestWriter::default();
        let subscriber = tracing_subscriber::registry()
            .with(SpanFieldsLayer)
            .with(DatadogFormattingLayer::new(formatter(), writer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "payments", attempt = 3_u64, "card declined");
        });

        let lines = writer.lines();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["message"], "card declined");
        assert_eq!(line["level"], "Warning");
        assert_eq!(line["ddsource"], "rust");
        assert_eq!(line["service"], "checkout");
        assert_eq!(line["host"], "box1");
        assert_eq!(line["ddtags"], "team:payments");
        assert_eq!(line["env"], "test");
        assert!(!line.contains_key("version"));
        assert_eq!(
            line["Properties"],
            json!({"attempt": 3, "SourceContext": "payments"})
        );
        assert_eq!(line["dd"], json!({}));
    }

    #[test]
    fn span_fields_provide_trace_correlation() {
        let writer = TestWriter::default();
        let subscriber = tracing_subscriber::registry()
            .with(SpanFieldsLayer)
            .with(DatadogFormattingLayer::new(formatter(), writer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("request", dd_trace_id = "T", dd_span_id = "S");
            let _guard = span.enter();
            tracing::info!(dd_span_id = "S2", "handled");
        });

        let lines = writer.lines();
        assert_eq!(lines[0]["dd"], json!({"span_id": "S2", "trace_id": "T"}));
        assert_eq!(lines[0]["Properties"]["dd_trace_id"], "T");
    }

    #[test]
    fn works_without_span_storage() {
        let writer = TestWriter::default();
        let subscriber = tracing_subscriber::registry()
            .with(DatadogFormattingLayer::new(formatter(), writer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("request", dd_trace_id = "T");
            let _guard = span.enter();
            tracing::error!("failed");
        });

        let lines = writer.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "Error");
        assert_eq!(lines[0]["dd"], json!({}));
    }

    #[test]
    fn each_event_is_one_line() {
        let writer = TestWriter::default();
        let subscriber = tracing_subscriber::registry()
            .with(DatadogFormattingLayer::new(formatter(), writer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("first\nwith newline");
            tracing::debug!(payload = ?vec![1, 2], "second");
        });

        let lines = writer.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["message"], "first\nwith newline");
        assert_eq!(lines[1]["Properties"]["payload"], "[1, 2]");
        assert_eq!(lines[1]["level"], "Debug");
    }

    #[test]
    fn message_falls_back_to_target() {
        let writer = TestWriter::default();
        let subscriber = tracing_subscriber::registry()
            .with(DatadogFormattingLayer::new(formatter(), writer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "jobs", job_id = 9_u64);
        });

        assert_eq!(writer.lines()[0]["message"], "jobs");
    }
}
