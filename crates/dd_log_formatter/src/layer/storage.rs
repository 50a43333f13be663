//! Provides a [`tracing_subscriber::Layer`] ([`SpanFieldsLayer`]) for capturing the fields
//! recorded on tracing spans.

use std::fmt;

use serde_json::{Map, Value};
use tracing::{
    field::{Field, Visit},
    span::{Attributes, Record},
    Id, Subscriber,
};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

/// Field name tracing uses for an event's formatted message.
const MESSAGE_FIELD: &str = "message";

/// A [`tracing_subscriber::Layer`] that stores span fields within span extensions.
///
/// A new span starts with a copy of its parent's fields, so fields recorded on an outer span
/// (such as trace identifiers) are visible to events emitted in any nested span.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpanFieldsLayer;

/// Holds key-value data recorded for a span or an event.
#[derive(Clone, Debug, Default)]
pub(crate) struct Storage {
    /// The collected key-value pairs, in recording order.
    values: Map<String, Value>,

    /// The formatted message of an event, if captured.
    message: Option<String>,
}

impl Storage {
    /// Records a key-value pair, stripping the `r#` prefix of raw identifiers.
    pub(crate) fn record_value(&mut self, key: &str, value: Value) {
        let key = key.strip_prefix("r#").unwrap_or(key);
        self.values.insert(key.to_owned(), value);
    }

    pub(crate) fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub(crate) fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn record_message(&mut self, field: &Field, value: impl FnOnce() -> String) -> bool {
        if field.name() != MESSAGE_FIELD {
            return false;
        }
        if self.message.is_none() {
            self.message = Some(value());
        }
        true
    }
}

// Implement `Visit` to capture span or event fields into the `Storage` map.
impl Visit for Storage {
    fn record_f64(&mut self, field: &Field, value: f64) {
        if !self.record_message(field, || value.to_string()) {
            self.record_value(field.name(), Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if !self.record_message(field, || value.to_string()) {
            self.record_value(field.name(), Value::from(value));
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if !self.record_message(field, || value.to_string()) {
            self.record_value(field.name(), Value::from(value));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if !self.record_message(field, || value.to_string()) {
            self.record_value(field.name(), Value::from(value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE_FIELD {
            self.message = Some(value.to_string()); // `record_str()` is preferred for `message`
        } else {
            self.record_value(field.name(), Value::from(value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if self.record_message(field, || format!("{value:?}")) {
            return;
        }
        match field.name() {
            // Metadata forwarded by `tracing-log` is already part of the event's metadata
            name if name.starts_with("log.") => (),
            name => self.record_value(name, Value::from(format!("{value:?}"))),
        }
    }
}

impl<S> Layer<S> for SpanFieldsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        // Inherit storage from parent span if it exists, otherwise create a new one.
        let mut storage = if let Some(parent) = span.parent() {
            parent
                .extensions()
                .get::<Storage>()
                .cloned()
                .unwrap_or_default()
        } else {
            Storage::default()
        };

        attrs.record(&mut storage);
        if storage.message.take().is_some() {
            tracing::warn!(
                "Span `{}` recorded a `{MESSAGE_FIELD}` field, which is only used for events. \
                 Skipping.",
                span.name()
            );
        }

        span.extensions_mut().insert(storage);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(storage) = extensions.get_mut::<Storage>() {
            values.record(storage);
            storage.message = None;
        }
    }
}
