//! [`tracing_subscriber::Layer`]s that feed [`tracing`] events into a [`LogFormatter`].
//!
//! [`SpanFieldsLayer`] keeps the fields recorded on spans, and [`DatadogFormattingLayer`] turns
//! every event into a [`LogEvent`] carrying both the event's and its spans' fields as properties.
//! Recording `dd_trace_id` and `dd_span_id` on a span is enough for every event inside it to be
//! correlated with the trace:
//!
//! ```
//! use std::sync::Arc;
//!
//! use dd_log_formatter::{
//!     DatadogFormattingLayer, LogFormatter, ServiceTagOverrides, SpanFieldsLayer,
//! };
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! let formatter = LogFormatter::new(
//!     None,
//!     Some("checkout".to_string()),
//!     None,
//!     None,
//!     Arc::new(ServiceTagOverrides::default()),
//! );
//!
//! let subscriber = tracing_subscriber::registry()
//!     .with(SpanFieldsLayer::default())
//!     .with(DatadogFormattingLayer::new(formatter, std::io::stdout));
//!
//! tracing::subscriber::with_default(subscriber, || {
//!     let span = tracing::info_span!("request", dd_trace_id = "1234", dd_span_id = "5678");
//!     let _guard = span.enter();
//!     tracing::info!(order_id = 42, "order placed");
//! });
//! ```
//!
//! [`LogFormatter`]: crate::LogFormatter
//! [`LogEvent`]: crate::LogEvent

mod formatting;
mod storage;

pub use self::{formatting::DatadogFormattingLayer, storage::SpanFieldsLayer};
