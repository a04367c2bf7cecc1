use crate::event::{ExceptionInfo, LogEvent, SourceLocation};
use crate::pipeline::Pipeline;
use crate::pool::in_delivery_task;
use crate::severity::Level;
use crate::value::AttributeValue;
use crate::CRATE_TARGET;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns `tracing` events into
/// [`LogEvent`]s and emits them through a [`Pipeline`].
///
/// The `message` field becomes the body, every other field an attribute,
/// and an `error` field recorded as `dyn Error` becomes exception info.
///
/// Events raised while shipping records are skipped: this crate's own
/// diagnostics, anything emitted on a delivery worker, and the HTTP stack
/// used by remote stores (see [`is_delivery_target`]).
pub struct PipelineLayer {
    pipeline: Arc<Pipeline>,
}

impl PipelineLayer {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        PipelineLayer { pipeline }
    }
}

/// Crates on the remote delivery path. They also log from connection
/// tasks that run outside the delivery workers.
const DELIVERY_CRATES: [&str; 9] = [
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
    "tokio_rustls",
    "want",
    "mio",
    "tower",
];

/// Whether events with this target belong to the delivery path and must
/// stay out of the pipeline.
pub fn is_delivery_target(target: &str) -> bool {
    target.starts_with(CRATE_TARGET)
        || DELIVERY_CRATES.iter().any(|krate| {
            target
                .strip_prefix(krate)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
        })
}

/// Map `tracing` levels onto the native scale.
pub fn level_from_tracing(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::TRACE => Level::Trace,
        tracing::Level::DEBUG => Level::Debug,
        tracing::Level::INFO => Level::Info,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::ERROR => Level::Error,
    }
}

impl<S> Layer<S> for PipelineLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_delivery_target(meta.target()) || in_delivery_task() {
            return;
        }
        let level = level_from_tracing(meta.level());
        if !self.pipeline.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let location = SourceLocation {
            name: meta.module_path().unwrap_or(meta.target()).to_string(),
            function: None,
            file: meta.file().map(str::to_string),
            line: meta.line(),
        };

        let mut log_event = LogEvent::new(level, visitor.message.unwrap_or_default()).location(location);
        log_event.fields = visitor.fields;
        log_event.exception = visitor.exception;

        self.pipeline.emit(log_event);
    }
}

#[derive(Default)]
pub struct FieldVisitor {
    pub fields: Vec<(String, AttributeValue)>,
    pub message: Option<String>,
    pub exception: Option<ExceptionInfo>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: AttributeValue) {
        self.fields.push((field.name().to_string(), value));
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, value.into());
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if field.name() == "error" {
            self.exception = Some(ExceptionInfo::from_dyn(value));
        } else {
            self.push(field, AttributeValue::display(value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.push(field, AttributeValue::debug(value));
        }
    }
}
