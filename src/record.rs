use crate::attributes::BoundedAttributes;
use crate::event::SourceLocation;
use crate::resource::Resource;
use crate::severity::Severity;
use crate::trace_context::TraceContext;
use crate::value::AttributeValue;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Normalized log record produced by the [`Translator`](crate::translate::Translator).
///
/// Records are immutable: every field is fixed at translation time and only
/// exposed through accessors. Sinks share one record behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) observed_timestamp: DateTime<Utc>,
    pub(crate) severity: Severity,
    pub(crate) body: AttributeValue,
    pub(crate) attributes: BoundedAttributes,
    pub(crate) trace: TraceContext,
    pub(crate) resource: Arc<Resource>,
    pub(crate) source: SourceLocation,
    pub(crate) thread: Option<String>,
}

impl LogRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn observed_timestamp(&self) -> DateTime<Utc> {
        self.observed_timestamp
    }

    pub fn severity(&self) -> &Severity {
        &self.severity
    }

    pub fn severity_text(&self) -> &str {
        &self.severity.text
    }

    pub fn severity_number(&self) -> u8 {
        self.severity.number
    }

    pub fn body(&self) -> &AttributeValue {
        &self.body
    }

    pub fn attributes(&self) -> &BoundedAttributes {
        &self.attributes
    }

    pub fn dropped_attributes(&self) -> usize {
        self.attributes.dropped()
    }

    /// Zero when no span was active.
    pub fn trace_id(&self) -> u128 {
        self.trace.trace_id
    }

    /// Zero when no span was active.
    pub fn span_id(&self) -> u64 {
        self.trace.span_id
    }

    pub fn trace_flags(&self) -> u8 {
        self.trace.trace_flags
    }

    /// Whether the record was emitted inside an active span.
    pub fn has_trace(&self) -> bool {
        self.trace.trace_id != 0 && self.trace.span_id != 0
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn source(&self) -> &SourceLocation {
        &self.source
    }

    pub fn thread(&self) -> Option<&str> {
        self.thread.as_deref()
    }
}
