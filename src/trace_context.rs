use opentelemetry::trace::TraceContextExt;

/// Identifiers of the span active when a log call is made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: u128,
    pub span_id: u64,
    pub trace_flags: u8,
}

impl TraceContext {
    pub const SAMPLED: u8 = 0x01;

    pub fn new(trace_id: u128, span_id: u64, trace_flags: u8) -> Self {
        TraceContext { trace_id, span_id, trace_flags }
    }

    pub fn is_sampled(&self) -> bool {
        self.trace_flags & Self::SAMPLED != 0
    }
}

/// Source of the ambient trace context. Read-only.
pub trait TraceContextProvider: Send + Sync {
    /// Context of the currently active span, or `None` if there is none.
    fn current(&self) -> Option<TraceContext>;
}

/// Reads the span attached to the current [`opentelemetry::Context`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OtelContextProvider;

impl TraceContextProvider for OtelContextProvider {
    fn current(&self) -> Option<TraceContext> {
        let cx = opentelemetry::Context::current();
        let span = cx.span();
        let sc = span.span_context();
        if !sc.is_valid() {
            return None;
        }
        Some(TraceContext {
            trace_id: u128::from_be_bytes(sc.trace_id().to_bytes()),
            span_id: u64::from_be_bytes(sc.span_id().to_bytes()),
            trace_flags: sc.trace_flags().to_u8(),
        })
    }
}

/// Provider for hosts without tracing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTraceContext;

impl TraceContextProvider for NoTraceContext {
    fn current(&self) -> Option<TraceContext> {
        None
    }
}

/// Always reports the same context.
#[derive(Debug, Clone, Copy)]
pub struct FixedTraceContext(pub TraceContext);

impl TraceContextProvider for FixedTraceContext {
    fn current(&self) -> Option<TraceContext> {
        Some(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};

    #[test]
    fn no_active_span_yields_none() {
        assert_eq!(OtelContextProvider.current(), None);
    }

    #[test]
    fn reads_attached_span_context() {
        let sc = SpanContext::new(
            TraceId::from_bytes(0xabcdu128.to_be_bytes()),
            SpanId::from_bytes(0x42u64.to_be_bytes()),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let _guard = opentelemetry::Context::current()
            .with_remote_span_context(sc)
            .attach();

        let tc = OtelContextProvider.current().unwrap();
        assert_eq!(tc.trace_id, 0xabcd);
        assert_eq!(tc.span_id, 0x42);
        assert!(tc.is_sampled());
    }
}
