//! Log pipeline that turns application log events into OpenTelemetry-shaped
//! records and fans them out to a console stream and, optionally, an
//! OpenSearch index.
//!
//! Events enter through [`Pipeline::emit`], the level helpers on
//! [`Pipeline`], or any `tracing` event once [`PipelineLayer`] is installed.
//! Remote delivery runs on a background worker pool and never blocks or
//! fails the caller.

pub mod attributes;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod event;
pub mod extract;
pub mod format;
pub mod http_metrics;
pub mod init;
pub mod layer;
pub mod memory_store;
pub mod noop_sink;
#[cfg(feature = "opensearch")]
pub mod opensearch;
pub mod pipeline;
pub mod pool;
pub mod record;
pub mod resource;
pub mod severity;
pub mod sink;
pub mod trace_context;
pub mod translate;
pub mod value;

/// `tracing` target of the crate's own diagnostics (formatting failures,
/// dropped or failed deliveries).
pub const INTERNAL_TARGET: &str = "tracing_log_pipeline::internal";

/// Events whose target starts with this prefix never enter the pipeline.
pub(crate) const CRATE_TARGET: &str = "tracing_log_pipeline";

pub use dispatch::{Dispatcher, SinkConfig, SinkTarget};
pub use error::{ConfigError, FormatError, InitError, SinkError, StoreError};
pub use event::{ExceptionInfo, LogEvent, RequestContext, SourceLocation};
pub use format::{Output, RenderMode};
pub use init::{build_pipeline, init_from_env, init_tracing, PipelineConfig};
pub use layer::PipelineLayer;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use record::LogRecord;
pub use resource::Resource;
pub use severity::{Level, Severity};
pub use sink::{LogSink, StoreSink, StreamSink, StructuredStore};
pub use translate::Translator;
pub use value::AttributeValue;
