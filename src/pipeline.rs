use crate::dispatch::{Dispatcher, SinkConfig, SinkTarget};
use crate::error::InitError;
use crate::event::{LogEvent, SourceLocation};
use crate::pool::{DeliveryCounts, DeliveryPool, PoolConfig};
use crate::resource::Resource;
use crate::severity::Level;
use crate::sink::{LogSink, StreamSink};
use crate::trace_context::TraceContextProvider;
use crate::translate::Translator;
use crate::value::AttributeValue;
use std::panic::Location;
use std::sync::Arc;
use tokio::time::Duration;

/// Process-wide logging context: translation settings, sinks and the
/// delivery pool. Built once at startup and shared by reference.
pub struct Pipeline {
    translator: Translator,
    dispatcher: Dispatcher,
    min_level: Option<Level>,
}

impl Pipeline {
    pub fn new(translator: Translator, dispatcher: Dispatcher) -> Self {
        let min_level = dispatcher.sink_configs().map(|c| c.min_level).min();
        Pipeline { translator, dispatcher, min_level }
    }

    pub fn builder(resource: Resource) -> PipelineBuilder {
        PipelineBuilder::new(resource)
    }

    /// Whether any sink would accept a record at `level`.
    pub fn enabled(&self, level: Level) -> bool {
        self.min_level.is_some_and(|min| min <= level)
    }

    /// Translate an event and hand it to every eligible sink.
    ///
    /// Never blocks on remote delivery and never fails.
    pub fn emit(&self, event: LogEvent) {
        if !self.enabled(event.level) {
            return;
        }
        let record = self.translator.translate(event);
        self.dispatcher.dispatch(&record);
    }

    /// Emit a plain message, recording the caller's file and line.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<AttributeValue>) {
        let caller = Location::caller();
        let location = SourceLocation {
            name: self.translator.resource().service_name().unwrap_or_default().to_string(),
            function: None,
            file: Some(caller.file().to_string()),
            line: Some(caller.line()),
        };
        self.emit(LogEvent::new(level, message).location(location));
    }

    #[track_caller]
    pub fn trace(&self, message: impl Into<AttributeValue>) {
        self.log(Level::Trace, message)
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<AttributeValue>) {
        self.log(Level::Debug, message)
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<AttributeValue>) {
        self.log(Level::Info, message)
    }

    #[track_caller]
    pub fn success(&self, message: impl Into<AttributeValue>) {
        self.log(Level::Success, message)
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<AttributeValue>) {
        self.log(Level::Warning, message)
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<AttributeValue>) {
        self.log(Level::Error, message)
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<AttributeValue>) {
        self.log(Level::Critical, message)
    }

    /// Timing report at the `PERFORMANCE` level.
    #[track_caller]
    pub fn perf(&self, message: impl Into<AttributeValue>) {
        self.log(Level::Performance, message)
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Delivery counters, if remote sinks are configured.
    pub fn delivery_stats(&self) -> Option<DeliveryCounts> {
        self.dispatcher.pool().map(DeliveryPool::stats)
    }

    /// Stop remote delivery, waiting up to `grace` for queued records, and
    /// flush all sinks.
    pub async fn shutdown(&self, grace: Duration) {
        self.dispatcher.shutdown(grace).await;
    }
}

/// Step-by-step assembly of a [`Pipeline`].
pub struct PipelineBuilder {
    resource: Resource,
    attribute_limit: Option<usize>,
    provider: Option<Arc<dyn TraceContextProvider>>,
    pool: PoolConfig,
    sinks: Vec<(SinkConfig, SinkTarget)>,
}

impl PipelineBuilder {
    pub fn new(resource: Resource) -> Self {
        PipelineBuilder {
            resource,
            attribute_limit: None,
            provider: None,
            pool: PoolConfig::default(),
            sinks: Vec::new(),
        }
    }

    pub fn attribute_limit(mut self, limit: Option<usize>) -> Self {
        self.attribute_limit = limit;
        self
    }

    pub fn trace_provider(mut self, provider: Arc<dyn TraceContextProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn pool(mut self, config: PoolConfig) -> Self {
        self.pool = config;
        self
    }

    pub fn stream_sink(mut self, config: SinkConfig, sink: StreamSink) -> Self {
        self.sinks.push((config, SinkTarget::Stream(sink)));
        self
    }

    pub fn remote_sink(mut self, config: SinkConfig, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push((config, SinkTarget::Remote(sink)));
        self
    }

    /// Assemble the pipeline. Starting the delivery pool needs a Tokio
    /// runtime, so this fails outside one when remote sinks are configured.
    pub fn build(self) -> Result<Pipeline, InitError> {
        let mut translator =
            Translator::new(Arc::new(self.resource)).with_attribute_limit(self.attribute_limit);
        if let Some(provider) = self.provider {
            translator = translator.with_provider(provider);
        }

        let needs_pool = self.sinks.iter().any(|(_, t)| matches!(t, SinkTarget::Remote(_)));
        let mut dispatcher = if needs_pool {
            Dispatcher::with_pool(DeliveryPool::start(self.pool)?)
        } else {
            Dispatcher::new()
        };
        for (config, target) in self.sinks {
            dispatcher.add_sink(config, target);
        }

        Ok(Pipeline::new(translator, dispatcher))
    }
}
