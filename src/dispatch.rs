use crate::format::{render, RenderMode};
use crate::pool::{DeliveryJob, DeliveryPool};
use crate::record::LogRecord;
use crate::severity::Level;
use crate::sink::{LogSink, StreamSink};
use crate::INTERNAL_TARGET;
use std::sync::Arc;
use tokio::time::Duration;

/// How a sink wants records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    pub name: String,
    /// Records below this level are skipped.
    pub min_level: Level,
    pub mode: RenderMode,
    pub colorize: bool,
}

impl SinkConfig {
    pub fn new(name: impl Into<String>, min_level: Level, mode: RenderMode) -> Self {
        SinkConfig { name: name.into(), min_level, mode, colorize: false }
    }

    pub fn colorize(mut self, colorize: bool) -> Self {
        self.colorize = colorize;
        self
    }

    pub fn accepts(&self, record: &LogRecord) -> bool {
        self.min_level.ordinal() <= record.severity().ordinal
    }
}

/// Where rendered records go.
pub enum SinkTarget {
    /// Written inline by the emitting thread.
    Stream(StreamSink),
    /// Handed to the delivery pool.
    Remote(Arc<dyn LogSink>),
}

struct SinkEntry {
    config: SinkConfig,
    name: Arc<str>,
    target: SinkTarget,
}

/// Fans a record out to every configured sink whose threshold it passes.
///
/// Sink failures are reported on the internal diagnostics target and never
/// reach the caller.
pub struct Dispatcher {
    sinks: Vec<SinkEntry>,
    pool: Option<DeliveryPool>,
}

impl Dispatcher {
    /// Dispatcher with inline sinks only; remote sinks need a pool.
    pub fn new() -> Self {
        Dispatcher { sinks: Vec::new(), pool: None }
    }

    pub fn with_pool(pool: DeliveryPool) -> Self {
        Dispatcher { sinks: Vec::new(), pool: Some(pool) }
    }

    pub fn add_sink(&mut self, config: SinkConfig, target: SinkTarget) {
        let name: Arc<str> = Arc::from(config.name.as_str());
        self.sinks.push(SinkEntry { config, name, target });
    }

    pub fn sink_configs(&self) -> impl Iterator<Item = &SinkConfig> {
        self.sinks.iter().map(|s| &s.config)
    }

    pub fn pool(&self) -> Option<&DeliveryPool> {
        self.pool.as_ref()
    }

    /// Render and deliver a record to every eligible sink, in order.
    pub fn dispatch(&self, record: &LogRecord) {
        for entry in self.sinks.iter().filter(|s| s.config.accepts(record)) {
            let output = render(record, entry.config.mode, entry.config.colorize);
            match &entry.target {
                SinkTarget::Stream(stream) => {
                    if let Err(e) = stream.write(&output) {
                        tracing::warn!(target: INTERNAL_TARGET, sink = %entry.name, error = %e, "failed to write log record");
                    }
                }
                SinkTarget::Remote(sink) => match &self.pool {
                    Some(pool) => {
                        pool.submit(DeliveryJob {
                            sink_name: Arc::clone(&entry.name),
                            sink: Arc::clone(sink),
                            output,
                        });
                    }
                    None => {
                        tracing::warn!(target: INTERNAL_TARGET, sink = %entry.name, "no delivery pool configured, dropping record");
                    }
                },
            }
        }
    }

    /// Drain the pool, then flush every sink.
    pub async fn shutdown(&self, grace: Duration) {
        if let Some(pool) = &self.pool {
            pool.shutdown(grace).await;
        }
        for entry in &self.sinks {
            let result = match &entry.target {
                SinkTarget::Stream(stream) => stream.flush().await,
                SinkTarget::Remote(sink) => sink.flush().await,
            };
            if let Err(e) = result {
                tracing::warn!(target: INTERNAL_TARGET, sink = %entry.name, error = %e, "failed to flush sink");
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LogEvent;
    use crate::memory_store::MemoryStore;
    use crate::pool::PoolConfig;
    use crate::resource::Resource;
    use crate::sink::StoreSink;
    use crate::trace_context::NoTraceContext;
    use crate::translate::Translator;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    fn record(level: Level, msg: &str) -> LogRecord {
        Translator::new(Arc::new(Resource::new("app", "test")))
            .with_provider(Arc::new(NoTraceContext))
            .translate(LogEvent::new(level, msg))
    }

    #[test]
    fn thresholds_are_per_sink() {
        let verbose = SharedBuf::default();
        let quiet = SharedBuf::default();
        let mut d = Dispatcher::new();
        d.add_sink(
            SinkConfig::new("verbose", Level::Trace, RenderMode::Human),
            SinkTarget::Stream(StreamSink::new(Box::new(verbose.clone()))),
        );
        d.add_sink(
            SinkConfig::new("quiet", Level::Error, RenderMode::Machine),
            SinkTarget::Stream(StreamSink::new(Box::new(quiet.clone()))),
        );

        d.dispatch(&record(Level::Debug, "details"));
        d.dispatch(&record(Level::Error, "broken"));

        assert_eq!(verbose.lines().len(), 2);
        let quiet_lines = quiet.lines();
        assert_eq!(quiet_lines.len(), 1);
        let doc: serde_json::Value = serde_json::from_str(&quiet_lines[0]).unwrap();
        assert_eq!(doc["body"], "broken");
    }

    #[test]
    fn threshold_is_inclusive() {
        let cfg = SinkConfig::new("s", Level::Warning, RenderMode::Human);
        assert!(cfg.accepts(&record(Level::Warning, "w")));
        assert!(!cfg.accepts(&record(Level::Success, "s")));
        assert!(cfg.accepts(&record(Level::Performance, "p")));
    }

    #[test]
    fn remote_sink_without_pool_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let mut d = Dispatcher::new();
        d.add_sink(
            SinkConfig::new("store", Level::Trace, RenderMode::Machine),
            SinkTarget::Remote(Arc::new(StoreSink::new(Arc::clone(&store), "logs", serde_json::json!({})))),
        );
        d.dispatch(&record(Level::Info, "dropped"));
        assert!(store.destinations().is_empty());
    }

    #[tokio::test]
    async fn remote_delivery_goes_through_pool() {
        let store = Arc::new(MemoryStore::new());
        let mut d = Dispatcher::with_pool(DeliveryPool::start(PoolConfig::default()).unwrap());
        d.add_sink(
            SinkConfig::new("store", Level::Info, RenderMode::Machine),
            SinkTarget::Remote(Arc::new(StoreSink::new(Arc::clone(&store), "logs", serde_json::json!({})))),
        );

        d.dispatch(&record(Level::Debug, "below threshold"));
        d.dispatch(&record(Level::Info, "kept"));
        // Nothing is delivered until the workers get to run.
        assert!(store.documents("logs").is_empty());

        d.shutdown(Duration::from_secs(5)).await;
        let docs = store.documents("logs");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["body"], "kept");
        assert_eq!(docs[0]["severity_text"], "INFO");
    }
}
