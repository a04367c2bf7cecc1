use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::time::Duration;
use tracing_log_pipeline::memory_store::MemoryStore;
use tracing_log_pipeline::pool::PoolConfig;
use tracing_log_pipeline::sink::SinkState;
use tracing_log_pipeline::trace_context::{FixedTraceContext, NoTraceContext, TraceContext};
use tracing_log_pipeline::{
    ExceptionInfo, Level, LogEvent, LogSink, Pipeline, RenderMode, RequestContext, Resource,
    SinkConfig, SourceLocation, StoreSink, StreamSink,
};

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
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn quick_pool() -> PoolConfig {
    PoolConfig {
        workers: 4,
        queue_capacity: 256,
        attempt_timeout: Duration::from_millis(200),
        max_retries: 1,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn record_reaches_console_and_store() {
    let console = SharedBuf::default();
    let store = Arc::new(MemoryStore::new());
    let schema = json!({"mappings": {"properties": {"body": {"type": "text"}}}});
    let sink = Arc::new(StoreSink::new(Arc::clone(&store), "logs_commons", schema.clone()));

    let pipeline = Pipeline::builder(Resource::new("app1", "test"))
        .trace_provider(Arc::new(FixedTraceContext(TraceContext::new(0xabc, 0x12, 1))))
        .pool(quick_pool())
        .stream_sink(
            SinkConfig::new("console", Level::Trace, RenderMode::Human),
            StreamSink::new(Box::new(console.clone())),
        )
        .remote_sink(
            SinkConfig::new("store", Level::Info, RenderMode::Machine),
            Arc::clone(&sink) as Arc<dyn LogSink>,
        )
        .build()
        .unwrap();

    let location = SourceLocation {
        name: "app.users".into(),
        function: Some("get_user".into()),
        file: Some("users.rs".into()),
        line: Some(12),
    };
    pipeline.emit(
        LogEvent::new(Level::Warning, "user %s not found")
            .arg("bob")
            .location(location)
            .field("user_id", 7)
            .field("lineno", 99)
            .field("request", "shadowed")
            .request(RequestContext::new("10.0.0.1", "/user/7"))
            .exception(ExceptionInfo {
                type_name: Some("KeyError".into()),
                message: Some("bob".into()),
                stacktrace: None,
            }),
    );
    pipeline.debug("console only");
    pipeline.shutdown(Duration::from_secs(5)).await;

    let text = console.text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(" | WARN     | app.users:get_user:12 - user bob not found :: user_id=7 "));
    assert!(lines[1].contains(" | DEBUG    | app1:?:"));

    let docs = store.documents("logs_commons");
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc["body"], "user bob not found");
    assert_eq!(doc["severity_text"], "WARN");
    assert_eq!(doc["severity_number"], 13);
    assert_eq!(
        doc["attributes"],
        json!({
            "user_id": 7,
            "server.address": "10.0.0.1",
            "url.path": "/user/7",
            "exception.type": "KeyError",
            "exception.message": "bob",
        })
    );
    assert_eq!(doc["trace_id"], "0x00000000000000000000000000000abc");
    assert_eq!(doc["span_id"], "0x0000000000000012");
    assert_eq!(doc["trace_flags"], 1);
    assert_eq!(doc["resource"]["attributes"]["service.name"], "app1");
    assert_eq!(doc["text"].as_str().unwrap(), lines[0]);

    assert_eq!(store.schema("logs_commons"), Some(schema));
    assert_eq!(sink.state(), SinkState::Active);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_writes_create_destination_once() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(2)));
    let sink = Arc::new(StoreSink::new(Arc::clone(&store), "logs", json!({})));

    let pipeline = Pipeline::builder(Resource::new("app1", "test"))
        .trace_provider(Arc::new(NoTraceContext))
        .pool(PoolConfig { workers: 8, ..quick_pool() })
        .remote_sink(
            SinkConfig::new("store", Level::Trace, RenderMode::Machine),
            Arc::clone(&sink) as Arc<dyn LogSink>,
        )
        .build()
        .unwrap();

    for i in 0..50 {
        pipeline.emit(LogEvent::new(Level::Info, "event %d").arg(i));
    }
    pipeline.shutdown(Duration::from_secs(10)).await;

    assert_eq!(store.created_count(), 1);
    assert_eq!(store.documents("logs").len(), 50);
    assert_eq!(sink.state(), SinkState::Active);
    let stats = pipeline.delivery_stats().unwrap();
    assert_eq!(stats.delivered, 50);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn store_outage_never_reaches_the_caller() {
    let store = Arc::new(MemoryStore::new());
    store.set_available(false);
    let sink = Arc::new(StoreSink::new(Arc::clone(&store), "logs", json!({})));

    let pipeline = Pipeline::builder(Resource::new("app1", "test"))
        .trace_provider(Arc::new(NoTraceContext))
        .pool(quick_pool())
        .remote_sink(
            SinkConfig::new("store", Level::Trace, RenderMode::Machine),
            Arc::clone(&sink) as Arc<dyn LogSink>,
        )
        .build()
        .unwrap();

    for _ in 0..3 {
        pipeline.error("store is down");
    }
    pipeline.shutdown(Duration::from_secs(5)).await;

    let stats = pipeline.delivery_stats().unwrap();
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.failed, 3);
    assert!(store.destinations().is_empty());
    assert_ne!(sink.state(), SinkState::Active);
}

#[test]
fn bad_template_and_attribute_limit_degrade_gracefully() {
    let console = SharedBuf::default();
    let pipeline = Pipeline::builder(Resource::new("app1", "test"))
        .trace_provider(Arc::new(NoTraceContext))
        .attribute_limit(Some(2))
        .stream_sink(
            SinkConfig::new("json", Level::Trace, RenderMode::Machine),
            StreamSink::new(Box::new(console.clone())),
        )
        .build()
        .unwrap();

    pipeline.emit(
        LogEvent::new(Level::Info, "%d items")
            .arg("many")
            .field("a", 1)
            .field("b", 2)
            .field("c", 3),
    );

    let doc: serde_json::Value = serde_json::from_str(console.text().trim_end()).unwrap();
    assert_eq!(doc["body"], "%d items");
    assert_eq!(doc["attributes"], json!({"a": 1, "b": 2}));
    assert_eq!(doc["dropped_attributes"], 1);
    assert_eq!(doc["trace_id"], "");
    assert_eq!(doc["trace_flags"], serde_json::Value::Null);
}
