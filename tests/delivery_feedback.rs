use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Duration;
use tracing_log_pipeline::pool::PoolConfig;
use tracing_log_pipeline::trace_context::NoTraceContext;
use tracing_log_pipeline::{
    Level, LogSink, Output, Pipeline, PipelineLayer, RenderMode, Resource, SinkConfig, SinkError,
};
use tracing_subscriber::layer::SubscriberExt;

/// Sink that logs through `tracing` while sending, the way an HTTP client
/// and its connection pool do.
#[derive(Default)]
struct ChattySink {
    sends: AtomicUsize,
}

#[async_trait]
impl LogSink for ChattySink {
    async fn send(&self, _output: &Output) -> Result<(), SinkError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(target: "hyper::proto::h1::io", "flushed 512 bytes");
        tracing::info!(target: "custom_db", "row inserted");
        tokio::spawn(async {
            tracing::trace!(target: "hyper_util::client::legacy::pool", "pooling idle connection");
        });
        Ok(())
    }
}

#[tokio::test]
async fn one_event_is_delivered_once() {
    let sink = Arc::new(ChattySink::default());
    let pipeline = Pipeline::builder(Resource::new("app1", "test"))
        .trace_provider(Arc::new(NoTraceContext))
        .pool(PoolConfig { workers: 2, ..PoolConfig::default() })
        .remote_sink(
            SinkConfig::new("db", Level::Trace, RenderMode::Machine),
            Arc::clone(&sink) as Arc<dyn LogSink>,
        )
        .build()
        .unwrap();
    let pipeline = Arc::new(pipeline);

    let subscriber = tracing_subscriber::registry().with(PipelineLayer::new(Arc::clone(&pipeline)));
    let _guard = tracing::subscriber::set_default(subscriber);

    tracing::error!(target: "app", user_id = 42, "user not found");
    tracing::debug!(target: "reqwest::connect", "starting new connection");

    // Let the workers and any connection tasks they spawn run.
    tokio::time::sleep(Duration::from_millis(100)).await;
    pipeline.shutdown(Duration::from_secs(5)).await;

    assert_eq!(sink.sends.load(Ordering::SeqCst), 1);
    let stats = pipeline.delivery_stats().unwrap();
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.dropped, 0);
}
