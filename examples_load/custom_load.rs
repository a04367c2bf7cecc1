use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

use tracing_log_pipeline::memory_store::MemoryStore;
use tracing_log_pipeline::opensearch::default_mapping;
use tracing_log_pipeline::pool::PoolConfig;
use tracing_log_pipeline::{Level, LogEvent, Pipeline, RenderMode, Resource, SinkConfig, StoreSink};

/// Drives the pipeline directly, without `tracing`, against an in-memory
/// store that answers every call after a small delay.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_micros(200)));

    let pool = PoolConfig {
        workers: 8,
        queue_capacity: 50_000,
        attempt_timeout: Duration::from_millis(500),
        ..PoolConfig::default()
    };

    let pipeline = Pipeline::builder(Resource::new("custom_load", "development"))
        .attribute_limit(Some(8))
        .pool(pool)
        .remote_sink(
            SinkConfig::new("memory", Level::Info, RenderMode::Machine),
            Arc::new(StoreSink::new(Arc::clone(&store), "logs_load", default_mapping())),
        )
        .build()?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        pipeline.emit(
            LogEvent::new(Level::Error, "custom load test error %d")
                .arg(i)
                .field("iteration", i)
                .field("worker", "main"),
        );
    }

    let elapsed = start.elapsed();
    println!("custom config: emitted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    pipeline.shutdown(Duration::from_secs(10)).await;
    println!("stored {} documents", store.documents("logs_load").len());
    if let Some(stats) = pipeline.delivery_stats() {
        println!("delivery: {:?}", stats);
    }
    Ok(())
}
