use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::error;

use tracing_log_pipeline::noop_sink::NoopSink;
use tracing_log_pipeline::{init_tracing, Level, Pipeline, RenderMode, Resource, SinkConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::builder(Resource::new("default_load", "development"))
        .remote_sink(
            SinkConfig::new("noop", Level::Trace, RenderMode::Machine),
            Arc::new(NoopSink),
        )
        .build()?;
    let pipeline = Arc::new(pipeline);
    init_tracing(Arc::clone(&pipeline), true)?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(target: "load", iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: emitted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    pipeline.shutdown(Duration::from_secs(5)).await;
    if let Some(stats) = pipeline.delivery_stats() {
        println!("delivery: {:?}", stats);
    }
    Ok(())
}
