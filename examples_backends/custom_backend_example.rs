use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_log_pipeline::{
    init_tracing, Level, LogSink, Output, Pipeline, RenderMode, Resource, SinkConfig, SinkError,
};

/// Example of integrating a completely custom backend by implementing
/// the `LogSink` trait directly. Imagine this talks to some
/// proprietary DB for which this crate does not provide a built-in
/// sink.
struct MyCustomDbSink;

#[async_trait]
impl LogSink for MyCustomDbSink {
    async fn send(&self, output: &Output) -> Result<(), SinkError> {
        // Here you would call your own client library for the target DB.
        println!("[my-custom-db] {}", output.to_line());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::builder(Resource::new("custom_backend_example", "development"))
        .remote_sink(
            SinkConfig::new("my-custom-db", Level::Info, RenderMode::Machine),
            Arc::new(MyCustomDbSink),
        )
        .build()?;
    let pipeline = Arc::new(pipeline);
    init_tracing(Arc::clone(&pipeline), true)?;

    info!("custom backend example started");
    error!(db = "my-custom-db", "simulated error sent via custom backend");

    pipeline.shutdown(Duration::from_secs(5)).await;
    Ok(())
}
