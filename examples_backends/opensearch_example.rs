use std::sync::Arc;

use tokio::time::Duration;
use tracing::{error, info};
use tracing_log_pipeline::init::StoreConfig;
use tracing_log_pipeline::{build_pipeline, init_tracing, PipelineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // LOG_DB_HOST / LOG_DB_PORT select the cluster; fall back to a local one.
    let mut config = PipelineConfig::from_env()?;
    if config.store.is_none() {
        config.store = Some(StoreConfig {
            host: "localhost".to_string(),
            port: 9200,
            user: "admin".to_string(),
            password: "admin".to_string(),
            index: "logs_commons".to_string(),
        });
    }

    let pipeline = Arc::new(build_pipeline(&config)?);
    init_tracing(Arc::clone(&pipeline), config.internal_diagnostics)?;

    info!("opensearch backend example started");
    error!(user_id = 42, "simulated error sent to OpenSearch");
    pipeline.perf("startup finished");

    pipeline.shutdown(Duration::from_secs(5)).await;
    Ok(())
}
