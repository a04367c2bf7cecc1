use crate::error::SinkError;
use crate::format::Output;
use crate::sink::LogSink;
use async_trait::async_trait;

/// A sink that accepts and discards every record.
///
/// Useful for measuring the cost of translation, rendering and the
/// delivery pool without any external I/O.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn send(&self, _output: &Output) -> Result<(), SinkError> {
        Ok(())
    }
}
