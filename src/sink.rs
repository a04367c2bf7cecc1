use crate::error::{SinkError, StoreError};
use crate::format::Output;
use crate::INTERNAL_TARGET;
use async_trait::async_trait;
use serde_json::Value;
use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Asynchronous destination for rendered records.
///
/// Implementations transport [`Output`]s to a concrete backend. Remote
/// sinks are driven from the delivery pool and never awaited on the
/// application's own task.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Deliver one rendered record.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted by the backend.
    /// - `Err(..)` if the backend failed. The pool may retry a bounded
    ///   number of times and then drops the record.
    async fn send(&self, output: &Output) -> Result<(), SinkError>;

    /// Flush any buffered records. Default implementation is a no-op.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes one line per record to a text stream.
///
/// Writes happen inline on the emitting thread, the way a console handler
/// does.
pub struct StreamSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StreamSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        StreamSink { writer: Mutex::new(writer) }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn write(&self, output: &Output) -> Result<(), SinkError> {
        let line = output.to_line();
        // A poisoned lock only means another writer panicked mid-line.
        let mut w = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    }
}

#[async_trait]
impl LogSink for StreamSink {
    async fn send(&self, output: &Output) -> Result<(), SinkError> {
        self.write(output)
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut w = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        w.flush()?;
        Ok(())
    }
}

/// A remote store of structured documents grouped into named destinations
/// (indices).
#[async_trait]
pub trait StructuredStore: Send + Sync {
    async fn exists(&self, destination: &str) -> Result<bool, StoreError>;

    /// Create a destination. Must fail with [`StoreError::AlreadyExists`]
    /// when it is already there.
    async fn create(&self, destination: &str, schema: &Value) -> Result<(), StoreError>;

    async fn write(&self, destination: &str, document: &Value) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: StructuredStore + ?Sized> StructuredStore for Arc<S> {
    async fn exists(&self, destination: &str) -> Result<bool, StoreError> {
        (**self).exists(destination).await
    }

    async fn create(&self, destination: &str, schema: &Value) -> Result<(), StoreError> {
        (**self).create(destination, schema).await
    }

    async fn write(&self, destination: &str, document: &Value) -> Result<(), StoreError> {
        (**self).write(destination, document).await
    }
}

/// Lifecycle of a [`StoreSink`]'s destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SinkState {
    /// Nothing written yet.
    Inactive = 0,
    /// Destination check in progress or not yet successful.
    Ensuring = 1,
    /// Destination known to exist; writes go straight through.
    Active = 2,
}

impl SinkState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SinkState::Inactive,
            1 => SinkState::Ensuring,
            _ => SinkState::Active,
        }
    }
}

/// Writes documents into one destination of a [`StructuredStore`],
/// creating it on first use.
///
/// Concurrent first writers may all run the create-if-absent check; a
/// creator that loses the race sees `AlreadyExists`, which counts as
/// success. No extra locking is involved.
pub struct StoreSink<S> {
    store: S,
    destination: String,
    schema: Value,
    state: AtomicU8,
}

impl<S: StructuredStore> StoreSink<S> {
    pub fn new(store: S, destination: impl Into<String>, schema: Value) -> Self {
        StoreSink {
            store,
            destination: destination.into(),
            schema,
            state: AtomicU8::new(SinkState::Inactive as u8),
        }
    }

    pub fn state(&self) -> SinkState {
        SinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn ensure_destination(&self) -> Result<(), StoreError> {
        if self.state() == SinkState::Active {
            return Ok(());
        }
        // Inactive -> Ensuring; never back.
        let _ = self.state.compare_exchange(
            SinkState::Inactive as u8,
            SinkState::Ensuring as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        if !self.store.exists(&self.destination).await? {
            match self.store.create(&self.destination, &self.schema).await {
                Ok(()) => {
                    tracing::debug!(target: INTERNAL_TARGET, destination = %self.destination, "created log destination");
                }
                Err(StoreError::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
        }

        self.state.store(SinkState::Active as u8, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl<S: StructuredStore> LogSink for StoreSink<S> {
    async fn send(&self, output: &Output) -> Result<(), SinkError> {
        self.ensure_destination().await?;
        match output {
            Output::Document(doc) => self.store.write(&self.destination, doc).await?,
            Output::Text(text) => {
                let doc = serde_json::json!({ "text": text });
                self.store.write(&self.destination, &doc).await?
            }
        }
        Ok(())
    }
}
