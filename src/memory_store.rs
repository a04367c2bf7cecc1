use crate::error::StoreError;
use crate::sink::StructuredStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-process [`StructuredStore`].
///
/// Useful for local runs and tests. `create` is create-if-absent with the
/// same contract as a real index API: a second create of the same
/// destination fails with [`StoreError::AlreadyExists`]. An optional latency
/// is applied to every call, and the store can be switched off to simulate
/// an outage.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<BTreeMap<String, Destination>>,
    latency: Option<Duration>,
    unavailable: AtomicBool,
    exists_calls: AtomicU64,
    create_attempts: AtomicU64,
    created: AtomicU64,
}

struct Destination {
    schema: Value,
    documents: Vec<Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::Relaxed);
    }

    pub fn documents(&self, destination: &str) -> Vec<Value> {
        self.lock()
            .get(destination)
            .map(|d| d.documents.clone())
            .unwrap_or_default()
    }

    pub fn schema(&self, destination: &str) -> Option<Value> {
        self.lock().get(destination).map(|d| d.schema.clone())
    }

    pub fn destinations(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn exists_calls(&self) -> u64 {
        self.exists_calls.load(Ordering::Relaxed)
    }

    pub fn create_attempts(&self) -> u64 {
        self.create_attempts.load(Ordering::Relaxed)
    }

    /// Number of destinations actually created.
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Destination>> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn roundtrip(&self) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Transport("memory store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StructuredStore for MemoryStore {
    async fn exists(&self, destination: &str) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::Relaxed);
        self.roundtrip().await?;
        Ok(self.lock().contains_key(destination))
    }

    async fn create(&self, destination: &str, schema: &Value) -> Result<(), StoreError> {
        self.create_attempts.fetch_add(1, Ordering::Relaxed);
        self.roundtrip().await?;
        let mut map = self.lock();
        if map.contains_key(destination) {
            return Err(StoreError::AlreadyExists(destination.to_string()));
        }
        map.insert(
            destination.to_string(),
            Destination { schema: schema.clone(), documents: Vec::new() },
        );
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn write(&self, destination: &str, document: &Value) -> Result<(), StoreError> {
        self.roundtrip().await?;
        let mut map = self.lock();
        // Like an index API with auto-create, writes to a missing
        // destination create it without a schema.
        map.entry(destination.to_string())
            .or_insert_with(|| Destination { schema: Value::Null, documents: Vec::new() })
            .documents
            .push(document.clone());
        Ok(())
    }
}
