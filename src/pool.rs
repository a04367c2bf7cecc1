use crate::error::InitError;
use crate::format::Output;
use crate::sink::LogSink;
use crate::INTERNAL_TARGET;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration, Instant};

tokio::task_local! {
    static DELIVERY_TASK: ();
}

/// Whether the caller runs on one of the pool's worker tasks.
///
/// Events raised while a record is being shipped must not be logged
/// through the pipeline again, or every delivery would queue another one.
pub fn in_delivery_task() -> bool {
    DELIVERY_TASK.try_with(|_| ()).is_ok()
}

/// Settings of the background delivery pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker tasks.
    pub workers: usize,
    /// Jobs waiting beyond this are dropped.
    pub queue_capacity: usize,
    /// Upper bound for a single delivery attempt.
    pub attempt_timeout: Duration,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: 1024,
            attempt_timeout: Duration::from_secs(5),
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Host parallelism, or 1 if it cannot be determined.
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// A record rendered for one remote sink.
pub struct DeliveryJob {
    pub sink_name: Arc<str>,
    pub sink: Arc<dyn LogSink>,
    pub output: Output,
}

/// Counters kept by the pool.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    submitted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryCounts {
    /// Accepted into the queue.
    pub submitted: u64,
    pub delivered: u64,
    /// Gave up after retries.
    pub failed: u64,
    /// Rejected because the queue was full or closed.
    pub dropped: u64,
}

impl DeliveryStats {
    pub fn snapshot(&self) -> DeliveryCounts {
        DeliveryCounts {
            submitted: self.submitted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Bounded queue drained by a fixed set of Tokio worker tasks.
///
/// [`submit`](DeliveryPool::submit) never blocks or awaits, so it can be
/// called from synchronous logging code on a request task.
pub struct DeliveryPool {
    sender: RwLock<Option<mpsc::Sender<DeliveryJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<DeliveryStats>,
}

impl DeliveryPool {
    /// Spawn the workers on the current Tokio runtime.
    ///
    /// Zero workers or capacity are raised to one.
    pub fn start(config: PoolConfig) -> Result<Self, InitError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| InitError::NoRuntime)?;
        let workers = config.workers.max(1);
        let (tx, rx) = mpsc::channel::<DeliveryJob>(config.queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let stats = Arc::new(DeliveryStats::default());
        let config = Arc::new(config);

        let handles = (0..workers)
            .map(|_| {
                let rx = Arc::clone(&rx);
                let stats = Arc::clone(&stats);
                let config = Arc::clone(&config);
                runtime.spawn(DELIVERY_TASK.scope((), async move {
                    loop {
                        let job = { rx.lock().await.recv().await };
                        match job {
                            Some(job) => deliver(job, &config, &stats).await,
                            None => break,
                        }
                    }
                }))
            })
            .collect();

        Ok(Self {
            sender: RwLock::new(Some(tx)),
            workers: Mutex::new(handles),
            stats,
        })
    }

    /// Queue a job. Returns `false` if it was dropped.
    pub fn submit(&self, job: DeliveryJob) -> bool {
        let guard = self.sender.read().unwrap_or_else(|p| p.into_inner());
        let Some(sender) = guard.as_ref() else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        match sender.try_send(job) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                let sink = match &e {
                    mpsc::error::TrySendError::Full(job) | mpsc::error::TrySendError::Closed(job) => {
                        Arc::clone(&job.sink_name)
                    }
                };
                tracing::warn!(target: INTERNAL_TARGET, sink = %sink, "log delivery queue full, dropping record");
                false
            }
        }
    }

    pub fn stats(&self) -> DeliveryCounts {
        self.stats.snapshot()
    }

    /// Stop accepting jobs and let the workers drain the queue.
    ///
    /// Workers still busy when `grace` runs out are aborted and their jobs
    /// lost. Calling this twice is harmless.
    pub async fn shutdown(&self, grace: Duration) {
        self.sender.write().unwrap_or_else(|p| p.into_inner()).take();
        let handles: Vec<JoinHandle<()>> =
            std::mem::take(&mut *self.workers.lock().unwrap_or_else(|p| p.into_inner()));

        let deadline = Instant::now() + grace;
        for mut handle in handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
                tracing::warn!(target: INTERNAL_TARGET, "log delivery worker aborted at shutdown");
            }
        }
    }
}

async fn deliver(job: DeliveryJob, config: &PoolConfig, stats: &DeliveryStats) {
    let mut backoff = config.initial_backoff;
    let mut attempt = 0u32;
    loop {
        let result = match timeout(config.attempt_timeout, job.sink.send(&job.output)).await {
            Ok(r) => r.map_err(|e| e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", config.attempt_timeout)),
        };

        match result {
            Ok(()) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(e) if attempt < config.max_retries => {
                tracing::debug!(target: INTERNAL_TARGET, sink = %job.sink_name, error = %e, retry_in = ?backoff, "log delivery failed, retrying");
                sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
                attempt += 1;
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(target: INTERNAL_TARGET, sink = %job.sink_name, error = %e, "dropping log record after failed delivery");
                return;
            }
        }
    }
}
