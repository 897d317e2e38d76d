//! Gated submission queue.
//!
//! Every submitted job runs in its own task and goes through the same
//! lifecycle:
//!
//! 1. wait for a gate permit (at most `limit` jobs past this point)
//! 2. check out a credential from the [`CredentialPool`]
//! 3. run the [`Operation`] with that credential
//! 4. drop the lease, which checks the credential back in after cooldown
//! 5. record the outcome and resolve the [`JobHandle`]
//!
//! The operation runs in a nested task that owns the lease, so a panic still
//! drops the lease and returns the credential. A timeout resolves the caller
//! early but leaves that task running: a write it already sent may still be
//! pending, and the credential must not be reused until it settles.

pub mod history;
pub mod job;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{oneshot, RwLock, Semaphore};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::ledger::LedgerError;
use crate::pool::{Credential, CredentialId, CredentialPool, PoolError};

pub use history::JobHistory;
pub use job::{JobRecord, JobStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("ledger write failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("credential unavailable: {0}")]
    Pool(#[from] PoolError),

    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("job aborted before completion")]
    Aborted,
}

/// A unit of work that needs exclusive use of one credential.
#[async_trait]
pub trait Operation: Send + 'static {
    type Output: Send + 'static;

    /// Short description for logs and job history.
    fn label(&self) -> String;

    async fn execute(self, credential: &Credential) -> Result<Self::Output, JobError>;
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Concurrency limit; `None` or anything above the pool size means the
    /// pool size.
    pub max_concurrency: Option<usize>,
    /// Abort an operation that runs longer than this. `None` waits forever.
    pub operation_timeout: Option<Duration>,
    pub history_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            operation_timeout: None,
            history_capacity: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub limit: usize,
    pub active: usize,
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Resolves to the outcome of a submitted job.
#[derive(Debug)]
pub struct JobHandle<T> {
    id: Uuid,
    rx: oneshot::Receiver<Result<T, JobError>>,
}

impl<T> JobHandle<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn wait(self) -> Result<T, JobError> {
        self.rx.await.unwrap_or(Err(JobError::Aborted))
    }
}

struct QueueInner {
    pool: CredentialPool,
    gate: Semaphore,
    limit: usize,
    operation_timeout: Option<Duration>,
    history: RwLock<JobHistory>,
    active: AtomicUsize,
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Cheaply cloneable handle to the shared submission queue.
#[derive(Clone)]
pub struct SubmissionQueue {
    inner: Arc<QueueInner>,
}

impl SubmissionQueue {
    pub fn new(pool: CredentialPool, config: QueueConfig) -> Self {
        let limit = config
            .max_concurrency
            .filter(|&n| n > 0)
            .map_or(pool.total(), |n| n.min(pool.total()));

        tracing::info!(
            limit,
            pool_size = pool.total(),
            cooldown_ms = pool.cooldown().as_millis() as u64,
            timeout_ms = config.operation_timeout.map(|d| d.as_millis() as u64),
            "Submission queue created"
        );

        Self {
            inner: Arc::new(QueueInner {
                pool,
                gate: Semaphore::new(limit),
                limit,
                operation_timeout: config.operation_timeout,
                history: RwLock::new(JobHistory::with_capacity(config.history_capacity)),
                active: AtomicUsize::new(0),
                submitted: AtomicU64::new(0),
                succeeded: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.inner.pool
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            limit: self.inner.limit,
            active: self.inner.active.load(Ordering::SeqCst),
            submitted: self.inner.submitted.load(Ordering::SeqCst),
            succeeded: self.inner.succeeded.load(Ordering::SeqCst),
            failed: self.inner.failed.load(Ordering::SeqCst),
        }
    }

    /// Snapshot of recent job records, oldest first.
    pub async fn jobs(&self) -> Vec<JobRecord> {
        let history = self.inner.history.read().await;
        history.all_jobs().into_iter().cloned().collect()
    }

    pub async fn job(&self, id: &Uuid) -> Option<JobRecord> {
        self.inner.history.read().await.get_job(id).cloned()
    }

    /// Enqueue `op` and return a handle to its outcome. Never drops a job:
    /// when all credentials are busy it waits its turn.
    pub async fn submit<O: Operation>(&self, op: O) -> JobHandle<O::Output> {
        let record = JobRecord::new(op.label());
        let id = record.id;
        tracing::debug!(job_id = %id, label = %record.label, "Job submitted");

        self.inner.history.write().await.add_job(record);
        self.inner.submitted.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = inner.process(id, op).await;
            // The submitter may not be waiting.
            let _ = tx.send(result);
        });

        JobHandle { id, rx }
    }

    /// Enqueue `op` and wait for its outcome.
    pub async fn run<O: Operation>(&self, op: O) -> Result<O::Output, JobError> {
        self.submit(op).await.wait().await
    }

    /// Enqueue `op` without observing the outcome. Failures surface only in
    /// logs and job history.
    pub async fn submit_detached<O: Operation>(&self, op: O) -> Uuid {
        self.submit(op).await.id()
    }

    /// Refuse new work. Jobs waiting for a permit or a credential fail with
    /// [`PoolError::Closed`]; running jobs finish normally.
    pub fn close(&self) {
        self.inner.gate.close();
        self.inner.pool.close();
    }
}

impl QueueInner {
    async fn process<O: Operation>(&self, id: Uuid, op: O) -> Result<O::Output, JobError> {
        let result = self.gated(id, op).await;

        let failure = result.as_ref().err().map(ToString::to_string);
        match failure {
            None => {
                self.succeeded.fetch_add(1, Ordering::SeqCst);
                self.history.write().await.mark_completed(&id);
                tracing::info!(job_id = %id, "Job completed");
            }
            Some(error) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                tracing::error!(job_id = %id, error = %error, "Job failed");
                self.history.write().await.mark_failed(&id, error);
            }
        }

        result
    }

    async fn gated<O: Operation>(&self, id: Uuid, op: O) -> Result<O::Output, JobError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;

        let lease = self.pool.checkout().await?;
        let credential = lease.id().clone();
        self.history
            .write()
            .await
            .mark_running(&id, credential.clone());
        tracing::info!(job_id = %id, credential = %credential, label = %op.label(), "Job running");

        self.active.fetch_add(1, Ordering::SeqCst);
        let mut task = tokio::spawn(async move {
            let result = op.execute(&lease).await;
            drop(lease);
            result
        });

        let joined = match self.operation_timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, &mut task).await;
                match waited {
                    Ok(joined) => joined,
                    Err(_) => {
                        tracing::warn!(
                            job_id = %id,
                            credential = %credential,
                            "Operation timed out, credential held until it settles"
                        );
                        self.active.fetch_sub(1, Ordering::SeqCst);
                        tokio::spawn(settle_detached(id, credential, task));
                        return Err(JobError::TimedOut(limit));
                    }
                }
            }
            None => task.await,
        };
        self.active.fetch_sub(1, Ordering::SeqCst);

        match joined {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(job_id = %id, credential = %credential, error = %e, "Operation panicked or was cancelled");
                Err(JobError::Aborted)
            }
        }
    }
}

/// Wait out an operation whose caller already gave up on it. The lease is
/// dropped inside `task`, so the credential returns only once this finishes.
async fn settle_detached<T: Send + 'static>(
    id: Uuid,
    credential: CredentialId,
    task: JoinHandle<Result<T, JobError>>,
) {
    match task.await {
        Ok(Ok(_)) => {
            tracing::info!(job_id = %id, credential = %credential, "Timed-out operation settled");
        }
        Ok(Err(e)) => {
            tracing::warn!(job_id = %id, credential = %credential, error = %e, "Timed-out operation failed");
        }
        Err(e) => {
            tracing::error!(job_id = %id, credential = %credential, error = %e, "Timed-out operation panicked");
        }
    }
}
