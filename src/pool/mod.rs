//! Fixed pool of reusable signing credentials.
//!
//! Each credential is in exactly one of three states at any time:
//!
//! - **available**: idle in the pool, ready for [`CredentialPool::checkout`]
//! - **in flight**: held by a single [`CredentialLease`]
//! - **cooling**: released, waiting out the settle delay before it is reusable
//!
//! `available + in_flight + cooling == total` holds for every [`PoolStats`]
//! snapshot. Check-in happens when the lease is dropped, so it runs on every
//! exit path of the code holding it (errors, timeouts, cancellation, panics).

mod credential;

use std::collections::{HashSet, VecDeque};
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;

pub use credential::{Credential, CredentialId};

/// Settle period applied after each release, as used against the live ledger.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1000);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("credential pool is empty")]
    Empty,

    #[error("duplicate credential id: {0}")]
    DuplicateCredential(CredentialId),

    #[error("credential pool is closed")]
    Closed,

    #[error("credential pool state is inconsistent: permit granted with no idle credential")]
    Inconsistent,
}

/// Point-in-time view of the pool, taken under the pool lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub available: usize,
    pub in_flight: usize,
    pub cooling: usize,
    pub checkouts: u64,
    pub checkins: u64,
    /// Set once [`CredentialPool::close`] has been called.
    pub closed: bool,
}

impl PoolStats {
    /// Every credential is counted in exactly one state.
    pub fn is_conserved(&self) -> bool {
        self.available + self.in_flight + self.cooling == self.total
    }
}

#[derive(Debug)]
struct PoolState {
    idle: VecDeque<Credential>,
    in_flight: usize,
    cooling: usize,
    checkouts: u64,
    checkins: u64,
}

#[derive(Debug)]
struct PoolInner {
    state: Mutex<PoolState>,
    // One permit per idle credential; a permit is added only after the
    // credential is back in `idle`.
    available: Semaphore,
    total: usize,
    cooldown: Duration,
}

/// Cheaply cloneable handle to a shared credential pool.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    inner: Arc<PoolInner>,
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>, cooldown: Duration) -> Result<Self, PoolError> {
        if credentials.is_empty() {
            return Err(PoolError::Empty);
        }

        let mut seen = HashSet::new();
        for cred in &credentials {
            if !seen.insert(cred.id().clone()) {
                return Err(PoolError::DuplicateCredential(cred.id().clone()));
            }
        }

        let total = credentials.len();
        tracing::info!(total, "Credential pool created");

        Ok(Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    idle: credentials.into(),
                    in_flight: 0,
                    cooling: 0,
                    checkouts: 0,
                    checkins: 0,
                }),
                available: Semaphore::new(total),
                total,
                cooldown,
            }),
        })
    }

    pub fn total(&self) -> usize {
        self.inner.total
    }

    pub fn cooldown(&self) -> Duration {
        self.inner.cooldown
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            total: self.inner.total,
            available: state.idle.len(),
            in_flight: state.in_flight,
            cooling: state.cooling,
            checkouts: state.checkouts,
            checkins: state.checkins,
            closed: self.inner.available.is_closed(),
        }
    }

    /// Wait for an idle credential and take exclusive use of it.
    ///
    /// Suspends the calling task while the pool is empty. Fails only after
    /// [`close`](Self::close).
    pub async fn checkout(&self) -> Result<CredentialLease, PoolError> {
        let permit = self
            .inner
            .available
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;
        permit.forget();

        let credential = {
            let mut state = self.inner.state.lock();
            let credential = state.idle.pop_front().ok_or(PoolError::Inconsistent)?;
            state.in_flight += 1;
            state.checkouts += 1;
            credential
        };

        tracing::debug!(credential = %credential.id(), "Credential checked out");

        Ok(CredentialLease {
            credential: Some(credential),
            pool: Arc::clone(&self.inner),
            checked_out_at: Instant::now(),
        })
    }

    /// Stop handing out credentials. Pending and future checkouts fail with
    /// [`PoolError::Closed`]; outstanding leases still check in normally.
    pub fn close(&self) {
        self.inner.available.close();
        tracing::info!("Credential pool closed");
    }
}

impl PoolInner {
    fn release(self: &Arc<Self>, credential: Credential) {
        {
            let mut state = self.state.lock();
            state.in_flight -= 1;
            state.cooling += 1;
        }

        if self.cooldown.is_zero() {
            self.restore(credential);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(self);
                handle.spawn(async move {
                    tokio::time::sleep(inner.cooldown).await;
                    inner.restore(credential);
                });
            }
            Err(_) => {
                tracing::warn!(
                    credential = %credential.id(),
                    "No runtime available for cooldown, returning credential immediately"
                );
                self.restore(credential);
            }
        }
    }

    fn restore(&self, credential: Credential) {
        let id = credential.id().clone();
        {
            let mut state = self.state.lock();
            state.cooling -= 1;
            state.checkins += 1;
            state.idle.push_back(credential);
        }
        self.available.add_permits(1);
        tracing::debug!(credential = %id, "Credential checked in");
    }
}

/// Exclusive, scoped use of one credential. Dropping the lease checks the
/// credential back in after the pool's cooldown.
#[derive(Debug)]
pub struct CredentialLease {
    credential: Option<Credential>,
    pool: Arc<PoolInner>,
    checked_out_at: Instant,
}

impl CredentialLease {
    pub fn credential(&self) -> &Credential {
        // Only `Drop` takes the credential out.
        self.credential
            .as_ref()
            .unwrap_or_else(|| unreachable!("lease accessed after release"))
    }
}

impl Deref for CredentialLease {
    type Target = Credential;

    fn deref(&self) -> &Credential {
        self.credential()
    }
}

impl Drop for CredentialLease {
    fn drop(&mut self) {
        if let Some(credential) = self.credential.take() {
            tracing::debug!(
                credential = %credential.id(),
                held_ms = self.checked_out_at.elapsed().as_millis() as u64,
                "Releasing credential"
            );
            self.pool.release(credential);
        }
    }
}
