use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ServiceConfig;
use crate::dispatch::{EventDispatcher, RequestDispatcher};
use crate::error::Result;
use crate::http::{run_http, HttpState};
use crate::ledger::Ledger;
use crate::metadata::{MetadataBuilder, MetadataPublisher};
use crate::params::ParameterGenerator;
use crate::pool::CredentialPool;
use crate::queue::SubmissionQueue;
use crate::store::ContentStore;

/// Owns the credential pool and wires every component around one
/// submission queue.
pub struct Service {
    pub config: ServiceConfig,
    pub queue: SubmissionQueue,
    pub events: Arc<EventDispatcher>,
    pub requests: Arc<RequestDispatcher>,
}

impl Service {
    pub fn new(
        config: ServiceConfig,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn ContentStore>,
    ) -> Result<Self> {
        config.validate()?;

        let credentials = config
            .credentials
            .iter()
            .cloned()
            .map(|spec| spec.into_credential())
            .collect();
        let pool = CredentialPool::new(credentials, config.cooldown)?;
        let queue = SubmissionQueue::new(pool, config.queue.clone());

        let events = Arc::new(EventDispatcher::new(
            Arc::clone(&ledger),
            MetadataPublisher::new(store),
            MetadataBuilder::new(config.asset_base_url.clone()),
            queue.clone(),
        ));
        let requests = Arc::new(RequestDispatcher::new(
            ledger,
            ParameterGenerator::new()?,
            queue.clone(),
        ));

        tracing::info!(
            credentials = queue.pool().total(),
            concurrency = queue.limit(),
            "Relayer service assembled"
        );

        Ok(Self {
            config,
            queue,
            events,
            requests,
        })
    }

    /// Run until `cancel` fires.
    ///
    /// 1. Spawns the event dispatcher (ledger subscription)
    /// 2. Runs the HTTP server, which returns once `cancel` fires and
    ///    in-flight requests have drained
    /// 3. Closes the queue so jobs still waiting for a credential fail fast
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let events = Arc::clone(&self.events);
        let event_cancel = cancel.clone();
        let event_loop = tokio::spawn(async move {
            events.run(event_cancel).await;
        });

        let state = HttpState {
            requests: Arc::clone(&self.requests),
        };
        let served = run_http(self.config.listen_addr, state, cancel.clone()).await;

        // The server can also stop on its own (bind failure).
        cancel.cancel();
        self.queue.close();
        if let Err(e) = event_loop.await {
            tracing::warn!(error = %e, "Event dispatcher task failed");
        }

        let stats = self.queue.pool().stats();
        tracing::info!(
            in_flight = stats.in_flight,
            cooling = stats.cooling,
            checkouts = stats.checkouts,
            checkins = stats.checkins,
            "Service stopped"
        );

        served?;
        Ok(())
    }
}
