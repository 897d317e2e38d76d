use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::LedgerWrite;
use crate::error::Result;
use crate::ledger::{Contract, ContractCall, Ledger, LedgerEvent};
use crate::metadata::{MetadataBuilder, MetadataPublisher};
use crate::queue::SubmissionQueue;

/// Reacts to ticket and modifier issuance by pointing the new token at
/// freshly published metadata.
///
/// A publish failure drops that event: nothing is queued and no credential is
/// used. There is no retry; the token keeps its previous URI until the event
/// is replayed by hand.
pub struct EventDispatcher {
    ledger: Arc<dyn Ledger>,
    publisher: MetadataPublisher,
    builder: MetadataBuilder,
    queue: SubmissionQueue,
}

impl EventDispatcher {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        publisher: MetadataPublisher,
        builder: MetadataBuilder,
        queue: SubmissionQueue,
    ) -> Self {
        Self {
            ledger,
            publisher,
            builder,
            queue,
        }
    }

    /// Publish metadata for `event` and queue the URI write.
    /// Returns the id of the queued job.
    pub async fn handle(&self, event: LedgerEvent) -> Result<Uuid> {
        let (contract, token_id, record) = {
            let mut rng = rand::thread_rng();
            match &event {
                LedgerEvent::TicketClaimed {
                    bidder,
                    auction_id,
                    ticket_id,
                } => {
                    tracing::info!(%bidder, auction_id, ticket_id, "Ticket claimed");
                    (
                        Contract::TicketNft,
                        *ticket_id,
                        self.builder.ticket(*ticket_id, &mut rng),
                    )
                }
                LedgerEvent::ModifierPurchased {
                    owner,
                    modifier_id,
                    kind,
                    value,
                } => {
                    tracing::info!(%owner, modifier_id, %kind, value, "Modifier purchased");
                    (
                        Contract::ModifierNft,
                        *modifier_id,
                        self.builder.modifier(*modifier_id, *kind, *value, &mut rng),
                    )
                }
            }
        };

        let cid = self.publisher.publish(&record).await?;

        let call = ContractCall::SetTokenUri {
            contract,
            token_id,
            uri: cid.to_string(),
        };
        let job_id = self
            .queue
            .submit_detached(LedgerWrite::new(Arc::clone(&self.ledger), call))
            .await;
        Ok(job_id)
    }

    /// Consume ledger events until cancelled or the subscription closes.
    /// Each event is handled in its own task.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut events = self.ledger.subscribe();
        tracing::info!("Listening for ticket-claimed and modifier-purchased events");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event dispatcher stopping");
                    break;
                }
                received = events.recv() => match received {
                    Ok(event) => {
                        let dispatcher = Arc::clone(&self);
                        tokio::spawn(async move {
                            let name = event.name();
                            if let Err(e) = dispatcher.handle(event).await {
                                tracing::error!(event = name, error = %e, "Event processing aborted");
                            }
                        });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event subscription lagged, events were missed");
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("Event subscription closed");
                        break;
                    }
                }
            }
        }
    }
}
