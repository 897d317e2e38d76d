use std::sync::Arc;

use serde::Serialize;

use super::{LedgerWrite, RandomParticipation};
use crate::error::{RelayError, Result};
use crate::ledger::{Address, ContractCall, Ledger, Receipt};
use crate::params::{ModifierKind, ParameterGenerator};
use crate::queue::SubmissionQueue;

#[derive(Debug, Clone, Serialize)]
pub struct ModifierPurchase {
    pub kind: ModifierKind,
    pub value: u8,
    pub receipt: Receipt,
}

#[derive(Debug, Clone, Serialize)]
pub struct Participation {
    /// The sealed number. The caller needs it to reveal later.
    pub number: u32,
    pub receipt: Receipt,
}

/// Request/response front for queued writes: each call waits until its job
/// has resolved.
pub struct RequestDispatcher {
    ledger: Arc<dyn Ledger>,
    params: ParameterGenerator,
    queue: SubmissionQueue,
}

impl RequestDispatcher {
    pub fn new(ledger: Arc<dyn Ledger>, params: ParameterGenerator, queue: SubmissionQueue) -> Self {
        Self {
            ledger,
            params,
            queue,
        }
    }

    pub fn queue(&self) -> &SubmissionQueue {
        &self.queue
    }

    /// Buy a randomly drawn modifier for `owner`.
    pub async fn buy_modifier(&self, owner: Address) -> Result<ModifierPurchase> {
        let (kind, value) = self.params.modifier(&mut rand::thread_rng());
        tracing::info!(%owner, %kind, value, "Buying modifier");

        let call = ContractCall::BuyModifier {
            owner,
            kind,
            value,
        };
        let receipt = self
            .queue
            .run(LedgerWrite::new(Arc::clone(&self.ledger), call))
            .await?;

        Ok(ModifierPurchase {
            kind,
            value,
            receipt,
        })
    }

    /// Enter `auction_id` with a random number sealed under `password`.
    pub async fn participate_random_auction(
        &self,
        participant: Address,
        auction_id: u64,
        password: String,
    ) -> Result<Participation> {
        if password.is_empty() {
            return Err(RelayError::MalformedRequest(
                "password must not be empty".to_string(),
            ));
        }

        let number = self.params.auction_number(&mut rand::thread_rng());
        tracing::info!(%participant, auction_id, "Participating in random auction");

        let receipt = self
            .queue
            .run(RandomParticipation {
                ledger: Arc::clone(&self.ledger),
                number,
                password,
                auction_id,
                participant,
            })
            .await?;

        Ok(Participation { number, receipt })
    }
}
