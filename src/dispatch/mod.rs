//! Turning ledger events and HTTP requests into queued ledger writes.
//!
//! - [`EventDispatcher`]: publishes NFT metadata for newly issued tickets and
//!   modifiers, then queues a detached `setTokenURI` write
//! - [`RequestDispatcher`]: samples request parameters, queues the write and
//!   waits for its outcome on behalf of the HTTP caller

pub mod events;
pub mod requests;

use std::sync::Arc;

use async_trait::async_trait;

use crate::ledger::{Address, ContractCall, Ledger, Receipt};
use crate::pool::Credential;
use crate::queue::{JobError, Operation};

pub use events::EventDispatcher;
pub use requests::{ModifierPurchase, Participation, RequestDispatcher};

/// Send one contract call and wait for it to be mined.
pub struct LedgerWrite {
    ledger: Arc<dyn Ledger>,
    call: ContractCall,
}

impl LedgerWrite {
    pub fn new(ledger: Arc<dyn Ledger>, call: ContractCall) -> Self {
        Self { ledger, call }
    }
}

#[async_trait]
impl Operation for LedgerWrite {
    type Output = Receipt;

    fn label(&self) -> String {
        match &self.call {
            ContractCall::SetTokenUri {
                contract, token_id, ..
            } => format!("setTokenURI {} #{}", contract, token_id),
            call => format!("{} {}", call.method(), call.contract()),
        }
    }

    async fn execute(self, credential: &Credential) -> Result<Receipt, JobError> {
        let receipt = self.ledger.execute(credential, self.call).await?;
        tracing::info!(
            credential = %credential.id(),
            tx = %receipt.tx_hash,
            block = receipt.block_number,
            "Ledger write confirmed"
        );
        Ok(receipt)
    }
}

/// Seal `number` with the caller's password and enter the auction with it.
pub struct RandomParticipation {
    ledger: Arc<dyn Ledger>,
    number: u32,
    password: String,
    auction_id: u64,
    participant: Address,
}

#[async_trait]
impl Operation for RandomParticipation {
    type Output = Receipt;

    fn label(&self) -> String {
        format!("participateRandomAuction auction #{}", self.auction_id)
    }

    async fn execute(self, credential: &Credential) -> Result<Receipt, JobError> {
        let commitment = self
            .ledger
            .create_commitment(self.number, &self.password)
            .await?;
        let call = ContractCall::ParticipateRandomAuction {
            commitment,
            auction_id: self.auction_id,
            participant: self.participant,
        };
        LedgerWrite::new(self.ledger, call).execute(credential).await
    }
}
