use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::{Address, ContractAddresses, ContractCall, Ledger, LedgerError, LedgerEvent, Receipt, TxHash};
use crate::params::Commitment;
use crate::pool::{Credential, CredentialId};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A write accepted by the simulated ledger.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub tx_hash: TxHash,
    pub credential: CredentialId,
    pub nonce: u64,
    /// Deployed address of the target contract.
    pub to: Address,
    pub call: ContractCall,
}

#[derive(Debug)]
struct PendingTx {
    credential: CredentialId,
    call: ContractCall,
    mined_at: Instant,
}

#[derive(Debug, Default)]
struct LedgerState {
    nonces: HashMap<CredentialId, u64>,
    pending: HashMap<TxHash, PendingTx>,
    scripted_failures: VecDeque<LedgerError>,
    writes: Vec<WriteRecord>,
    block_number: u64,
    next_modifier_id: u64,
    next_ticket_id: u64,
}

/// In-process ledger with real timing and nonce semantics.
///
/// A credential with an unmined transaction cannot send another one: the
/// second send fails with [`LedgerError::NonceConflict`], which is the
/// collision the credential pool exists to prevent. Confirmed
/// `buyModifier` and `participateRandomAuction` writes emit the matching
/// contract events.
#[derive(Debug)]
pub struct SimulatedLedger {
    confirm_latency: Duration,
    contracts: ContractAddresses,
    state: Mutex<LedgerState>,
    events: broadcast::Sender<LedgerEvent>,
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl SimulatedLedger {
    pub fn new(confirm_latency: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            confirm_latency,
            contracts: ContractAddresses::default(),
            state: Mutex::new(LedgerState {
                next_modifier_id: 1,
                next_ticket_id: 1,
                ..Default::default()
            }),
            events,
        }
    }

    pub fn with_contracts(mut self, contracts: ContractAddresses) -> Self {
        self.contracts = contracts;
        self
    }

    /// Make the next send fail with `error`. Failures queue in order.
    pub fn fail_next_send(&self, error: LedgerError) {
        self.state.lock().scripted_failures.push_back(error);
    }

    /// Inject an event as if it had been emitted on-chain.
    /// Returns the number of subscribers that received it.
    pub fn emit(&self, event: LedgerEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().writes.clone()
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().block_number
    }

    fn tx_hash(credential: &CredentialId, nonce: u64) -> TxHash {
        let mut hasher = Sha256::new();
        hasher.update(credential.as_str().as_bytes());
        hasher.update(nonce.to_be_bytes());
        let digest = hasher.finalize();
        TxHash(format!("0x{}", hex::encode(digest)))
    }

    fn derived_event(state: &mut LedgerState, call: &ContractCall) -> Option<LedgerEvent> {
        match call {
            ContractCall::BuyModifier { owner, kind, value } => {
                let modifier_id = state.next_modifier_id;
                state.next_modifier_id += 1;
                Some(LedgerEvent::ModifierPurchased {
                    owner: owner.clone(),
                    modifier_id,
                    kind: *kind,
                    value: *value,
                })
            }
            ContractCall::ParticipateRandomAuction {
                auction_id,
                participant,
                ..
            } => {
                let ticket_id = state.next_ticket_id;
                state.next_ticket_id += 1;
                Some(LedgerEvent::TicketClaimed {
                    bidder: participant.clone(),
                    auction_id: *auction_id,
                    ticket_id,
                })
            }
            ContractCall::SetTokenUri { .. } => None,
        }
    }
}

#[async_trait]
impl Ledger for SimulatedLedger {
    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    async fn send(
        &self,
        credential: &Credential,
        call: ContractCall,
    ) -> Result<TxHash, LedgerError> {
        let now = Instant::now();
        let mut state = self.state.lock();

        if let Some(error) = state.scripted_failures.pop_front() {
            tracing::debug!(credential = %credential.id(), error = %error, "Simulated send failure");
            return Err(error);
        }

        let in_flight = state
            .pending
            .values()
            .any(|tx| &tx.credential == credential.id() && tx.mined_at > now);
        if in_flight {
            return Err(LedgerError::NonceConflict(credential.id().clone()));
        }

        let nonce = state.nonces.entry(credential.id().clone()).or_insert(0);
        let this_nonce = *nonce;
        *nonce += 1;

        let tx_hash = Self::tx_hash(credential.id(), this_nonce);
        state.writes.push(WriteRecord {
            tx_hash: tx_hash.clone(),
            credential: credential.id().clone(),
            nonce: this_nonce,
            to: self.contracts.address(call.contract()).clone(),
            call: call.clone(),
        });
        state.pending.insert(
            tx_hash.clone(),
            PendingTx {
                credential: credential.id().clone(),
                call,
                mined_at: now + self.confirm_latency,
            },
        );

        tracing::debug!(credential = %credential.id(), nonce = this_nonce, tx = %tx_hash, "Transaction sent");
        Ok(tx_hash)
    }

    async fn create_commitment(
        &self,
        number: u32,
        password: &str,
    ) -> Result<Commitment, LedgerError> {
        Ok(Commitment::derive(number, password))
    }

    async fn confirm(&self, tx: &TxHash) -> Result<Receipt, LedgerError> {
        let mined_at = self
            .state
            .lock()
            .pending
            .get(tx)
            .map(|p| p.mined_at)
            .ok_or_else(|| LedgerError::UnknownTransaction(tx.clone()))?;

        tokio::time::sleep_until(mined_at).await;

        let (receipt, event) = {
            let mut state = self.state.lock();
            let pending = state
                .pending
                .remove(tx)
                .ok_or_else(|| LedgerError::UnknownTransaction(tx.clone()))?;
            state.block_number += 1;
            let event = Self::derived_event(&mut state, &pending.call);
            let receipt = Receipt {
                tx_hash: tx.clone(),
                block_number: state.block_number,
                credential: pending.credential,
            };
            (receipt, event)
        };

        if let Some(event) = event {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }

        Ok(receipt)
    }
}
