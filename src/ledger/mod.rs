//! Ledger client seam.
//!
//! The relayer only needs three things from a ledger: a stream of contract
//! events, a way to send a write signed by a given credential, and a way to
//! wait for that write to be confirmed.

mod simulated;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::params::{Commitment, ModifierKind};
use crate::pool::{Credential, CredentialId};

pub use simulated::{SimulatedLedger, WriteRecord};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("insufficient funds for gas")]
    InsufficientFunds,

    #[error("nonce conflict for credential {0}")]
    NonceConflict(CredentialId),

    #[error("unknown transaction: {0}")]
    UnknownTransaction(TxHash),

    #[error("ledger transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid address {0:?}: expected 0x followed by 40 hex digits")]
pub struct AddressError(pub String);

/// A 20-byte account address in `0x`-prefixed hex form, stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AddressError(s.to_string()))?;
        if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AddressError(s.to_string()));
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contracts the relayer writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Contract {
    ReverseAuction,
    TicketNft,
    ModifierNft,
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contract::ReverseAuction => write!(f, "reverse-auction"),
            Contract::TicketNft => write!(f, "ticket-nft"),
            Contract::ModifierNft => write!(f, "modifier-nft"),
        }
    }
}

/// Deployed addresses of the contracts the relayer writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub reverse_auction: Address,
    pub ticket_nft: Address,
    pub modifier_nft: Address,
}

/// Goerli deployment.
pub const DEFAULT_REVERSE_AUCTION_ADDRESS: &str = "0x79f149F9917c89ccA2bd24a01ee4a49cc0384dDD";
pub const DEFAULT_TICKET_NFT_ADDRESS: &str = "0xaf7AE21675F7b9bf2f801A8f140847390947fe86";
pub const DEFAULT_MODIFIER_NFT_ADDRESS: &str = "0x10DD0bcFDeFE224B7841f49DC252fC6F41CAD9E0";

impl Default for ContractAddresses {
    fn default() -> Self {
        let known = |s: &str| Address(s.to_ascii_lowercase());
        Self {
            reverse_auction: known(DEFAULT_REVERSE_AUCTION_ADDRESS),
            ticket_nft: known(DEFAULT_TICKET_NFT_ADDRESS),
            modifier_nft: known(DEFAULT_MODIFIER_NFT_ADDRESS),
        }
    }
}

impl ContractAddresses {
    pub fn address(&self, contract: Contract) -> &Address {
        match contract {
            Contract::ReverseAuction => &self.reverse_auction,
            Contract::TicketNft => &self.ticket_nft,
            Contract::ModifierNft => &self.modifier_nft,
        }
    }
}

/// A typed contract write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractCall {
    SetTokenUri {
        contract: Contract,
        token_id: u64,
        uri: String,
    },
    BuyModifier {
        owner: Address,
        kind: ModifierKind,
        value: u8,
    },
    ParticipateRandomAuction {
        commitment: Commitment,
        auction_id: u64,
        participant: Address,
    },
}

impl ContractCall {
    pub fn contract(&self) -> Contract {
        match self {
            ContractCall::SetTokenUri { contract, .. } => *contract,
            ContractCall::BuyModifier { .. } | ContractCall::ParticipateRandomAuction { .. } => {
                Contract::ReverseAuction
            }
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            ContractCall::SetTokenUri { .. } => "setTokenURI",
            ContractCall::BuyModifier { .. } => "buyModifier",
            ContractCall::ParticipateRandomAuction { .. } => "participateRandomAuction",
        }
    }
}

/// Confirmation of a mined write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub credential: CredentialId,
}

/// Contract events the relayer reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A bidder committed to an auction and was issued a ticket.
    TicketClaimed {
        bidder: Address,
        auction_id: u64,
        ticket_id: u64,
    },
    /// A modifier NFT was minted to `owner`.
    ModifierPurchased {
        owner: Address,
        modifier_id: u64,
        kind: ModifierKind,
        value: u8,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::TicketClaimed { .. } => "ticket-claimed",
            LedgerEvent::ModifierPurchased { .. } => "modifier-purchased",
        }
    }
}

#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    /// Subscribe to contract events emitted from now on.
    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent>;

    /// Sign `call` with `credential` and broadcast it.
    async fn send(&self, credential: &Credential, call: ContractCall)
        -> Result<TxHash, LedgerError>;

    /// Wait until `tx` is final.
    async fn confirm(&self, tx: &TxHash) -> Result<Receipt, LedgerError>;

    /// Ask the auction contract to seal `number` under `password`. The
    /// contract checks reveals against its own derivation, so this is a
    /// read against the ledger rather than a local computation.
    async fn create_commitment(&self, number: u32, password: &str)
        -> Result<Commitment, LedgerError>;

    /// Send and wait for confirmation.
    async fn execute(
        &self,
        credential: &Credential,
        call: ContractCall,
    ) -> Result<Receipt, LedgerError> {
        let tx = self.send(credential, call).await?;
        self.confirm(&tx).await
    }
}
