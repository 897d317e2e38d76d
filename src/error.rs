use thiserror::Error;

use crate::ledger::LedgerError;
use crate::params::ParamError;
use crate::pool::PoolError;
use crate::queue::JobError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
