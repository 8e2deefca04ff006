//! Error types for the Tesseract settlement coordinator

use crate::types::{ChainId, MessageId, SeriesId};

use alloy_primitives::Address;
use thiserror::Error;

/// Main error type for protocol and service operations
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Caller {0} is not an authorized relayer")]
    UnauthorizedRelayer(Address),

    #[error("Caller {0} is not the owner")]
    NotOwner(Address),

    #[error("Operation is only available on the hub")]
    NotHub,

    #[error("Operation is only available on a spoke")]
    NotSpoke,

    #[error("Address must not be zero")]
    ZeroAddress,

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Chain {0} already registered")]
    ChainAlreadyRegistered(ChainId),

    #[error("Chain {0} not registered")]
    ChainNotRegistered(ChainId),

    #[error("Chain {0} is inactive")]
    ChainInactive(ChainId),

    #[error("Chain {0} is the local chain and reports through its own sync")]
    LocalSource(ChainId),

    #[error("Series {0} not found")]
    SeriesNotFound(SeriesId),

    #[error("Series {0} already settled")]
    AlreadySettled(SeriesId),

    #[error("Series {0} not settled")]
    NotSettled(SeriesId),

    #[error("Settlement price must be positive")]
    InvalidSettlementPrice,

    #[error("Insufficient collateral: requested {requested}, available {available}")]
    InsufficientCollateral { requested: u128, available: u128 },

    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: u128, available: u128 },

    #[error("Collateral still locked: {locked}")]
    CollateralOutstanding { locked: u128 },

    #[error("Sync for series {series_id} on chain {chain_id} too frequent, retry after {retry_after}")]
    SyncTooFrequent {
        series_id: SeriesId,
        chain_id: ChainId,
        retry_after: u64,
    },

    #[error("Message {0} not found")]
    MessageNotFound(MessageId),

    #[error("Message {0} already processed")]
    MessageAlreadyProcessed(MessageId),

    #[error("Message {0} expired")]
    MessageExpired(MessageId),

    #[error("Rebalance source and target are both chain {0}")]
    SelfTarget(ChainId),

    #[error("Rebalance request {0} not found")]
    RebalanceNotFound(u64),

    #[error("Rebalance request {0} already executed")]
    RebalanceAlreadyExecuted(u64),

    #[error("Contract is paused")]
    ContractPaused,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Token transfer failed: {0}")]
    TokenTransfer(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad classification used for HTTP status mapping and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Precondition,
    Resource,
    Temporal,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authorization => "authorization",
            ErrorKind::Precondition => "precondition",
            ErrorKind::Resource => "resource",
            ErrorKind::Temporal => "temporal",
            ErrorKind::Internal => "internal",
        }
    }
}

impl PoolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::UnauthorizedRelayer(_) | PoolError::NotOwner(_) => ErrorKind::Authorization,

            PoolError::InsufficientCollateral { .. }
            | PoolError::InsufficientLiquidity { .. }
            | PoolError::CollateralOutstanding { .. }
            | PoolError::TokenTransfer(_) => ErrorKind::Resource,

            PoolError::SyncTooFrequent { .. } | PoolError::MessageExpired(_) => {
                ErrorKind::Temporal
            }

            PoolError::ArithmeticOverflow
            | PoolError::Config(_)
            | PoolError::Database(_)
            | PoolError::Internal(_) => ErrorKind::Internal,

            _ => ErrorKind::Precondition,
        }
    }

    /// Check if the caller may retry the same call later
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Temporal
    }

    /// Check if error should trigger an alert
    pub fn should_alert(&self) -> bool {
        matches!(
            self,
            PoolError::ArithmeticOverflow | PoolError::Database(_) | PoolError::Internal(_)
        )
    }
}

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;
