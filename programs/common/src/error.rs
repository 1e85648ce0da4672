//! Error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the caller must react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Per-account failure; the batch continues
    Recoverable,
    /// Invariant or configuration violation; the request halts
    Fatal,
    /// Rejected before any state was touched
    Unauthorized,
}

/// Engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerpliqError {
    // Common errors (0-99)
    #[error("arithmetic overflow")]
    Overflow,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Subaccount / ledger errors (100-199)
    #[error("subaccount {0} not found")]
    SubaccountNotFound(String),
    #[error("ledger invariant violated: {0}")]
    LedgerInvariant(String),

    // Market configuration errors (200-299)
    #[error("ClobPair with id {0} not found")]
    ClobPairNotFound(u32),
    #[error("perpetual {0} not found")]
    PerpetualNotFound(u32),
    #[error("liquidity tier {0} not found")]
    LiquidityTierNotFound(u32),
    #[error("market price {0} not found")]
    MarketPriceNotFound(u32),
    #[error("no clob pair is registered for perpetual {0}")]
    PerpetualHasNoClobPair(u32),

    // Book errors (300-399)
    #[error("order {0} not found")]
    OrderNotFound(u64),
    #[error("invalid order: {0}")]
    InvalidOrder(String),
    #[error("order {0} already exists")]
    DuplicateOrder(u64),

    // Liquidation errors (400-499)
    #[error("insufficient resting liquidity")]
    InsufficientLiquidity,
    #[error("no deleveraging counterparty could absorb the residual")]
    NoDeleveragingCounterparty,
    #[error("insurance fund has insufficient funds: required {required}, available {available}")]
    InsuranceFundInsufficient { required: u128, available: u128 },
    #[error("per-block insurance loss limit reached")]
    InsuranceLossLimitReached,

    // Governance errors (500-599)
    #[error("invalid authority: expected {expected}, got {got}")]
    InvalidAuthority { expected: String, got: String },
    #[error("invalid clob pair status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },
}

impl PerpliqError {
    /// Numeric code, stable across releases
    pub fn code(&self) -> u32 {
        match self {
            PerpliqError::Overflow => 5,
            PerpliqError::InvalidConfig(_) => 7,
            PerpliqError::SubaccountNotFound(_) => 100,
            PerpliqError::LedgerInvariant(_) => 101,
            PerpliqError::ClobPairNotFound(_) => 200,
            PerpliqError::PerpetualNotFound(_) => 201,
            PerpliqError::LiquidityTierNotFound(_) => 202,
            PerpliqError::MarketPriceNotFound(_) => 203,
            PerpliqError::PerpetualHasNoClobPair(_) => 204,
            PerpliqError::OrderNotFound(_) => 300,
            PerpliqError::InvalidOrder(_) => 301,
            PerpliqError::DuplicateOrder(_) => 302,
            PerpliqError::InsufficientLiquidity => 400,
            PerpliqError::NoDeleveragingCounterparty => 401,
            PerpliqError::InsuranceFundInsufficient { .. } => 402,
            PerpliqError::InsuranceLossLimitReached => 403,
            PerpliqError::InvalidAuthority { .. } => 500,
            PerpliqError::InvalidStatusTransition { .. } => 501,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PerpliqError::Overflow
            | PerpliqError::InvalidConfig(_)
            | PerpliqError::LedgerInvariant(_)
            | PerpliqError::ClobPairNotFound(_)
            | PerpliqError::PerpetualNotFound(_)
            | PerpliqError::LiquidityTierNotFound(_)
            | PerpliqError::MarketPriceNotFound(_)
            | PerpliqError::PerpetualHasNoClobPair(_) => Severity::Fatal,
            PerpliqError::InvalidAuthority { .. } => Severity::Unauthorized,
            PerpliqError::SubaccountNotFound(_)
            | PerpliqError::OrderNotFound(_)
            | PerpliqError::InvalidOrder(_)
            | PerpliqError::DuplicateOrder(_)
            | PerpliqError::InsufficientLiquidity
            | PerpliqError::NoDeleveragingCounterparty
            | PerpliqError::InsuranceFundInsufficient { .. }
            | PerpliqError::InsuranceLossLimitReached
            | PerpliqError::InvalidStatusTransition { .. } => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl From<PerpliqError> for u64 {
    fn from(e: PerpliqError) -> u64 {
        e.code() as u64
    }
}

/// Result type for engine operations
pub type Result<T> = core::result::Result<T, PerpliqError>;
