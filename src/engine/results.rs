// 8.0.2: result types and errors for engine operations.

use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;
use crate::custody::TransferError;
use crate::intent::IntentError;
use crate::margin::InvariantError;
use crate::oracle::OracleError;
use crate::order::Order;
use crate::position::PositionError;
use crate::types::{AccountId, Quote, Timestamp};
use crate::verifier::VerifierError;
use crate::version::VersionError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Orders and versions processed while bringing the books up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettleOutcome {
    pub versions: usize,
    pub local_orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub account: AccountId,
    // pending id the order landed in, none for a no-op
    pub order_id: Option<u64>,
    pub order: Order,
    pub settled: SettleOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentOutcome {
    pub signer: AccountId,
    pub counterparty: AccountId,
    pub signer_order_id: u64,
    pub counter_order_id: u64,
    pub settled: SettleOutcome,
}

/// What a liquidator would submit right now, and what it would earn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationQuote {
    pub account: AccountId,
    pub liquidatable: bool,
    pub maker: Decimal,
    pub long: Decimal,
    pub short: Decimal,
    pub price: Decimal,
    pub fee: Quote,
}

/// Coarse grouping of failures, in the order the checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Authorization,
    Policy,
    Validity,
    Solvency,
    Intent,
    Collaborator,
    Internal,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("market is paused")]
    Paused,

    #[error("{sender} may not act for {account}")]
    Unauthorized { account: AccountId, sender: AccountId },

    #[error("engine is already processing a call")]
    Reentrant,

    #[error("referrer {requested:?} conflicts with {existing:?} on the pending order")]
    ReferrerMismatch {
        existing: Option<AccountId>,
        requested: Option<AccountId>,
    },

    #[error("no carry recorded for invalid version {0}")]
    MissingCarry(Timestamp),

    #[error("account {0} was not loaded")]
    AccountNotLoaded(AccountId),

    #[error(transparent)]
    Invariant(#[from] InvariantError),

    #[error(transparent)]
    Position(#[from] PositionError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("intent rejected: {0}")]
    Intent(#[from] IntentError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("verifier error: {0}")]
    Verifier(#[from] VerifierError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("version log error: {0}")]
    Version(#[from] VersionError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Paused | EngineError::Unauthorized { .. } | EngineError::Reentrant => {
                ErrorCategory::Authorization
            }
            EngineError::Invariant(e) => match e {
                InvariantError::InsufficientCollateral { .. }
                | InvariantError::InsufficientMargin { .. }
                | InvariantError::OutstandingDeficit { .. } => ErrorCategory::Solvency,
                InvariantError::StalePrice { .. } | InvariantError::InvalidProtection { .. } => {
                    ErrorCategory::Validity
                }
                _ => ErrorCategory::Policy,
            },
            EngineError::Position(_) | EngineError::Config(_) => ErrorCategory::Policy,
            EngineError::Intent(_) | EngineError::ReferrerMismatch { .. } => ErrorCategory::Intent,
            EngineError::Oracle(_) | EngineError::Verifier(_) | EngineError::Transfer(_) => {
                ErrorCategory::Collaborator
            }
            EngineError::MissingCarry(_)
            | EngineError::AccountNotLoaded(_)
            | EngineError::Version(_)
            | EngineError::Checkpoint(_) => ErrorCategory::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn categories_follow_check_order() {
        assert_eq!(EngineError::Paused.category(), ErrorCategory::Authorization);
        assert_eq!(
            EngineError::from(InvariantError::InsufficientMargin {
                collateral: Quote::new(dec!(1)),
                required: Quote::new(dec!(2)),
            })
            .category(),
            ErrorCategory::Solvency
        );
        assert_eq!(EngineError::from(InvariantError::SettleOnly).category(), ErrorCategory::Policy);
        assert_eq!(
            EngineError::from(IntentError::ZeroAmount).category(),
            ErrorCategory::Intent
        );
        assert_eq!(
            EngineError::from(TransferError::Halted).category(),
            ErrorCategory::Collaborator
        );
        assert_eq!(EngineError::MissingCarry(Timestamp(5)).category(), ErrorCategory::Internal);
    }
}
