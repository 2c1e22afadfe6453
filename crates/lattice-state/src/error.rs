use lattice_core::{AccountId, Hash};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Account already exists: {0}")]
    AlreadyExists(AccountId),

    #[error("Unknown account: {0}")]
    UnknownAccount(AccountId),

    #[error("Stale head for {account}: expected {expected}, block extends {got}")]
    StaleHead {
        account: AccountId,
        expected: Hash,
        got: Hash,
    },

    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },

    #[error("Balance overflow crediting {0}")]
    BalanceOverflow(AccountId),
}
