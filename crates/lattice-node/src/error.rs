use lattice_consensus::ConsensusError;
use lattice_core::AccountId;
use lattice_state::StateError;
use thiserror::Error;

/// Why a transfer was not committed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("Transfer amount must be positive")]
    InvalidAmount,

    #[error("Unknown account: {0}")]
    UnknownAccount(AccountId),

    #[error("Cannot transfer to self: {0}")]
    SelfTransfer(AccountId),

    #[error("Rate limited: {0}")]
    RateLimited(AccountId),

    #[error("Ledger rejected block: {0}")]
    Ledger(#[from] StateError),

    #[error("Certification failed: {0}")]
    Certification(#[from] ConsensusError),

    #[error("Timed out waiting for the node")]
    Timeout,
}

/// Coarse failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionCategory {
    /// Rejected before any work; cheap and expected
    Admission,
    /// Request built against stale or insufficient state; rebuild and resubmit
    LedgerConsistency,
    /// No quorum; fatal for this transfer
    Certification,
}

impl RejectionReason {
    pub fn category(&self) -> RejectionCategory {
        match self {
            RejectionReason::InvalidAmount
            | RejectionReason::UnknownAccount(_)
            | RejectionReason::SelfTransfer(_)
            | RejectionReason::RateLimited(_)
            | RejectionReason::Timeout => RejectionCategory::Admission,
            RejectionReason::Ledger(_) => RejectionCategory::LedgerConsistency,
            RejectionReason::Certification(_) => RejectionCategory::Certification,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Genesis error: {0}")]
    Genesis(#[from] StateError),
}
