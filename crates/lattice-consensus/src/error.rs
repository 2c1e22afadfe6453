use lattice_core::{AccountId, Hash};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("No members available for committee selection")]
    NoMembersAvailable,

    #[error("Committee size must be at least 1")]
    InvalidCommitteeSize,

    #[error("Vote for wrong block: expected {expected}, got {got}")]
    BlockHashMismatch { expected: Hash, got: Hash },

    #[error("Vote targets committee {got_id}@{got_epoch}, expected {expected_id}@{expected_epoch}")]
    CommitteeMismatch {
        expected_id: String,
        expected_epoch: u64,
        got_id: String,
        got_epoch: u64,
    },

    #[error("Bitmap index {index} out of range for committee of {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Member {member} does not sit at bitmap index {index}")]
    MemberIndexMismatch { member: AccountId, index: usize },

    #[error("Invalid partial signature from {0}")]
    InvalidPartialSignature(AccountId),

    #[error("Certification failed: have {have} distinct votes, need {need}")]
    CertificationFailed { have: usize, need: usize },

    #[error("Invalid quorum certificate: {0}")]
    InvalidQc(String),
}
