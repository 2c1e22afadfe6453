//! Lattice Consensus - Committee sampling and quorum certification
//!
//! This crate provides deterministic committee selection, the voting
//! schemes committee members sign with, and quorum certificate
//! aggregation and verification.

pub mod committee;
pub mod error;
pub mod qc;
pub mod scheme;

pub use committee::{committee_seed, select_committee, IndexMap};
pub use error::ConsensusError;
pub use qc::{aggregate, effective_threshold, verify_qc, QuorumAggregator};
pub use scheme::{cast_votes, Ed25519VoteScheme, HashVoteScheme, VoteScheme, VoteSchemeKind};
