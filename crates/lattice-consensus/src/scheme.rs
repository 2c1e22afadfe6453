use std::collections::HashMap;
use std::fmt;

use lattice_core::{hash_concat, AccountId, Committee, Hash, KeyPair, PartialVote, PublicKey};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Signing capability of committee members.
///
/// The aggregator only deals in bitmap positions and opaque partials, so a
/// real signature scheme can replace the placeholder without touching it.
pub trait VoteScheme: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Partial signature of `member` over `block_hash`
    fn sign(&self, member: &AccountId, block_hash: &Hash) -> Vec<u8>;

    fn verify(&self, member: &AccountId, block_hash: &Hash, partial: &[u8]) -> bool;

    /// Fixed byte length of every partial this scheme produces
    fn signature_len(&self) -> usize;
}

/// Placeholder scheme: `SHA-256(block_hash || member_id)`
#[derive(Debug, Clone, Copy, Default)]
pub struct HashVoteScheme;

impl VoteScheme for HashVoteScheme {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn sign(&self, member: &AccountId, block_hash: &Hash) -> Vec<u8> {
        hash_concat(&[block_hash.as_bytes(), member.as_str().as_bytes()]).to_vec()
    }

    fn verify(&self, member: &AccountId, block_hash: &Hash, partial: &[u8]) -> bool {
        self.sign(member, block_hash) == partial
    }

    fn signature_len(&self) -> usize {
        32
    }
}

/// Ed25519 scheme with per-member keys derived from the account id
#[derive(Debug, Default)]
pub struct Ed25519VoteScheme {
    keys: Mutex<HashMap<AccountId, KeyPair>>,
}

impl Ed25519VoteScheme {
    pub fn new() -> Self {
        Self::default()
    }

    fn keypair(&self, member: &AccountId) -> KeyPair {
        self.keys
            .lock()
            .entry(member.clone())
            .or_insert_with(|| KeyPair::derive_for_account(member.as_str()))
            .clone()
    }

    pub fn public_key(&self, member: &AccountId) -> PublicKey {
        self.keypair(member).public
    }
}

impl VoteScheme for Ed25519VoteScheme {
    fn name(&self) -> &'static str {
        "ed25519"
    }

    fn sign(&self, member: &AccountId, block_hash: &Hash) -> Vec<u8> {
        self.keypair(member).secret.sign(block_hash.as_bytes())
    }

    fn verify(&self, member: &AccountId, block_hash: &Hash, partial: &[u8]) -> bool {
        self.public_key(member)
            .verify(block_hash.as_bytes(), partial)
            .is_ok()
    }

    fn signature_len(&self) -> usize {
        lattice_core::crypto::SIGNATURE_LEN
    }
}

/// Scheme selector used by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoteSchemeKind {
    #[default]
    Hash,
    Ed25519,
}

impl VoteSchemeKind {
    pub fn build(self) -> Box<dyn VoteScheme> {
        match self {
            VoteSchemeKind::Hash => Box::new(HashVoteScheme),
            VoteSchemeKind::Ed25519 => Box::new(Ed25519VoteScheme::new()),
        }
    }
}

/// Every committee member votes for `block_hash`, in committee order
pub fn cast_votes(committee: &Committee, block_hash: &Hash, scheme: &dyn VoteScheme) -> Vec<PartialVote> {
    committee
        .members
        .iter()
        .enumerate()
        .map(|(i, member)| PartialVote {
            block_hash: *block_hash,
            committee_epoch: committee.epoch,
            committee_id: committee.id.clone(),
            member_id: member.clone(),
            bitmap_index: i + 1,
            partial_signature: scheme.sign(member, block_hash),
        })
        .collect()
}
