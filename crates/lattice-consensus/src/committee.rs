use std::collections::{BTreeMap, BTreeSet};

use lattice_core::{canonical_hash, hash_sha256, AccountId, CanonicalValue, Committee};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::ConsensusError;

/// Member -> 1-based bitmap index
pub type IndexMap = BTreeMap<AccountId, usize>;

/// 32-bit seed: first four bytes (big-endian) of
/// `SHA-256(epoch || "|" || initiator || "|" || seq)`, numbers in decimal.
pub fn committee_seed(epoch: u64, initiator: &AccountId, seq: u64) -> u32 {
    let input = format!("{}|{}|{}", epoch, initiator, seq);
    let digest = hash_sha256(input.as_bytes());
    let bytes = digest.as_bytes();
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Sample a committee of up to `committee_size` members.
///
/// The candidate pool is treated as a set: duplicates are dropped and the
/// pool is sorted before shuffling, so the result depends only on the set
/// of members and the `(committee_size, epoch, initiator, seq)` key.
pub fn select_committee(
    members: &[AccountId],
    committee_size: usize,
    epoch: u64,
    initiator: &AccountId,
    seq: u64,
) -> Result<(Committee, IndexMap), ConsensusError> {
    if committee_size == 0 {
        return Err(ConsensusError::InvalidCommitteeSize);
    }

    let mut pool: Vec<AccountId> = members
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if pool.is_empty() {
        return Err(ConsensusError::NoMembersAvailable);
    }

    let seed = committee_seed(epoch, initiator, seq);
    let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
    pool.shuffle(&mut rng);
    pool.truncate(committee_size);

    let index_map: IndexMap = pool
        .iter()
        .enumerate()
        .map(|(i, member)| (member.clone(), i + 1))
        .collect();

    let id = committee_id(epoch, seed, &pool);

    debug!(
        "Selected committee {} at epoch {} for {}#{}: {} members",
        id,
        epoch,
        initiator,
        seq,
        pool.len()
    );

    Ok((
        Committee {
            epoch,
            id,
            members: pool,
        },
        index_map,
    ))
}

fn committee_id(epoch: u64, seed: u32, members: &[AccountId]) -> String {
    let value = CanonicalValue::object()
        .field("epoch", epoch)
        .field("seed", seed as u64)
        .field(
            "members",
            CanonicalValue::Array(members.iter().map(|m| m.as_str().into()).collect()),
        )
        .build();
    let digest = canonical_hash(&value);
    hex::encode(&digest.as_bytes()[..8])
}
