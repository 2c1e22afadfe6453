use std::collections::BTreeMap;

use lattice_core::{Bitmap, Committee, Hash, PartialVote, QuorumCert};
use tracing::debug;

use crate::error::ConsensusError;
use crate::scheme::VoteScheme;

/// `min(configured, committee_size)`: a small committee must stay certifiable
pub fn effective_threshold(configured: usize, committee_size: usize) -> usize {
    configured.min(committee_size)
}

/// Quorum certificate collector for one block and one committee
pub struct QuorumAggregator<'a> {
    block_hash: Hash,
    committee: &'a Committee,
    scheme: &'a dyn VoteScheme,
    threshold: usize,
    bitmap: Bitmap,
    partials: BTreeMap<usize, Vec<u8>>,
}

impl<'a> QuorumAggregator<'a> {
    pub fn new(
        block_hash: Hash,
        committee: &'a Committee,
        configured_threshold: usize,
        scheme: &'a dyn VoteScheme,
    ) -> Self {
        QuorumAggregator {
            block_hash,
            committee,
            scheme,
            threshold: effective_threshold(configured_threshold, committee.size()),
            bitmap: Bitmap::new(committee.size()),
            partials: BTreeMap::new(),
        }
    }

    /// Add a member's vote. Returns whether quorum has been reached.
    ///
    /// A vote for another block hash is an error, never silently dropped.
    /// A repeat vote at an already-set index is ignored.
    pub fn add_vote(&mut self, vote: &PartialVote) -> Result<bool, ConsensusError> {
        if vote.block_hash != self.block_hash {
            return Err(ConsensusError::BlockHashMismatch {
                expected: self.block_hash,
                got: vote.block_hash,
            });
        }

        if vote.committee_id != self.committee.id || vote.committee_epoch != self.committee.epoch {
            return Err(ConsensusError::CommitteeMismatch {
                expected_id: self.committee.id.clone(),
                expected_epoch: self.committee.epoch,
                got_id: vote.committee_id.clone(),
                got_epoch: vote.committee_epoch,
            });
        }

        let seated = self.committee.member_at(vote.bitmap_index).ok_or(
            ConsensusError::IndexOutOfRange {
                index: vote.bitmap_index,
                size: self.committee.size(),
            },
        )?;

        if *seated != vote.member_id {
            return Err(ConsensusError::MemberIndexMismatch {
                member: vote.member_id.clone(),
                index: vote.bitmap_index,
            });
        }

        if self.bitmap.get(vote.bitmap_index) {
            debug!("Duplicate vote from {} at index {}", vote.member_id, vote.bitmap_index);
            return Ok(self.has_quorum());
        }

        if !self
            .scheme
            .verify(&vote.member_id, &self.block_hash, &vote.partial_signature)
        {
            return Err(ConsensusError::InvalidPartialSignature(vote.member_id.clone()));
        }

        self.bitmap.set(vote.bitmap_index);
        self.partials
            .insert(vote.bitmap_index, vote.partial_signature.clone());

        debug!(
            "Added vote from {}, total: {}/{}",
            vote.member_id,
            self.vote_count(),
            self.threshold
        );

        Ok(self.has_quorum())
    }

    pub fn has_quorum(&self) -> bool {
        let have = self.vote_count();
        have > 0 && have >= self.threshold
    }

    /// Distinct indices that have voted
    pub fn vote_count(&self) -> usize {
        self.bitmap.count_ones()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Build the certificate (only if we have quorum)
    pub fn build(self) -> Result<QuorumCert, ConsensusError> {
        if !self.has_quorum() {
            return Err(ConsensusError::CertificationFailed {
                have: self.vote_count(),
                need: self.threshold.max(1),
            });
        }

        let aggregated_signature = self.partials.into_values().flatten().collect();

        Ok(QuorumCert {
            block_hash: self.block_hash,
            committee_epoch: self.committee.epoch,
            committee_id: self.committee.id.clone(),
            bitmap: self.bitmap,
            aggregated_signature,
            threshold: self.threshold,
        })
    }
}

/// Aggregate a batch of votes for `block_hash` into a certificate
pub fn aggregate(
    block_hash: Hash,
    votes: &[PartialVote],
    committee: &Committee,
    configured_threshold: usize,
    scheme: &dyn VoteScheme,
) -> Result<QuorumCert, ConsensusError> {
    let mut aggregator = QuorumAggregator::new(block_hash, committee, configured_threshold, scheme);
    for vote in votes {
        aggregator.add_vote(vote)?;
    }
    aggregator.build()
}

/// Verify a quorum certificate against the committee that produced it
pub fn verify_qc(
    qc: &QuorumCert,
    committee: &Committee,
    scheme: &dyn VoteScheme,
) -> Result<(), ConsensusError> {
    if qc.committee_id != committee.id || qc.committee_epoch != committee.epoch {
        return Err(ConsensusError::InvalidQc("committee mismatch".to_string()));
    }

    if qc.bitmap.len() != committee.size() {
        return Err(ConsensusError::InvalidQc(format!(
            "bitmap sized {} for committee of {}",
            qc.bitmap.len(),
            committee.size()
        )));
    }

    if qc.threshold > committee.size() {
        return Err(ConsensusError::InvalidQc(format!(
            "threshold {} exceeds committee size {}",
            qc.threshold,
            committee.size()
        )));
    }

    let signers = qc.signer_count();
    if signers == 0 || signers < qc.threshold {
        return Err(ConsensusError::CertificationFailed {
            have: signers,
            need: qc.threshold.max(1),
        });
    }

    let sig_len = scheme.signature_len();
    if qc.aggregated_signature.len() != signers * sig_len {
        return Err(ConsensusError::InvalidQc(format!(
            "aggregate is {} bytes, expected {}",
            qc.aggregated_signature.len(),
            signers * sig_len
        )));
    }

    let mut verified = 0;
    for (partial, index) in qc
        .aggregated_signature
        .chunks(sig_len)
        .zip(qc.bitmap.iter_set())
    {
        let member = committee
            .member_at(index)
            .ok_or(ConsensusError::IndexOutOfRange {
                index,
                size: committee.size(),
            })?;
        if !scheme.verify(member, &qc.block_hash, partial) {
            return Err(ConsensusError::InvalidPartialSignature(member.clone()));
        }
        verified += 1;
    }

    // Every set bit must be backed by a checked partial
    if verified != signers {
        return Err(ConsensusError::InvalidQc(format!(
            "{} partials verified for {} signers",
            verified, signers
        )));
    }

    Ok(())
}
