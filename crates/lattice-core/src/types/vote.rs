use serde::{Deserialize, Serialize};

use crate::codec::{Canonical, CanonicalValue};
use crate::crypto::Hash;
use crate::error::CoreError;
use crate::types::account::AccountId;
use crate::types::bytes_b64;

/// Committee sampled to certify one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committee {
    pub epoch: u64,
    pub id: String,
    /// Ordered, duplicate-free; position `i` votes at bitmap index `i + 1`
    pub members: Vec<AccountId>,
}

impl Committee {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Member seated at a 1-based bitmap index
    pub fn member_at(&self, bitmap_index: usize) -> Option<&AccountId> {
        bitmap_index
            .checked_sub(1)
            .and_then(|i| self.members.get(i))
    }

    /// 1-based bitmap index of a member
    pub fn index_of(&self, member: &AccountId) -> Option<usize> {
        self.members.iter().position(|m| m == member).map(|i| i + 1)
    }
}

/// One committee member's vote for a block hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialVote {
    pub block_hash: Hash,
    pub committee_epoch: u64,
    pub committee_id: String,
    pub member_id: AccountId,
    /// 1-based position of `member_id` in the committee ordering
    pub bitmap_index: usize,
    #[serde(with = "bytes_b64")]
    pub partial_signature: Vec<u8>,
}

/// Fixed-width bitset sized to a committee.
///
/// `bits` is exactly `len.div_ceil(8)` bytes and every bit past `len` is
/// zero; deserialization enforces both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBitmap")]
pub struct Bitmap {
    len: usize,
    #[serde(with = "bytes_b64")]
    bits: Vec<u8>,
}

#[derive(Deserialize)]
struct RawBitmap {
    len: usize,
    #[serde(with = "bytes_b64")]
    bits: Vec<u8>,
}

impl TryFrom<RawBitmap> for Bitmap {
    type Error = CoreError;

    fn try_from(raw: RawBitmap) -> Result<Self, Self::Error> {
        Bitmap::from_parts(raw.len, raw.bits)
    }
}

impl Bitmap {
    pub fn new(len: usize) -> Self {
        Bitmap {
            len,
            bits: vec![0u8; len.div_ceil(8)],
        }
    }

    /// Rebuild a bitmap from its wire parts
    pub fn from_parts(len: usize, bits: Vec<u8>) -> Result<Self, CoreError> {
        if bits.len() != len.div_ceil(8) {
            return Err(CoreError::InvalidBitmap(format!(
                "{} bytes for {} bits",
                bits.len(),
                len
            )));
        }
        if len % 8 != 0 {
            if let Some(last) = bits.last() {
                if last >> (len % 8) != 0 {
                    return Err(CoreError::InvalidBitmap("padding bits set".to_string()));
                }
            }
        }
        Ok(Bitmap { len, bits })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set a 1-based index. Returns false if it was already set or is out of range.
    pub fn set(&mut self, index: usize) -> bool {
        if index == 0 || index > self.len {
            return false;
        }
        let bit = index - 1;
        let mask = 1u8 << (bit % 8);
        let byte = &mut self.bits[bit / 8];
        if *byte & mask != 0 {
            return false;
        }
        *byte |= mask;
        true
    }

    pub fn get(&self, index: usize) -> bool {
        if index == 0 || index > self.len {
            return false;
        }
        let bit = index - 1;
        self.bits
            .get(bit / 8)
            .is_some_and(|byte| byte & (1u8 << (bit % 8)) != 0)
    }

    /// Set indices within `1..=len`
    pub fn count_ones(&self) -> usize {
        self.iter_set().count()
    }

    /// Set indices in ascending order
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (1..=self.len).filter(move |i| self.get(*i))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }
}

/// Proof that at least `threshold` distinct committee members voted for `block_hash`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumCert {
    pub block_hash: Hash,
    pub committee_epoch: u64,
    pub committee_id: String,
    pub bitmap: Bitmap,
    /// Accepted partials concatenated in ascending bitmap-index order
    #[serde(with = "bytes_b64")]
    pub aggregated_signature: Vec<u8>,
    pub threshold: usize,
}

impl QuorumCert {
    pub fn signer_count(&self) -> usize {
        self.bitmap.count_ones()
    }
}

impl Canonical for QuorumCert {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object()
            .field("block_hash", self.block_hash)
            .field("committee_epoch", self.committee_epoch)
            .field("committee_id", self.committee_id.as_str())
            .field("bitmap_len", self.bitmap.len() as u64)
            .bytes("bitmap", self.bitmap.as_bytes())
            .bytes("aggregated_signature", &self.aggregated_signature)
            .field("threshold", self.threshold as u64)
            .build()
    }
}
