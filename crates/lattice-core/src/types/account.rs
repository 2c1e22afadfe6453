use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Hash;

/// Opaque account identifier. No key validation happens at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        AccountId(value.to_string())
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        AccountId(value)
    }
}

/// Per-account state in the lattice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AccountState {
    pub balance: u128,
    /// Hash of the last block applied to this account's chain
    pub head: Hash,
    /// Number of blocks applied to this account's chain
    pub nonce: u64,
    pub representative: Option<AccountId>,
}

impl AccountState {
    /// Fresh account: zero head, nonce 0
    pub fn new(balance: u128) -> Self {
        AccountState {
            balance,
            head: Hash::ZERO,
            nonce: 0,
            representative: None,
        }
    }

    /// Height the next block on this chain must carry
    pub fn next_height(&self) -> u64 {
        self.nonce + 1
    }
}
