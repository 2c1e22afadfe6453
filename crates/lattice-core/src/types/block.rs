use serde::{Deserialize, Serialize};

use crate::codec::{canonical_hash, canonicalize, Canonical, CanonicalValue};
use crate::crypto::Hash;
use crate::types::account::{AccountId, AccountState};
use crate::types::bytes_b64;

/// Header shared by both block variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub account_id: AccountId,
    /// Head of the account chain this block extends
    pub prev_head: Hash,
    /// Position in the account chain (equals `nonce`)
    pub height: u64,
    /// Ledger state root observed when the block was built
    pub state_root_hint: Hash,
    pub nonce: u64,
    /// Milliseconds since the unix epoch, as read from the node clock
    pub timestamp: u64,
    pub payload_hash: Hash,
}

impl BlockHeader {
    /// Build a header extending `state`, the account's current state
    pub fn extending(
        account_id: AccountId,
        state: &AccountState,
        state_root_hint: Hash,
        timestamp: u64,
        payload_hash: Hash,
    ) -> Self {
        let height = state.next_height();
        BlockHeader {
            account_id,
            prev_head: state.head,
            height,
            state_root_hint,
            nonce: height,
            timestamp,
            payload_hash,
        }
    }
}

impl Canonical for BlockHeader {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object()
            .field("account_id", self.account_id.as_str())
            .field("prev_head", self.prev_head)
            .field("height", self.height)
            .field("state_root_hint", self.state_root_hint)
            .field("nonce", self.nonce)
            .field("timestamp", self.timestamp)
            .field("payload_hash", self.payload_hash)
            .build()
    }
}

/// Debit side of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBlock {
    pub header: BlockHeader,
    pub to_account: AccountId,
    pub amount: u128,
    pub transfer_id: Hash,
    #[serde(with = "bytes_b64")]
    pub signature: Vec<u8>,
}

impl SendBlock {
    pub fn new(
        account_id: AccountId,
        state: &AccountState,
        state_root_hint: Hash,
        timestamp: u64,
        to_account: AccountId,
        amount: u128,
        transfer_id: Hash,
    ) -> Self {
        let payload_hash = canonical_hash(&send_payload(&to_account, amount, &transfer_id));
        SendBlock {
            header: BlockHeader::extending(
                account_id,
                state,
                state_root_hint,
                timestamp,
                payload_hash,
            ),
            to_account,
            amount,
            transfer_id,
            signature: Vec::new(),
        }
    }

    pub fn hash(&self) -> Hash {
        canonical_hash(self)
    }
}

/// Credit side of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveBlock {
    pub header: BlockHeader,
    pub from_account: AccountId,
    pub transfer_id: Hash,
    #[serde(with = "bytes_b64")]
    pub signature: Vec<u8>,
}

impl ReceiveBlock {
    pub fn new(
        account_id: AccountId,
        state: &AccountState,
        state_root_hint: Hash,
        timestamp: u64,
        from_account: AccountId,
        transfer_id: Hash,
    ) -> Self {
        let payload_hash = canonical_hash(&receive_payload(&from_account, &transfer_id));
        ReceiveBlock {
            header: BlockHeader::extending(
                account_id,
                state,
                state_root_hint,
                timestamp,
                payload_hash,
            ),
            from_account,
            transfer_id,
            signature: Vec::new(),
        }
    }

    pub fn hash(&self) -> Hash {
        canonical_hash(self)
    }
}

fn send_payload(to_account: &AccountId, amount: u128, transfer_id: &Hash) -> CanonicalValue {
    CanonicalValue::object()
        .field("to_account", to_account.as_str())
        .field("amount", amount)
        .field("transfer_id", *transfer_id)
        .build()
}

fn receive_payload(from_account: &AccountId, transfer_id: &Hash) -> CanonicalValue {
    CanonicalValue::object()
        .field("from_account", from_account.as_str())
        .field("transfer_id", *transfer_id)
        .build()
}

/// Identifier linking the debit and credit halves of one transfer
pub fn derive_transfer_id(
    from: &AccountId,
    to: &AccountId,
    amount: u128,
    sender_height: u64,
    timestamp: u64,
) -> Hash {
    let value = CanonicalValue::object()
        .field("from", from.as_str())
        .field("to", to.as_str())
        .field("amount", amount)
        .field("height", sender_height)
        .field("timestamp", timestamp)
        .build();
    canonical_hash(&value)
}

/// A lattice block: exactly one of the two variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Block {
    Send(SendBlock),
    Receive(ReceiveBlock),
}

impl Block {
    pub fn header(&self) -> &BlockHeader {
        match self {
            Block::Send(b) => &b.header,
            Block::Receive(b) => &b.header,
        }
    }

    pub fn account_id(&self) -> &AccountId {
        &self.header().account_id
    }

    pub fn height(&self) -> u64 {
        self.header().height
    }

    pub fn transfer_id(&self) -> &Hash {
        match self {
            Block::Send(b) => &b.transfer_id,
            Block::Receive(b) => &b.transfer_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Block::Send(_) => "send",
            Block::Receive(_) => "receive",
        }
    }

    pub fn signature(&self) -> &[u8] {
        match self {
            Block::Send(b) => &b.signature,
            Block::Receive(b) => &b.signature,
        }
    }

    pub fn set_signature(&mut self, signature: Vec<u8>) {
        match self {
            Block::Send(b) => b.signature = signature,
            Block::Receive(b) => b.signature = signature,
        }
    }

    /// Block identity: `SHA-256` of the canonical form, signature excluded
    pub fn hash(&self) -> Hash {
        canonical_hash(self)
    }

    /// Canonical JSON of the unsigned block (the hash input)
    pub fn canonical_json(&self) -> String {
        canonicalize(self)
    }

    /// Canonical JSON including the signature, for display and export
    pub fn signed_canonical_json(&self) -> String {
        let mut value = self.to_canonical();
        if let CanonicalValue::Object(ref mut fields) = value {
            fields.insert(
                "signature".to_string(),
                CanonicalValue::Bytes(self.signature().to_vec()),
            );
        }
        canonicalize(&value)
    }
}

impl Canonical for SendBlock {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object()
            .field("kind", "send")
            .field("header", self.header.to_canonical())
            .field("to_account", self.to_account.as_str())
            .field("amount", self.amount)
            .field("transfer_id", self.transfer_id)
            .build()
    }
}

impl Canonical for ReceiveBlock {
    fn to_canonical(&self) -> CanonicalValue {
        CanonicalValue::object()
            .field("kind", "receive")
            .field("header", self.header.to_canonical())
            .field("from_account", self.from_account.as_str())
            .field("transfer_id", self.transfer_id)
            .build()
    }
}

impl Canonical for Block {
    fn to_canonical(&self) -> CanonicalValue {
        match self {
            Block::Send(b) => b.to_canonical(),
            Block::Receive(b) => b.to_canonical(),
        }
    }
}

impl From<SendBlock> for Block {
    fn from(value: SendBlock) -> Self {
        Block::Send(value)
    }
}

impl From<ReceiveBlock> for Block {
    fn from(value: ReceiveBlock) -> Self {
        Block::Receive(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_sha256;

    fn create_send(amount: u128, timestamp: u64, to: &str) -> Block {
        let state = AccountState::new(1000);
        let from = AccountId::from("alice");
        let to = AccountId::from(to);
        let transfer_id = derive_transfer_id(&from, &to, amount, 1, timestamp);
        SendBlock::new(from, &state, Hash::ZERO, timestamp, to, amount, transfer_id).into()
    }

    #[test]
    fn test_block_hash_deterministic() {
        let a = create_send(125, 1_000, "bob");
        let b = create_send(125, 1_000, "bob");
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.canonical_json(), b.canonical_json());
    }

    #[test]
    fn test_single_field_change_changes_hash() {
        let base = create_send(125, 1_000, "bob");
        assert_ne!(base.hash(), create_send(126, 1_000, "bob").hash());
        assert_ne!(base.hash(), create_send(125, 1_001, "bob").hash());
        assert_ne!(base.hash(), create_send(125, 1_000, "carol").hash());
    }

    #[test]
    fn test_header_height_equals_nonce() {
        let mut state = AccountState::new(10);
        state.nonce = 4;
        state.head = hash_sha256(b"head");
        let header = BlockHeader::extending(
            AccountId::from("alice"),
            &state,
            Hash::ZERO,
            0,
            Hash::ZERO,
        );
        assert_eq!(header.height, 5);
        assert_eq!(header.nonce, header.height);
        assert_eq!(header.prev_head, state.head);
    }

    #[test]
    fn test_signature_excluded_from_hash() {
        let mut block = create_send(125, 1_000, "bob");
        let before = block.hash();
        block.set_signature(vec![1, 2, 3]);
        assert_eq!(block.hash(), before);
        assert!(block.signed_canonical_json().contains(r#""signature":"AQID""#));
        assert!(!block.canonical_json().contains("signature"));
    }

    #[test]
    fn test_canonical_layout() {
        let block = create_send(125, 1_000, "bob");
        let json = block.canonical_json();
        assert!(json.starts_with(r#"{"amount":125,"header":{"account_id":"alice","height":1,"nonce":1,"#));
        assert!(json.contains(r#""kind":"send""#));
        assert!(json.contains(r#""to_account":"bob""#));
    }

    #[test]
    fn test_send_and_receive_hash_differently() {
        let state = AccountState::new(0);
        let transfer_id = hash_sha256(b"t");
        let receive: Block = ReceiveBlock::new(
            AccountId::from("bob"),
            &state,
            Hash::ZERO,
            1_000,
            AccountId::from("alice"),
            transfer_id,
        )
        .into();
        assert_eq!(receive.kind(), "receive");
        assert_ne!(receive.hash(), create_send(125, 1_000, "bob").hash());
    }

    #[test]
    fn test_serde_tagged_union() {
        let block = create_send(125, 1_000, "bob");
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.starts_with(r#"{"send":"#));
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
    }
}
