pub mod account;
pub mod block;
pub mod vote;

pub use account::{AccountId, AccountState};
pub use block::{derive_transfer_id, Block, BlockHeader, ReceiveBlock, SendBlock};
pub use vote::{Bitmap, Committee, PartialVote, QuorumCert};

/// Serde adapter: byte vectors as unpadded URL-safe base64 strings
pub(crate) mod bytes_b64 {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD.decode(s).map_err(serde::de::Error::custom)
    }
}
