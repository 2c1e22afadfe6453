pub mod hash;
pub mod keys;

pub use hash::{encode_base64, hash_concat, hash_sha256, Hash};
pub use keys::{KeyPair, PublicKey, SecretKey, SIGNATURE_LEN};
