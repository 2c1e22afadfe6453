//! Lattice Core - Core types, canonical codec, and hashing
//!
//! This crate provides the foundational types shared by the ledger,
//! consensus, and node crates of the block-lattice simulation.

pub mod clock;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{canonical_hash, canonicalize, Canonical, CanonicalValue};
pub use crypto::{encode_base64, hash_concat, hash_sha256, Hash, KeyPair, PublicKey, SecretKey};
pub use error::CoreError;
pub use types::*;
