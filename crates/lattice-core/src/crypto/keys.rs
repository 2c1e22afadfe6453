use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::fmt;

use crate::crypto::hash::hash_concat;
use crate::error::CoreError;

/// Domain separator for voter keys derived from account identifiers
const VOTER_KEY_DOMAIN: &[u8] = b"lattice-voter-key|";

/// Ed25519 signature length in bytes
pub const SIGNATURE_LEN: usize = 64;

/// Ed25519 public key (32 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn to_verifying_key(self) -> Result<VerifyingKey, CoreError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)
    }

    /// Verify a detached signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CoreError> {
        let bytes: [u8; SIGNATURE_LEN] = signature
            .try_into()
            .map_err(|_| CoreError::InvalidSignature)?;
        let sig = Signature::from_bytes(&bytes);
        self.to_verifying_key()?
            .verify(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Ed25519 secret key (32 bytes seed)
/// Not serializable to prevent accidental exposure
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl SecretKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        SecretKey(SigningKey::from_bytes(bytes))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }

    /// Ed25519 signing is deterministic: same key and message, same bytes
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.0.sign(message).to_bytes().to_vec()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// A keypair containing both secret and public keys
#[derive(Clone)]
pub struct KeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl KeyPair {
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        let secret = SecretKey::from_bytes(bytes);
        let public = secret.public_key();
        KeyPair { secret, public }
    }

    /// Derive the voting keypair for an account.
    ///
    /// The seed is `SHA-256("lattice-voter-key|" || account_id)`, so every
    /// node that knows the account id derives the same key. This is a
    /// simulation convenience and offers no secrecy.
    pub fn derive_for_account(account_id: &str) -> Self {
        let seed = hash_concat(&[VOTER_KEY_DOMAIN, account_id.as_bytes()]);
        Self::from_secret_bytes(seed.as_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
