use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unsupported value in canonical structure: {0}")]
    UnsupportedValue(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid hash length")]
    InvalidHashLength,

    #[error("Invalid bitmap: {0}")]
    InvalidBitmap(String),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
