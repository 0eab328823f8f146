//! Error types for segment decryption.

use thiserror::Error;

/// Errors that can occur while decrypting a segment.
#[derive(Debug, Error)]
pub enum DecryptError {
    /// Invalid key size (must be 16 bytes for AES-128).
    #[error("invalid key size: expected 16 bytes for AES-128, got {0} bytes")]
    InvalidKeySize(usize),

    /// Invalid IV size.
    #[error("invalid IV size: expected 16 bytes, got {0} bytes")]
    InvalidIvSize(usize),

    /// Invalid hex string.
    #[error("invalid hex string: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Hex string is longer than 128 bits.
    #[error("hex string has wrong length: expected at most 32 hex chars, got {0}")]
    HexWrongLength(usize),

    /// Ciphertext length is not a multiple of the AES block size.
    #[error("ciphertext of {0} bytes is not a multiple of the 16 byte block size")]
    UnalignedCiphertext(usize),

    /// The trailing padding byte claims more bytes than were decrypted.
    #[error("padding of {padding} bytes exceeds decrypted length of {len} bytes")]
    InvalidPadding { padding: usize, len: usize },
}

/// Result type for decryption operations.
pub type Result<T> = std::result::Result<T, DecryptError>;
