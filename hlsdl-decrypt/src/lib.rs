//! AES-128 decryption for HLS media segments.
//!
//! Segments encrypted with `#EXT-X-KEY:METHOD=AES-128` are whole-file
//! AES-128-CBC with PKCS#7 padding. When the playlist does not carry an
//! explicit `IV` attribute, the IV is the segment's media sequence number
//! as a big-endian 128-bit integer.
//!
//! ```
//! use hlsdl_decrypt::{Aes128Decrypter, default_iv};
//!
//! let key = [0x2b; 16];
//! let decrypter = Aes128Decrypter::new(&key, &default_iv(42));
//! assert!(decrypter.decrypt(vec![0; 15]).is_err());
//! ```

mod aes128;
mod error;
mod iv;

pub use aes128::{Aes128Decrypter, unpad};
pub use error::{DecryptError, Result};
pub use iv::{default_iv, parse_iv};
