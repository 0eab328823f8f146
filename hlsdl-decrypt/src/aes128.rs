use crate::error::{DecryptError, Result};
use aes::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Whole-segment AES-128-CBC decrypter.
#[derive(Clone)]
pub struct Aes128Decrypter {
    key: [u8; 16],
    iv: [u8; 16],
}

impl Aes128Decrypter {
    pub fn new(key: &[u8; 16], iv: &[u8; 16]) -> Self {
        Self { key: *key, iv: *iv }
    }

    /// Builds a decrypter from untrusted key material, e.g. a key fetched over http.
    pub fn from_slices(key: &[u8], iv: &[u8]) -> Result<Self> {
        let key: [u8; 16] = key
            .try_into()
            .map_err(|_| DecryptError::InvalidKeySize(key.len()))?;
        let iv: [u8; 16] = iv
            .try_into()
            .map_err(|_| DecryptError::InvalidIvSize(iv.len()))?;
        Ok(Self { key, iv })
    }

    /// Decrypts `input` in place and strips the padding announced by the last byte.
    ///
    /// An empty input is returned as is.
    pub fn decrypt(&self, mut input: Vec<u8>) -> Result<Vec<u8>> {
        if input.is_empty() {
            return Ok(input);
        }

        let size = input.len();

        if size % 16 != 0 {
            return Err(DecryptError::UnalignedCiphertext(size));
        }

        Aes128CbcDec::new((&self.key).into(), (&self.iv).into())
            .decrypt_padded_mut::<NoPadding>(&mut input)
            .map_err(|_| DecryptError::UnalignedCiphertext(size))?;

        let len = unpad(&input)?;
        input.truncate(len);
        Ok(input)
    }
}

/// Returns the length of `data` without its PKCS#5/PKCS#7 padding.
///
/// Only the final byte is consulted. The padding bytes themselves are not
/// checked, so a corrupted final block truncates silently instead of failing.
pub fn unpad(data: &[u8]) -> Result<usize> {
    let Some(&last) = data.last() else {
        return Ok(0);
    };

    let padding = last as usize;

    if padding > data.len() {
        return Err(DecryptError::InvalidPadding {
            padding,
            len: data.len(),
        });
    }

    Ok(data.len() - padding)
}
