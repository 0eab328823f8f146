use crate::error::{DecryptError, Result};

/// IV used when a key carries no explicit `IV` attribute: the media sequence
/// number as a big-endian 128-bit integer.
pub fn default_iv(sequence: u64) -> [u8; 16] {
    (sequence as u128).to_be_bytes()
}

/// Parses an `IV` attribute value such as `0x00000000000000000000000000000001`.
///
/// Shorter values are treated as integers and left padded with zeros.
pub fn parse_iv(value: &str) -> Result<[u8; 16]> {
    let hex_iv = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    if hex_iv.len() > 32 {
        return Err(DecryptError::HexWrongLength(hex_iv.len()));
    }

    let padded = format!("{:0>32}", hex_iv);
    let mut iv = [0_u8; 16];
    hex::decode_to_slice(padded, &mut iv)?;
    Ok(iv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_iv() {
        let iv = default_iv(42);
        assert_eq!(iv[..8], [0; 8]);
        assert_eq!(iv[8..], 42_u64.to_be_bytes());
    }

    #[test]
    fn test_default_iv_max_sequence() {
        let iv = default_iv(u64::MAX);
        assert_eq!(iv[..8], [0; 8]);
        assert_eq!(iv[8..], [0xff; 8]);
    }

    #[test]
    fn test_parse_iv() {
        let iv = parse_iv("0x9c7db8778570d05c3177c349fd9236aa").unwrap();
        assert_eq!(iv[0], 0x9c);
        assert_eq!(iv[15], 0xaa);
        assert_eq!(parse_iv("9C7DB8778570D05C3177C349FD9236AA").unwrap(), iv);
    }

    #[test]
    fn test_parse_iv_short() {
        assert_eq!(parse_iv("0x2a").unwrap(), default_iv(42));
    }

    #[test]
    fn test_parse_iv_invalid() {
        assert!(matches!(
            parse_iv("0xnothex"),
            Err(DecryptError::InvalidHex(_))
        ));
        assert!(matches!(
            parse_iv(&format!("0x{}", "0".repeat(34))),
            Err(DecryptError::HexWrongLength(34))
        ));
    }
}
