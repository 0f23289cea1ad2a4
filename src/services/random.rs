//! Random tokens (codes, cookie identities, opaque access tokens).
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

pub fn token_bytes(len: usize) -> Result<Vec<u8>, getrandom::Error> {
    let mut bytes = vec![0u8; len];
    getrandom::fill(&mut bytes)?;
    Ok(bytes)
}

/// `len` random bytes -> URL-safe base64 without padding.
pub fn token_urlsafe(len: usize) -> Result<String, getrandom::Error> {
    Ok(URL_SAFE_NO_PAD.encode(token_bytes(len)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlsafe_token_has_expected_length_and_alphabet() {
        // 36 bytes -> 48 base64 chars, no padding needed
        let token = token_urlsafe(36).unwrap();
        assert_eq!(token.len(), 48);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(token, token_urlsafe(36).unwrap());
    }
}
