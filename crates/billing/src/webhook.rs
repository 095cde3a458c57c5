//! HMAC-SHA256 webhook signatures.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Headers Chapa may carry the signature in. A match on any of them is accepted.
pub const SIGNATURE_HEADERS: [&str; 2] = ["x-chapa-signature", "chapa-signature"];

/// Hex-encoded HMAC-SHA256 of `payload` keyed with `secret`.
pub fn sign(secret: &[u8], payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of `signature` (hex, case-insensitive) with the expected value.
pub fn verify(secret: &[u8], payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Some(expected) = sign(secret, payload) else {
        return false;
    };
    let provided = signature.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_signature() {
        let payload = br#"{"tx_ref":"mq-1","status":"success"}"#;
        let sig = sign(b"whsec", payload).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify(b"whsec", payload, &sig));
        assert!(verify(b"whsec", payload, &sig.to_uppercase()));
    }

    #[test]
    fn rejects_tampered_payload_or_wrong_secret() {
        let sig = sign(b"whsec", b"original").unwrap();
        assert!(!verify(b"whsec", b"tampered", &sig));
        assert!(!verify(b"other", b"original", &sig));
        assert!(!verify(b"whsec", b"original", ""));
    }

    #[test]
    fn empty_secret_never_verifies() {
        let sig = sign(b"", b"payload").unwrap();
        assert!(!verify(b"", b"payload", &sig));
    }
}
