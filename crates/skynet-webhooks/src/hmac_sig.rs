//! HMAC-SHA256 request verification: header format `X-Webhook-Signature:
//! sha256=<hex>`, compared in constant time over the raw request body.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Compute the `sha256=<hex>` signature header value for `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify `header_value` (the raw `X-Webhook-Signature` header) against
/// `body` under `secret`. Uses `hmac`'s constant-time tag comparison.
pub fn verify(secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(hex_sig) = header_value.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected_bytes) = hex::decode(hex_sig) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&expected_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_roundtrips() {
        let body = b"{\"hello\":\"world\"}";
        let header = sign("shhh", body);
        assert!(header.starts_with("sha256="));
        assert!(verify("shhh", body, &header));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let body = b"payload";
        let header = sign("correct-secret", body);
        assert!(!verify("wrong-secret", body, &header));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let header = sign("secret", b"original");
        assert!(!verify("secret", b"tampered", &header));
    }

    #[test]
    fn malformed_header_is_rejected_not_panicking() {
        assert!(!verify("secret", b"body", "not-a-valid-header"));
        assert!(!verify("secret", b"body", "sha256=not-hex"));
    }
}
