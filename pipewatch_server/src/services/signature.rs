//! Webhook authentication — GitHub HMAC signature check.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Validate a GitHub webhook signature (X-Hub-Signature-256).
pub fn validate_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        tracing::warn!("Webhook secret not configured, skipping validation");
        return true;
    }

    let sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    let sig_bytes = match hex::decode(sig) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);

    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"workflow_run":{"id":1}}"#;
        let sig = sign("s3cret", payload);
        assert!(validate_signature("s3cret", payload, &sig));
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = b"{}";
        let sig = sign("other", payload);
        assert!(!validate_signature("s3cret", payload, &sig));
    }

    #[test]
    fn rejects_garbage_signature() {
        assert!(!validate_signature("s3cret", b"{}", "sha256=nothex"));
    }

    #[test]
    fn empty_secret_skips_validation() {
        assert!(validate_signature("", b"{}", "anything"));
    }
}
