//! Webhook HMAC-SHA256 signature validation.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use facade_core::{FacadeError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Checks `signature` (hex, optionally `sha256=`-prefixed) against the
/// HMAC-SHA256 of `body` under `secret`. Hex case is ignored.
///
/// # Errors
///
/// Returns `FacadeError::InvalidSignature` if the signature is missing,
/// not hex, or does not match.
pub fn verify_signature(secret: &str, signature: Option<&str>, body: &[u8]) -> Result<()> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FacadeError::invalid_signature("missing webhook signature"))?;
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);

    let expected = hex::decode(signature)
        .map_err(|_| FacadeError::invalid_signature("webhook signature is not hex"))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| FacadeError::unexpected(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| FacadeError::invalid_signature("webhook signature does not match"))
}

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC acepta claves de cualquier largo
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts keys of any length"));
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
