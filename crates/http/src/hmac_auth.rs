//! Raw-body HMAC authentication for webhook callbacks.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 digest of a raw request body.
pub fn compute_hmac_sha256(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Validate a provided signature against the raw body.
///
/// Accepts an optional `sha256=` prefix; comparison is constant-time.
pub fn verify_hmac_signature(secret: &str, body: &[u8], provided_signature: Option<&str>) -> bool {
    let Some(provided) = provided_signature else {
        return false;
    };
    let normalized = provided.trim().to_lowercase();
    let normalized = normalized.strip_prefix("sha256=").unwrap_or(&normalized);

    let Ok(signature_bytes) = decode_hex(normalized) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.verify_slice(&signature_bytes).is_ok()
}

fn decode_hex(value: &str) -> Result<Vec<u8>, ()> {
    if value.len() % 2 != 0 {
        return Err(());
    }
    (0..value.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(&value[index..index + 2], 16).map_err(|_| ()))
        .collect()
}
