use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Stable identifier for a finding, keyed on the normalized candidate URL.
pub fn finding_id(normalized_url: &str) -> String {
    format!("finding_{}", &sha256_hex(normalized_url.as_bytes())[..16])
}
