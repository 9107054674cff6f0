use sha2::{Digest, Sha256};

/// Human-verifiable key fingerprint: SHA-256 of the raw public key bytes,
/// truncated to 16 hex characters and grouped as colon-separated byte pairs
/// (e.g. `ab:cd:ef:01:23:45:67:89`) so two operators can read it aloud and
/// compare over a phone call during station pairing.
pub fn fingerprint(pubkey_bytes: &[u8]) -> String {
    let digest = Sha256::digest(pubkey_bytes);
    let full_hex = hex::encode(digest);
    let truncated = &full_hex[..16];
    truncated
        .as_bytes()
        .chunks(2)
        .map(|pair| std::str::from_utf8(pair).expect("hex digits are ascii"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic_and_grouped() {
        let fp = fingerprint(b"a stable public key");
        assert_eq!(fp.len(), 23); // 16 hex chars + 7 colons
        assert_eq!(fp, fingerprint(b"a stable public key"));
    }

    #[test]
    fn different_keys_produce_different_fingerprints() {
        assert_ne!(fingerprint(b"key-one"), fingerprint(b"key-two"));
    }
}
