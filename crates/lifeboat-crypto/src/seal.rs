use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use crypto_box::aead::{Aead, AeadCore, OsRng};
use crypto_box::{PublicKey, SalsaBox, SecretKey};

use crate::error::CryptoError;

/// One NaCl-Box sealed payload: ciphertext and nonce kept apart, each
/// base64url-encoded, so a caller can place them in separate envelope
/// fields (`payload_encrypted` / `nonce`) rather than one combined blob.
pub struct Sealed {
    pub ciphertext_b64: String,
    pub nonce_b64: String,
}

/// Seal `plaintext` for `recipient_public` using `sender_secret`, NaCl-Box
/// style, with a fresh 24-byte nonce per call.
pub fn seal(sender_secret: &SecretKey, recipient_public: &PublicKey, plaintext: &[u8]) -> Result<Sealed, CryptoError> {
    let cipher = SalsaBox::new(recipient_public, sender_secret);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    Ok(Sealed {
        ciphertext_b64: URL_SAFE_NO_PAD.encode(ciphertext),
        nonce_b64: URL_SAFE_NO_PAD.encode(nonce),
    })
}

/// Open a sealed payload produced by [`seal`]. `sender_public` is the
/// counterpart's encrypt public key; `recipient_secret` is this station's own.
pub fn open(
    recipient_secret: &SecretKey,
    sender_public: &PublicKey,
    ciphertext_b64: &str,
    nonce_b64: &str,
) -> Result<Vec<u8>, CryptoError> {
    let ciphertext = URL_SAFE_NO_PAD
        .decode(ciphertext_b64)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    let nonce_bytes = URL_SAFE_NO_PAD
        .decode(nonce_b64)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    if nonce_bytes.len() != 24 {
        return Err(CryptoError::DecryptionFailed);
    }
    let nonce = crypto_box::Nonce::from_slice(&nonce_bytes);

    let cipher = SalsaBox::new(sender_public, recipient_secret);
    cipher
        .decrypt(nonce, ciphertext.as_slice())
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_box::SecretKey;
    use rand::rngs::OsRng as RandOsRng;

    #[test]
    fn seal_open_round_trip() {
        let sender = SecretKey::generate(&mut RandOsRng);
        let recipient = SecretKey::generate(&mut RandOsRng);

        let sealed = seal(&sender, &recipient.public_key(), b"hello station").unwrap();
        let opened = open(&recipient, &sender.public_key(), &sealed.ciphertext_b64, &sealed.nonce_b64).unwrap();
        assert_eq!(opened, b"hello station");
    }

    #[test]
    fn wrong_recipient_fails_to_open() {
        let sender = SecretKey::generate(&mut RandOsRng);
        let recipient = SecretKey::generate(&mut RandOsRng);
        let eavesdropper = SecretKey::generate(&mut RandOsRng);

        let sealed = seal(&sender, &recipient.public_key(), b"secret").unwrap();
        assert!(open(&eavesdropper, &sender.public_key(), &sealed.ciphertext_b64, &sealed.nonce_b64).is_err());
    }
}
