use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{CredentialError, Result};

/// Fernet-equivalent authenticated symmetric encryption: AES-256-GCM keyed
/// by a SHA-256 digest of the operator-supplied `credential_key`, so any
/// string length works as input (the digest is always 32 bytes).
pub struct Cipher {
    cipher: Aes256Gcm,
}

impl Cipher {
    pub fn new(credential_key: &str) -> Self {
        let digest = Sha256::digest(credential_key.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt `plaintext`, returning (ciphertext, nonce). The nonce is
    /// freshly random per call and must be stored alongside the ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CredentialError::EncryptFailed)?;

        Ok((ciphertext, nonce_bytes.to_vec()))
    }

    /// Decrypt `ciphertext` using the stored `nonce`. Fails authentication
    /// (not just garbled output) if the key or ciphertext has been tampered
    /// with, since GCM is an authenticated cipher mode.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<String> {
        let nonce = Nonce::from_slice(nonce);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CredentialError::DecryptFailed)?;
        String::from_utf8(plaintext).map_err(|_| CredentialError::DecryptFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cipher = Cipher::new("a test key of any length");
        let (ct, nonce) = cipher.encrypt("sk-super-secret").unwrap();
        assert_ne!(ct, b"sk-super-secret");
        let pt = cipher.decrypt(&ct, &nonce).unwrap();
        assert_eq!(pt, "sk-super-secret");
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let cipher_a = Cipher::new("key-a");
        let cipher_b = Cipher::new("key-b");
        let (ct, nonce) = cipher_a.encrypt("secret").unwrap();
        assert!(cipher_b.decrypt(&ct, &nonce).is_err());
    }
}
