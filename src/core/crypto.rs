//! Cryptographic primitives (C1).
//!
//! Key derivation, authenticated encryption, and key-check tags. Parameters
//! here are part of the on-disk contract (spec.md 4.1) and must not change
//! silently — doing so would make existing vaults undecryptable.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};

/// 1 pass, 64 MiB memory, 4-way parallelism, 32-byte output.
const ARGON2_PASSES: u32 = 1;
const ARGON2_MEM_KIB: u32 = 64 * 1024;
const ARGON2_LANES: u32 = 4;
const KEY_LEN: usize = 32;

const KEY_CHECK_CONSTANT: &[u8] = b"envsync-key-check";

/// The 32-byte symmetric vault key, derived from phrase + salt.
#[derive(Clone, ZeroizeOnDrop)]
pub struct VaultKey([u8; KEY_LEN]);

impl VaultKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Derive the vault key from a recovery phrase and salt using Argon2id
/// with the fixed parameters mandated by spec.md 4.1.
pub fn derive_key(phrase: &str, salt: &[u8]) -> Result<VaultKey> {
    let params = Params::new(ARGON2_MEM_KIB, ARGON2_PASSES, ARGON2_LANES, Some(KEY_LEN))
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut out = [0u8; KEY_LEN];
    argon2
        .hash_password_into(phrase.as_bytes(), salt, &mut out)
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;
    Ok(VaultKey(out))
}

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of the fixed constant under the derived key. Stored alongside
/// the salt so a wrong phrase can be detected without decrypting secrets.
pub fn key_check(key: &VaultKey) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(KEY_CHECK_CONSTANT);
    mac.finalize().into_bytes().to_vec()
}

/// Compare a freshly computed key-check tag against the one stored on disk,
/// in constant time.
pub fn verify_key_check(key: &VaultKey, stored_tag: &[u8]) -> bool {
    let computed = key_check(key);
    computed.ct_eq(stored_tag).into()
}

/// Result of [`encrypt`]: ciphertext-with-tag, nonce, and a hash of the
/// plaintext used by `diff` to detect same-version/different-content
/// anomalies.
pub struct Encrypted {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub plain_hash: String,
}

/// AES-256-GCM encrypt `plaintext` under `key` with a random 12-byte nonce
/// and no associated data.
pub fn encrypt(key: &VaultKey, plaintext: &[u8]) -> Result<Encrypted> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Rng(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(plaintext);
    let plain_hash = hex::encode(hasher.finalize());

    Ok(Encrypted {
        ciphertext,
        nonce: nonce.to_vec(),
        plain_hash,
    })
}

/// AES-256-GCM decrypt. Fails with [`CryptoError::InvalidCiphertext`] on tag
/// mismatch, malformed nonce, or wrong key.
pub fn decrypt(key: &VaultKey, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != 12 {
        return Err(CryptoError::InvalidCiphertext.into());
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Nonce::from_slice(nonce);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::InvalidCiphertext.into())
}

/// `n` random bytes, hex-encoded.
pub fn random_hex(n: usize) -> String {
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// `n` random bytes.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// Pick `count` distinct-or-not words from the fixed recovery wordlist using
/// rejection sampling (uniform, no modulo bias) and join with spaces.
///
/// spec.md 9 notes that the original implementation uses modulo reduction
/// over a 2-byte draw here, which introduces slight bias; new implementations
/// should use rejection sampling instead, which is what we do.
pub fn generate_phrase(count: usize) -> String {
    let words = crate::core::wordlist::WORDS;
    let n = words.len() as u32;
    // Largest multiple of `n` that fits in u16 range; draws landing at or
    // above this are rejected and redrawn to avoid modulo bias.
    let limit = (u32::from(u16::MAX) + 1) / n * n;

    let mut chosen = Vec::with_capacity(count);
    let mut rng = rand::thread_rng();
    while chosen.len() < count {
        let draw = u32::from(rng.next_u32() as u16);
        if draw >= limit {
            continue;
        }
        chosen.push(words[(draw % n) as usize]);
    }
    chosen.join(" ")
}

/// Zeroize a byte buffer holding plaintext as soon as it is no longer needed.
pub fn zeroize_bytes(buf: &mut [u8]) {
    buf.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_deterministic() {
        let salt = random_bytes(16);
        let a = derive_key("correct horse battery staple", &salt).unwrap();
        let b = derive_key("correct horse battery staple", &salt).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_phrase_different_key() {
        let salt = random_bytes(16);
        let a = derive_key("phrase one", &salt).unwrap();
        let b = derive_key("phrase two", &salt).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn key_check_round_trips() {
        let salt = random_bytes(16);
        let key = derive_key("my phrase", &salt).unwrap();
        let tag = key_check(&key);
        assert!(verify_key_check(&key, &tag));

        let wrong = derive_key("not my phrase", &salt).unwrap();
        assert!(!verify_key_check(&wrong, &tag));
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let salt = random_bytes(16);
        let key = derive_key("phrase", &salt).unwrap();
        let enc = encrypt(&key, b"super secret value").unwrap();
        let plain = decrypt(&key, &enc.ciphertext, &enc.nonce).unwrap();
        assert_eq!(plain, b"super secret value");
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let salt = random_bytes(16);
        let key = derive_key("phrase", &salt).unwrap();
        let other = derive_key("other phrase", &salt).unwrap();
        let enc = encrypt(&key, b"value").unwrap();
        assert!(decrypt(&other, &enc.ciphertext, &enc.nonce).is_err());
    }

    #[test]
    fn decrypt_with_tampered_ciphertext_fails() {
        let salt = random_bytes(16);
        let key = derive_key("phrase", &salt).unwrap();
        let mut enc = encrypt(&key, b"value").unwrap();
        let last = enc.ciphertext.len() - 1;
        enc.ciphertext[last] ^= 0xFF;
        assert!(decrypt(&key, &enc.ciphertext, &enc.nonce).is_err());
    }

    #[test]
    fn generate_phrase_has_requested_word_count() {
        let phrase = generate_phrase(12);
        assert_eq!(phrase.split(' ').count(), 12);
    }

    #[test]
    fn nonces_are_random_per_message() {
        let salt = random_bytes(16);
        let key = derive_key("phrase", &salt).unwrap();
        let a = encrypt(&key, b"same plaintext").unwrap();
        let b = encrypt(&key, b"same plaintext").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
