//! Encryption at rest for per-user API keys.
//!
//! Keys are sealed with AES-256-GCM under a key derived from a single
//! operator-supplied master secret. The scrypt salt is derived from the
//! master secret itself (first 16 bytes of its SHA-256 digest), so existing
//! envelopes stay decryptable across restarts without storing a salt, while
//! still avoiding a hardcoded salt string.

use aes_gcm::aead::generic_array::typenum::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// AES-256-GCM with a 16-byte IV, matching the stored envelope layout.
type EnvelopeCipher = AesGcm<Aes256, U16>;

const KEY_LENGTH: usize = 32;
const IV_LENGTH: usize = 16;
const TAG_LENGTH: usize = 16;
const SALT_LENGTH: usize = 16;

/// scrypt cost parameters (N = 2^14, r = 8, p = 1).
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// Default environment variable holding the master secret.
pub const DEFAULT_SECRET_VAR: &str = "ENCRYPTION_SECRET";

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("{var} is not set. Generate one with: openssl rand -base64 32")]
    MissingSecret { var: String },

    #[error("invalid encrypted value format")]
    MalformedEnvelope,

    #[error("decryption failed: value was tampered with or the encryption secret changed")]
    Authentication,

    #[error("key derivation failed")]
    KeyDerivation,
}

/// Seals and opens short secret strings (API keys) as `iv:authTag:ciphertext`
/// hex envelopes.
///
/// The derived key is computed once at construction; encrypting the same
/// plaintext twice yields different envelopes (fresh random IV per call) that
/// both decrypt under the same derivation.
pub struct SecretCipher {
    cipher: EnvelopeCipher,
}

impl SecretCipher {
    /// Build a cipher from a master secret.
    ///
    /// Fails with [`CryptoError::MissingSecret`] when the secret is empty.
    pub fn new(master_secret: &SecretString) -> Result<Self, CryptoError> {
        Self::with_var(master_secret, DEFAULT_SECRET_VAR)
    }

    /// Build a cipher from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self, CryptoError> {
        let secret = std::env::var(var)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CryptoError::MissingSecret {
                var: var.to_string(),
            })?;
        Self::with_var(&SecretString::from(secret), var)
    }

    fn with_var(master_secret: &SecretString, var: &str) -> Result<Self, CryptoError> {
        let secret = master_secret.expose_secret();
        if secret.is_empty() {
            return Err(CryptoError::MissingSecret {
                var: var.to_string(),
            });
        }

        // Deterministic per-secret salt: first 16 bytes of SHA-256(secret).
        let digest = Sha256::digest(secret.as_bytes());
        let salt = &digest[..SALT_LENGTH];

        let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LENGTH)
            .map_err(|_| CryptoError::KeyDerivation)?;
        let mut key_bytes = Zeroizing::new([0u8; KEY_LENGTH]);
        scrypt::scrypt(secret.as_bytes(), salt, &params, key_bytes.as_mut_slice())
            .map_err(|_| CryptoError::KeyDerivation)?;

        let cipher = EnvelopeCipher::new(Key::<EnvelopeCipher>::from_slice(key_bytes.as_slice()));
        Ok(Self { cipher })
    }

    /// Encrypt a plaintext into an `iv:authTag:ciphertext` hex envelope.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let iv = EnvelopeCipher::generate_nonce(&mut OsRng);

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(&iv, b"", &mut buffer)
            .map_err(|_| CryptoError::Authentication)?;

        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(&buffer)
        ))
    }

    /// Decrypt an envelope produced by [`Self::encrypt`].
    pub fn decrypt(&self, envelope: &str) -> Result<SecretString, CryptoError> {
        let mut parts = envelope.splitn(3, ':');
        let iv_hex = parts.next().ok_or(CryptoError::MalformedEnvelope)?;
        let tag_hex = parts.next().ok_or(CryptoError::MalformedEnvelope)?;
        let ct_hex = parts.next().ok_or(CryptoError::MalformedEnvelope)?;

        let iv = decode_part(iv_hex, Some(IV_LENGTH))?;
        let tag = decode_part(tag_hex, Some(TAG_LENGTH))?;
        let mut buffer = decode_part(ct_hex, None)?;

        self.cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(&iv),
                b"",
                &mut buffer,
                GenericArray::from_slice(&tag),
            )
            .map_err(|_| CryptoError::Authentication)?;

        let plaintext = String::from_utf8(buffer).map_err(|_| CryptoError::Authentication)?;
        Ok(SecretString::from(plaintext))
    }
}

fn decode_part(hex_str: &str, expected_len: Option<usize>) -> Result<Vec<u8>, CryptoError> {
    if hex_str.is_empty() {
        return Err(CryptoError::MalformedEnvelope);
    }
    let bytes = hex::decode(hex_str).map_err(|_| CryptoError::MalformedEnvelope)?;
    if let Some(len) = expected_len {
        if bytes.len() != len {
            return Err(CryptoError::MalformedEnvelope);
        }
    }
    Ok(bytes)
}

/// Mask an API key for display: `abcd••••••••wxyz`, or all bullets for short
/// keys. Display only, never round-trips.
pub fn mask_secret(key: &str) -> String {
    const MASK: &str = "••••••••";
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return MASK.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{MASK}{tail}")
}
