//! Envelope encryption service
//!
//! AES-256-GCM with a 16-byte IV and 16-byte tag. Key handling has two modes:
//!
//! - **Raw key**: a 64-hex-character secret is decoded to 32 bytes and used as
//!   the AES key for every object. Blobs are written as version `0x00`.
//! - **Passphrase**: any other secret is stretched once with PBKDF2-SHA256
//!   (100,000 iterations, fixed salt) into a master key. Each encryption then
//!   derives a per-object key with HKDF-SHA256 from a fresh 32-byte salt that
//!   is stored with the ciphertext. Blobs are written as version `0x01`.

use crate::blob::{EncryptedBlob, IV_SIZE, SALT_SIZE, TAG_SIZE};
use crate::error::{CryptoError, Result};
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce, Tag};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use std::sync::Once;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// AES-256-GCM with a 128-bit IV
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;

/// PBKDF2 iteration count for passphrase stretching
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Fixed salt for stretching a passphrase into the master key
const MASTER_KEY_SALT: &[u8] = b"dataroom-storage-master-key-v1";

/// HKDF info string binding derived keys to object encryption
const OBJECT_KEY_INFO: &[u8] = b"dataroom-storage-object-key";

/// Environment variable holding the encryption secret
pub const ENCRYPTION_KEY_ENV: &str = "STORAGE_ENCRYPTION_KEY";

/// Legacy name accepted when the canonical variable is unset
pub const LEGACY_ENCRYPTION_KEY_ENV: &str = "DOCUMENT_ENCRYPTION_KEY";

static PASSPHRASE_WARNING: Once = Once::new();

/// Output of [`EnvelopeCrypto::encrypt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_SIZE],
    pub auth_tag: [u8; TAG_SIZE],
    /// Present only in passphrase (derived key) mode
    pub salt: Option<[u8; SALT_SIZE]>,
}

/// Authenticated encryption service owning the process master key
pub struct EnvelopeCrypto {
    master_key: Zeroizing<[u8; KEY_SIZE]>,
    use_derived_keys: bool,
}

impl EnvelopeCrypto {
    /// Create from an explicit secret, or from the environment when `None`
    pub fn new(key: Option<&str>) -> Result<Self> {
        match key {
            Some(key) => Self::from_secret(key),
            None => Self::from_env(),
        }
    }

    /// Create from `STORAGE_ENCRYPTION_KEY` (or its legacy alias)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var(ENCRYPTION_KEY_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| {
                std::env::var(LEGACY_ENCRYPTION_KEY_ENV)
                    .ok()
                    .filter(|v| !v.is_empty())
            })
            .ok_or(CryptoError::MissingKey)?;

        Self::from_secret(&secret)
    }

    /// Create from a secret string, choosing raw-key or passphrase mode
    pub fn from_secret(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(CryptoError::invalid_key("encryption secret is empty"));
        }

        if let Some(raw) = decode_raw_key(secret) {
            debug!("Using raw 256-bit master key");
            return Ok(Self {
                master_key: raw,
                use_derived_keys: false,
            });
        }

        PASSPHRASE_WARNING.call_once(|| {
            warn!(
                "Encryption secret is not a 64-character hex key; deriving keys from a passphrase. \
                 Generate a raw key with `dataroom keygen` for production use"
            );
        });

        let mut master = Zeroizing::new([0u8; KEY_SIZE]);
        pbkdf2::pbkdf2_hmac::<Sha256>(
            secret.as_bytes(),
            MASTER_KEY_SALT,
            PBKDF2_ITERATIONS,
            &mut master[..],
        );

        Ok(Self {
            master_key: master,
            use_derived_keys: true,
        })
    }

    /// Whether each object gets its own HKDF-derived key
    pub fn uses_derived_keys(&self) -> bool {
        self.use_derived_keys
    }

    /// Encrypt with a fresh random IV (and salt in derived mode)
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedPayload> {
        let mut iv = [0u8; IV_SIZE];
        rand::rng().fill_bytes(&mut iv);

        let salt = if self.use_derived_keys {
            let mut salt = [0u8; SALT_SIZE];
            rand::rng().fill_bytes(&mut salt);
            Some(salt)
        } else {
            None
        };

        let key = self.object_key(salt.as_ref().map(|s| &s[..]))?;
        let cipher = Aes256Gcm16::new_from_slice(&key[..])
            .map_err(|e| CryptoError::invalid_key(e.to_string()))?;

        let mut ciphertext = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::<U16>::from_slice(&iv), b"", &mut ciphertext)
            .map_err(|e| CryptoError::cipher(e.to_string()))?;

        let mut auth_tag = [0u8; TAG_SIZE];
        auth_tag.copy_from_slice(tag.as_slice());

        Ok(EncryptedPayload {
            ciphertext,
            iv,
            auth_tag,
            salt,
        })
    }

    /// Authenticated decryption of separately supplied parts
    ///
    /// Returns [`CryptoError::AuthenticationFailed`] when the tag does not
    /// verify; no plaintext is released in that case.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        iv: &[u8],
        auth_tag: &[u8],
        salt: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        if iv.len() != IV_SIZE {
            return Err(CryptoError::invalid_key(format!(
                "IV must be {} bytes, got {}",
                IV_SIZE,
                iv.len()
            )));
        }
        if auth_tag.len() != TAG_SIZE {
            return Err(CryptoError::invalid_key(format!(
                "auth tag must be {} bytes, got {}",
                TAG_SIZE,
                auth_tag.len()
            )));
        }
        if let Some(salt) = salt {
            if salt.len() != SALT_SIZE {
                return Err(CryptoError::invalid_key(format!(
                    "salt must be {} bytes, got {}",
                    SALT_SIZE,
                    salt.len()
                )));
            }
        }

        let key = self.object_key(salt)?;
        let cipher = Aes256Gcm16::new_from_slice(&key[..])
            .map_err(|e| CryptoError::invalid_key(e.to_string()))?;

        let mut plaintext = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                Nonce::<U16>::from_slice(iv),
                b"",
                &mut plaintext,
                Tag::<U16>::from_slice(auth_tag),
            )
            .map_err(|_| CryptoError::AuthenticationFailed)?;

        Ok(plaintext)
    }

    /// Encrypt into the single-buffer wire format
    pub fn encrypt_to_buffer(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let payload = self.encrypt(plaintext)?;
        Ok(EncryptedBlob::encode(
            payload.salt.as_ref().map(|s| &s[..]),
            &payload.iv,
            &payload.auth_tag,
            &payload.ciphertext,
        ))
    }

    /// Decrypt any of the three recognised wire formats
    pub fn decrypt_from_buffer(&self, buffer: &[u8]) -> Result<Vec<u8>> {
        let blob = EncryptedBlob::parse(buffer)?;
        debug!(
            "Decrypting {:?} blob ({} ciphertext bytes)",
            blob.format,
            blob.ciphertext.len()
        );
        self.decrypt(blob.ciphertext, blob.iv, blob.auth_tag, blob.salt)
    }

    /// Per-object key when a salt is present, master key otherwise
    fn object_key(&self, salt: Option<&[u8]>) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        let Some(salt) = salt else {
            return Ok(self.master_key.clone());
        };

        let hkdf = Hkdf::<Sha256>::new(Some(salt), &self.master_key[..]);
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        hkdf.expand(OBJECT_KEY_INFO, &mut key[..])
            .map_err(|e| CryptoError::key_derivation(e.to_string()))?;
        Ok(key)
    }
}

impl std::fmt::Debug for EnvelopeCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCrypto")
            .field("use_derived_keys", &self.use_derived_keys)
            .finish_non_exhaustive()
    }
}

/// Decode a 64-hex-character secret into raw key bytes
fn decode_raw_key(secret: &str) -> Option<Zeroizing<[u8; KEY_SIZE]>> {
    if secret.len() != KEY_SIZE * 2 || !secret.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    hex::decode_to_slice(secret, &mut key[..]).ok()?;
    Some(key)
}

/// Generate a fresh raw key as 64 lowercase hex characters
pub fn generate_key() -> String {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    rand::rng().fill_bytes(&mut key[..]);
    hex::encode(&key[..])
}
