//! Encrypted blob wire format
//!
//! Three layouts are recognised, selected solely by the leading byte:
//!
//! | Version | Layout |
//! |---|---|
//! | `0x01` | `ver(1) | salt(32) | iv(16) | tag(16) | ciphertext(N)` |
//! | `0x00` | `ver(1) | iv(16) | tag(16) | ciphertext(N)` |
//! | none   | `iv(16) | tag(16) | ciphertext(N)` |
//!
//! Every branch checks its own minimum length before any slice is handed to
//! the cipher. New data is only ever written as `0x00` or `0x01`.

use crate::error::{CryptoError, Result};

/// Size of the GCM initialisation vector in bytes
pub const IV_SIZE: usize = 16;

/// Size of the GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Size of the per-object HKDF salt in bytes
pub const SALT_SIZE: usize = 32;

/// Version byte for salted, per-object derived key blobs
pub const VERSION_DERIVED: u8 = 0x01;

/// Version byte for legacy master-key blobs
pub const VERSION_MASTER: u8 = 0x00;

/// Header layout of an encrypted blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobFormat {
    /// `0x01`: salt present, key derived per object
    Derived,
    /// `0x00`: no salt, master key used directly
    Master,
    /// No version byte at all (oldest format)
    Headerless,
}

impl BlobFormat {
    /// Version byte written for this format, if any
    pub fn version_byte(self) -> Option<u8> {
        match self {
            BlobFormat::Derived => Some(VERSION_DERIVED),
            BlobFormat::Master => Some(VERSION_MASTER),
            BlobFormat::Headerless => None,
        }
    }

    /// Smallest buffer (empty ciphertext) this layout can describe
    pub fn min_len(self) -> usize {
        match self {
            BlobFormat::Derived => 1 + SALT_SIZE + IV_SIZE + TAG_SIZE,
            BlobFormat::Master => 1 + IV_SIZE + TAG_SIZE,
            BlobFormat::Headerless => IV_SIZE + TAG_SIZE,
        }
    }

    /// Select a layout from the leading byte
    fn detect(buffer: &[u8]) -> Self {
        match buffer.first() {
            Some(&VERSION_DERIVED) => BlobFormat::Derived,
            Some(&VERSION_MASTER) => BlobFormat::Master,
            _ => BlobFormat::Headerless,
        }
    }
}

/// Borrowed view over a parsed encrypted blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptedBlob<'a> {
    pub format: BlobFormat,
    pub salt: Option<&'a [u8]>,
    pub iv: &'a [u8],
    pub auth_tag: &'a [u8],
    pub ciphertext: &'a [u8],
}

impl<'a> EncryptedBlob<'a> {
    /// Parse a buffer into its parts without touching any cryptography
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        let format = BlobFormat::detect(buffer);

        if buffer.len() < format.min_len() {
            return Err(CryptoError::invalid_data(format!(
                "{} bytes is shorter than the {} byte minimum for {:?} format",
                buffer.len(),
                format.min_len(),
                format
            )));
        }

        let (salt, rest) = match format {
            BlobFormat::Derived => {
                let (salt, rest) = buffer[1..].split_at(SALT_SIZE);
                (Some(salt), rest)
            }
            BlobFormat::Master => (None, &buffer[1..]),
            BlobFormat::Headerless => (None, buffer),
        };

        let (iv, rest) = rest.split_at(IV_SIZE);
        let (auth_tag, ciphertext) = rest.split_at(TAG_SIZE);

        Ok(Self {
            format,
            salt,
            iv,
            auth_tag,
            ciphertext,
        })
    }

    /// Serialize parts into a single versioned buffer
    ///
    /// The presence of `salt` selects `0x01`, its absence `0x00`.
    pub fn encode(salt: Option<&[u8]>, iv: &[u8], auth_tag: &[u8], ciphertext: &[u8]) -> Vec<u8> {
        let salt_len = salt.map(<[u8]>::len).unwrap_or(0);
        let mut out = Vec::with_capacity(1 + salt_len + iv.len() + auth_tag.len() + ciphertext.len());

        match salt {
            Some(salt) => {
                out.push(VERSION_DERIVED);
                out.extend_from_slice(salt);
            }
            None => out.push(VERSION_MASTER),
        }
        out.extend_from_slice(iv);
        out.extend_from_slice(auth_tag);
        out.extend_from_slice(ciphertext);
        out
    }
}
