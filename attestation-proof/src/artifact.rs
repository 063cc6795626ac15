//! Binary container of a proof artifact.
//!
//! ```text
//! magic "ATPF" | format_version u16 | log_n u8 | r u32 | p u32 | salt[16] | nonce[12] | ciphertext | tag[16]
//! ```
//!
//! Integers are big-endian. Everything before the ciphertext is the header and is
//! authenticated as associated data.

use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        DEFAULT_SCRYPT_LOG_N, DEFAULT_SCRYPT_P, DEFAULT_SCRYPT_R, FORMAT_VERSION, HEADER_SIZE,
        MAGIC, NONCE_SIZE, SALT_SIZE, SCRYPT_LOG_N_RANGE, SCRYPT_MAX_MEMORY_BYTES,
        SCRYPT_P_RANGE, SCRYPT_R_RANGE, TAG_SIZE,
    },
    errors::{ProofError, Result},
};

/// scrypt cost parameters stored in the artifact header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl KdfParams {
    /// Size in bytes of the scrypt working buffer for these parameters.
    pub fn memory_cost(&self) -> u64 {
        128u64
            .saturating_mul(u64::from(self.r))
            .saturating_mul(1u64.checked_shl(u32::from(self.log_n)).unwrap_or(u64::MAX))
    }

    /// Checks each parameter range and the total memory cost.
    pub fn is_within_bounds(&self) -> bool {
        SCRYPT_LOG_N_RANGE.contains(&self.log_n)
            && SCRYPT_R_RANGE.contains(&self.r)
            && SCRYPT_P_RANGE.contains(&self.p)
            && self.memory_cost() <= SCRYPT_MAX_MEMORY_BYTES
    }

    /// # Errors
    ///
    /// * `ProofError::InvalidKdfParams` - if a parameter is outside its accepted range
    ///   or the memory cost exceeds `SCRYPT_MAX_MEMORY_BYTES`
    pub fn validate(&self) -> Result<()> {
        if self.is_within_bounds() {
            Ok(())
        } else {
            Err(ProofError::InvalidKdfParams(format!(
                "log_n {} (allowed {:?}), r {} (allowed {:?}), p {} (allowed {:?}), \
                 memory {} bytes (allowed up to {})",
                self.log_n,
                SCRYPT_LOG_N_RANGE,
                self.r,
                SCRYPT_R_RANGE,
                self.p,
                SCRYPT_P_RANGE,
                self.memory_cost(),
                SCRYPT_MAX_MEMORY_BYTES
            )))
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: DEFAULT_SCRYPT_LOG_N,
            r: DEFAULT_SCRYPT_R,
            p: DEFAULT_SCRYPT_P,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHeader {
    pub format_version: u16,
    pub kdf: KdfParams,
    pub salt: [u8; SALT_SIZE],
    pub nonce: [u8; NONCE_SIZE],
}

impl ArtifactHeader {
    pub fn new(kdf: KdfParams, salt: [u8; SALT_SIZE], nonce: [u8; NONCE_SIZE]) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            kdf,
            salt,
            nonce,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut pos = 0;
        let mut put = |bytes: &[u8]| {
            out[pos..pos + bytes.len()].copy_from_slice(bytes);
            pos += bytes.len();
        };
        put(MAGIC);
        put(&self.format_version.to_be_bytes());
        put(&[self.kdf.log_n]);
        put(&self.kdf.r.to_be_bytes());
        put(&self.kdf.p.to_be_bytes());
        put(&self.salt);
        put(&self.nonce);
        out
    }
}

/// A parsed artifact borrowing from the input bytes.
#[derive(Debug)]
pub struct Artifact<'a> {
    pub header: ArtifactHeader,
    /// Raw header bytes, the associated data
    pub header_bytes: &'a [u8],
    /// Ciphertext followed by the tag
    pub sealed: &'a [u8],
}

impl<'a> Artifact<'a> {
    /// Splits an artifact into header and sealed payload.
    ///
    /// # Errors
    ///
    /// * `ProofError::UnsupportedFormatVersion` - if the magic matches but the version is unknown
    /// * `ProofError::WrongPassphraseOrCorrupt` - for bad magic, truncation or
    ///   out-of-range scrypt parameters
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < MAGIC.len() + 2 || &bytes[..MAGIC.len()] != MAGIC {
            return Err(ProofError::WrongPassphraseOrCorrupt);
        }
        let format_version = u16::from_be_bytes([bytes[4], bytes[5]]);
        if format_version != FORMAT_VERSION {
            return Err(ProofError::UnsupportedFormatVersion(format_version));
        }
        if bytes.len() < HEADER_SIZE + TAG_SIZE {
            return Err(ProofError::WrongPassphraseOrCorrupt);
        }
        let (header_bytes, sealed) = bytes.split_at(HEADER_SIZE);

        let be_u32 = |offset: usize| {
            u32::from_be_bytes([
                header_bytes[offset],
                header_bytes[offset + 1],
                header_bytes[offset + 2],
                header_bytes[offset + 3],
            ])
        };
        let kdf = KdfParams {
            log_n: header_bytes[6],
            r: be_u32(7),
            p: be_u32(11),
        };
        if !kdf.is_within_bounds() {
            return Err(ProofError::WrongPassphraseOrCorrupt);
        }
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&header_bytes[15..15 + SALT_SIZE]);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&header_bytes[15 + SALT_SIZE..HEADER_SIZE]);

        Ok(Self {
            header: ArtifactHeader {
                format_version,
                kdf,
                salt,
                nonce,
            },
            header_bytes,
            sealed,
        })
    }
}
