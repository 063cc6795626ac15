use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::{
    artifact::KdfParams,
    constants::{KEY_SIZE, NONCE_SIZE, SALT_SIZE},
    errors::{ProofError, Result},
};

pub fn random_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

pub fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Derives the 32-byte artifact key from a passphrase with scrypt.
///
/// # Errors
///
/// * `ProofError::InvalidKdfParams` - if scrypt rejects the parameters
pub fn derive_key(
    passphrase: &str,
    salt: &[u8; SALT_SIZE],
    kdf: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let params = scrypt::Params::new(kdf.log_n, kdf.r, kdf.p, KEY_SIZE)
        .map_err(|e| ProofError::InvalidKdfParams(e.to_string()))?;
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    scrypt::scrypt(passphrase.as_bytes(), salt, &params, key.as_mut())
        .map_err(|e| ProofError::InvalidKdfParams(e.to_string()))?;
    Ok(key)
}

/// Encrypts `plaintext`, returning the ciphertext with the 16-byte tag appended.
pub fn seal(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| ProofError::EncryptionError)?;
    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| ProofError::EncryptionError)
}

/// Decrypts and authenticates `sealed` (ciphertext followed by tag).
///
/// # Errors
///
/// * `ProofError::WrongPassphraseOrCorrupt` - if authentication fails for any reason
pub fn open(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    sealed: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|_| ProofError::WrongPassphraseOrCorrupt)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: sealed, aad })
        .map(Zeroizing::new)
        .map_err(|_| ProofError::WrongPassphraseOrCorrupt)
}
