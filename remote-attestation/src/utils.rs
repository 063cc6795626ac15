use sha2::{Digest, Sha256};

use crate::errors::{AttestError, Result};

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Returns true if `value` is exactly `len` lowercase hex digits.
pub fn is_fixed_hex(value: &str, len: usize) -> bool {
    value.len() == len
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Reads a boolean environment override.
///
/// # Returns
///
/// * `Ok(None)` if the variable is not set
/// * `Ok(Some(_))` for `true`/`false`/`1`/`0` (case insensitive)
///
/// # Errors
///
/// * `AttestError::ConfigError` - for any other value
pub fn env_bool(key: &str) -> Result<Option<bool>> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(Some(true)),
        "false" | "0" => Ok(Some(false)),
        other => Err(AttestError::ConfigError {
            key: key.to_string(),
            message: format!("expected a boolean, got `{other}`"),
        }),
    }
}

/// Reads a positive integer environment override, in seconds.
pub fn env_secs(key: &str) -> Result<Option<u64>> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(secs)),
        _ => Err(AttestError::ConfigError {
            key: key.to_string(),
            message: format!("expected a positive number of seconds, got `{raw}`"),
        }),
    }
}
