use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProofError>;

#[derive(Debug, Error)]
pub enum ProofError {
    #[error("Passphrase must not be empty")]
    EmptyPassphrase,
    #[error("Unsupported proof format version {0}")]
    UnsupportedFormatVersion(u16),
    /// Bad magic, truncation, out-of-range parameters and authentication failure all
    /// map here so a caller cannot tell a wrong passphrase from tampering.
    #[error("Wrong passphrase or corrupt proof artifact")]
    WrongPassphraseOrCorrupt,
    #[error("Proof structure invalid: {0}")]
    StructureInvalid(String),
    #[error("Invalid key derivation parameters: {0}")]
    InvalidKdfParams(String),
    #[error("Failed to serialize proof record")]
    SerializationError(#[from] serde_json::Error),
    #[error("Failed to encrypt proof record")]
    EncryptionError,
}
