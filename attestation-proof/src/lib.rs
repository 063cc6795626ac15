//! Proof artifacts
//!
//! A proof binds a question/answer exchange to the dual attestation taken for it and
//! seals both under a passphrase (scrypt key derivation, AES-256-GCM).

pub mod artifact;
pub mod constants;
pub mod crypto;
pub mod errors;
pub mod manager;
#[cfg(test)]
mod tests;
pub mod types;
pub mod verifier;

pub use artifact::KdfParams;
pub use errors::{ProofError, Result};
pub use manager::{artifact_file_name, ProofManager};
pub use types::{Interaction, ProofMetadata, ProofRecord, ProofVerificationReport, ProofVerifyResponse};
pub use verifier::{ProofVerifier, ReverificationReport};
