use chrono::{DateTime, Utc};
use remote_attestation::{AttestationCoordinator, DualAttestationResult};
use tracing::{info, instrument};
use zeroize::Zeroizing;

use crate::{
    artifact::{ArtifactHeader, KdfParams},
    constants::{ARTIFACT_FILE_EXTENSION, ARTIFACT_FILE_PREFIX, DEFAULT_GENERATOR},
    crypto::{derive_key, random_nonce, random_salt, seal},
    errors::{ProofError, Result},
    types::{Interaction, ProofMetadata, ProofRecord},
};

/// Seals question/answer exchanges together with their dual attestation.
#[derive(Debug, Clone)]
pub struct ProofManager {
    generator: String,
    kdf: KdfParams,
}

impl ProofManager {
    pub fn new() -> Self {
        Self {
            generator: DEFAULT_GENERATOR.to_string(),
            kdf: KdfParams::default(),
        }
    }

    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }

    /// # Errors
    ///
    /// * `ProofError::InvalidKdfParams` - if the parameters could not be opened again
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Result<Self> {
        kdf.validate()?;
        self.kdf = kdf;
        Ok(self)
    }

    pub fn kdf_params(&self) -> KdfParams {
        self.kdf
    }

    /// Generates an encrypted proof artifact.
    ///
    /// # Arguments
    ///
    /// * `question` - The question asked to the inference VM
    /// * `answer` - The answer it returned
    /// * `attestation` - Dual attestation taken for the exchange
    /// * `passphrase` - Passphrase the artifact is sealed with
    ///
    /// # Returns
    ///
    /// The complete artifact bytes. Nothing is returned unless every step succeeded.
    ///
    /// # Errors
    ///
    /// * `ProofError::EmptyPassphrase` - if `passphrase` is empty
    /// * `ProofError::SerializationError` - if the record cannot be serialized
    /// * `ProofError::InvalidKdfParams` - if key derivation fails
    /// * `ProofError::EncryptionError` - if encryption fails
    #[instrument(level = "debug", name = "generate_proof", skip_all, fields(dual_attestation = attestation.dual_attestation()))]
    pub fn generate(
        &self,
        question: &str,
        answer: &str,
        attestation: &DualAttestationResult,
        passphrase: &str,
    ) -> Result<Vec<u8>> {
        if passphrase.is_empty() {
            return Err(ProofError::EmptyPassphrase);
        }
        let record = ProofRecord::new(
            Interaction::new(question, answer),
            attestation.clone(),
            ProofMetadata::new(self.generator.clone()),
        );
        let plaintext = Zeroizing::new(serde_json::to_vec(&record)?);

        let header = ArtifactHeader::new(self.kdf, random_salt(), random_nonce());
        let header_bytes = header.encode();
        let key = derive_key(passphrase, &header.salt, &header.kdf)?;
        let sealed = seal(&key, &header.nonce, &header_bytes, &plaintext)?;

        let mut artifact = Vec::with_capacity(header_bytes.len() + sealed.len());
        artifact.extend_from_slice(&header_bytes);
        artifact.extend_from_slice(&sealed);
        info!(
            level = "proof_manager",
            "Generated {} byte proof artifact", artifact.len()
        );
        Ok(artifact)
    }

    /// Takes a fresh dual attestation from `coordinator` and generates a proof with it.
    pub async fn generate_with_coordinator(
        &self,
        coordinator: &AttestationCoordinator,
        question: &str,
        answer: &str,
        passphrase: &str,
    ) -> Result<(Vec<u8>, DualAttestationResult)> {
        if passphrase.is_empty() {
            return Err(ProofError::EmptyPassphrase);
        }
        let attestation = coordinator.get_dual_attestation().await;
        let artifact = self.generate(question, answer, &attestation, passphrase)?;
        Ok((artifact, attestation))
    }
}

impl Default for ProofManager {
    fn default() -> Self {
        Self::new()
    }
}

/// File name for an artifact created at `timestamp`,
/// `secretgpt_proof_YYYYmmdd_HHMMSS.attestproof`.
pub fn artifact_file_name(timestamp: DateTime<Utc>) -> String {
    format!(
        "{ARTIFACT_FILE_PREFIX}{}.{ARTIFACT_FILE_EXTENSION}",
        timestamp.format("%Y%m%d_%H%M%S")
    )
}
