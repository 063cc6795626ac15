use chrono::{DateTime, Utc};
use remote_attestation::{utils::sha256_hex, DualAttestationResult};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_GENERATOR, ENCRYPTION_SCHEME, PAYLOAD_VERSION, PROOF_TYPE};

/// The question/answer exchange a proof is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub question: String,
    pub answer: String,
    /// SHA-256 of the UTF-8 question, lowercase hex
    pub question_hash: String,
    /// SHA-256 of the UTF-8 answer, lowercase hex
    pub answer_hash: String,
}

impl Interaction {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        let question = question.into();
        let answer = answer.into();
        Self {
            question_hash: sha256_hex(question.as_bytes()),
            answer_hash: sha256_hex(answer.as_bytes()),
            question,
            answer,
        }
    }

    pub fn hashes_match(&self) -> bool {
        self.question_hash == sha256_hex(self.question.as_bytes())
            && self.answer_hash == sha256_hex(self.answer.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofMetadata {
    pub generator: String,
    pub proof_type: String,
    pub encryption: String,
}

impl ProofMetadata {
    pub fn new(generator: impl Into<String>) -> Self {
        Self {
            generator: generator.into(),
            proof_type: PROOF_TYPE.to_string(),
            encryption: ENCRYPTION_SCHEME.to_string(),
        }
    }
}

impl Default for ProofMetadata {
    fn default() -> Self {
        Self::new(DEFAULT_GENERATOR)
    }
}

/// Plaintext of a proof artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub interaction: Interaction,
    pub attestation: DualAttestationResult,
    pub metadata: ProofMetadata,
}

impl ProofRecord {
    pub fn new(
        interaction: Interaction,
        attestation: DualAttestationResult,
        metadata: ProofMetadata,
    ) -> Self {
        Self {
            version: PAYLOAD_VERSION.to_string(),
            timestamp: Utc::now(),
            interaction,
            attestation,
            metadata,
        }
    }
}

/// Outcome of opening an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofVerificationReport {
    /// The artifact opened, its structure is valid and both VMs were verified
    pub verified: bool,
    pub dual_attestation: bool,
    pub record: ProofRecord,
}

/// Response body of `POST /proof/verify`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofVerifyResponse {
    pub success: bool,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_data: Option<ProofRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub verification_timestamp: DateTime<Utc>,
}
