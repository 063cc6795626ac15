use std::sync::Arc;

use chrono::Utc;
use remote_attestation::{
    AttestationRecord, QuoteVerificationBackend, QuoteVerifier, VerificationStatus,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{
    artifact::Artifact,
    constants::{PAYLOAD_VERSION, PROOF_TYPE},
    crypto::{derive_key, open},
    errors::{ProofError, Result},
    types::{ProofRecord, ProofVerificationReport, ProofVerifyResponse},
};

/// Fresh vendor statuses of the quotes embedded in a proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverificationReport {
    pub self_vm: VerificationStatus,
    pub remote_vm: VerificationStatus,
    /// Both quotes still verify and their measurements equal the recorded ones
    pub measurements_match: bool,
}

/// Opens proof artifacts and checks their internal consistency.
///
/// Hardware verification is not repeated here, see [`ProofVerifier::reverify_embedded_quotes`].
#[derive(Debug, Clone, Default)]
pub struct ProofVerifier;

impl ProofVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Decrypts an artifact and validates its structure.
    ///
    /// # Errors
    ///
    /// * `ProofError::UnsupportedFormatVersion` - if the container version is unknown
    /// * `ProofError::WrongPassphraseOrCorrupt` - for a wrong passphrase or a damaged artifact
    /// * `ProofError::StructureInvalid` - if the plaintext does not form a consistent proof
    #[instrument(level = "debug", name = "verify_proof", skip_all, fields(artifact_len = artifact.len()))]
    pub fn verify(&self, artifact: &[u8], passphrase: &str) -> Result<ProofRecord> {
        let artifact = Artifact::parse(artifact)?;
        let key = derive_key(passphrase, &artifact.header.salt, &artifact.header.kdf)
            .map_err(|_| ProofError::WrongPassphraseOrCorrupt)?;
        let plaintext = open(
            &key,
            &artifact.header.nonce,
            artifact.header_bytes,
            artifact.sealed,
        )?;
        let record: ProofRecord = serde_json::from_slice(&plaintext)
            .map_err(|e| ProofError::StructureInvalid(format!("payload is not a proof record: {e}")))?;
        validate_structure(&record)?;
        debug!(level = "proof_verifier", "Proof artifact opened and validated");
        Ok(record)
    }

    pub fn verify_report(&self, artifact: &[u8], passphrase: &str) -> Result<ProofVerificationReport> {
        let record = self.verify(artifact, passphrase)?;
        let dual_attestation = record.attestation.dual_attestation();
        Ok(ProofVerificationReport {
            verified: dual_attestation,
            dual_attestation,
            record,
        })
    }

    /// Same as [`ProofVerifier::verify_report`], shaped as the `POST /proof/verify` response.
    pub fn verify_response(&self, artifact: &[u8], passphrase: &str) -> ProofVerifyResponse {
        match self.verify_report(artifact, passphrase) {
            Ok(report) => ProofVerifyResponse {
                success: true,
                verified: report.verified,
                proof_data: Some(report.record),
                error: None,
                verification_timestamp: Utc::now(),
            },
            Err(e) => {
                warn!(level = "proof_verifier", "Proof verification failed: {e}");
                ProofVerifyResponse {
                    success: false,
                    verified: false,
                    proof_data: None,
                    error: Some(e.to_string()),
                    verification_timestamp: Utc::now(),
                }
            }
        }
    }

    /// Runs the raw quotes stored in a proof through the vendor verifier again.
    ///
    /// The call may block; async callers should use the blocking pool.
    pub fn reverify_embedded_quotes(
        &self,
        record: &ProofRecord,
        backend: Arc<dyn QuoteVerificationBackend>,
    ) -> ReverificationReport {
        let verifier = QuoteVerifier::new(backend);
        let reverify = |recorded: &AttestationRecord| -> (VerificationStatus, bool) {
            if recorded.raw_quote.is_empty() {
                return (recorded.verification_status, false);
            }
            match verifier.verify_hex(&recorded.raw_quote) {
                Ok(fresh) => {
                    let same = fresh.measurement_boot == recorded.measurement_boot
                        && fresh.measurement_runtime == recorded.measurement_runtime
                        && fresh.report_data == recorded.report_data;
                    (fresh.verification_status, same && fresh.is_verified())
                }
                Err(e) => {
                    warn!(level = "proof_verifier", "Embedded quote unreadable: {e}");
                    (VerificationStatus::ParseError, false)
                }
            }
        };
        let (self_vm, self_match) = reverify(record.attestation.self_vm());
        let (remote_vm, remote_match) = reverify(record.attestation.remote_vm());
        ReverificationReport {
            self_vm,
            remote_vm,
            measurements_match: self_match && remote_match,
        }
    }
}

fn validate_structure(record: &ProofRecord) -> Result<()> {
    let invalid = |message: &str| Err(ProofError::StructureInvalid(message.to_string()));
    if record.version != PAYLOAD_VERSION {
        return invalid(&format!("unsupported payload version {}", record.version));
    }
    if record.metadata.proof_type != PROOF_TYPE {
        return invalid(&format!("unexpected proof type {}", record.metadata.proof_type));
    }
    if !record.interaction.hashes_match() {
        return invalid("interaction hash mismatch");
    }
    for (name, attestation) in [
        ("self_vm", record.attestation.self_vm()),
        ("remote_vm", record.attestation.remote_vm()),
    ] {
        if !measurements_well_formed(attestation) {
            return invalid(&format!("{name} measurement fields malformed"));
        }
    }
    if !record.attestation.is_consistent() {
        return invalid("dual_attestation flag inconsistent with verification statuses");
    }
    Ok(())
}

fn measurements_well_formed(record: &AttestationRecord) -> bool {
    record.has_well_formed_measurements() || (!record.is_verified() && record.has_error_sentinels())
}
