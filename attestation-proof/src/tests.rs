use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use remote_attestation::{
    constants::quote_layout::{
        BODY_MRTD_OFFSET, BODY_REPORT_DATA_OFFSET, BODY_RTMR0_OFFSET, HEADER_SIZE as QUOTE_HEADER_SIZE,
        TD10_REPORT_BODY_SIZE, TEE_TYPE_TDX,
    },
    extractor::ExtractResult,
    utils::sha256_hex,
    verifier::VerifierResult,
    AttestationCache, AttestationConfig, AttestationCoordinator, AttestationRecord,
    DualAttestationResult, FetchedQuote, QuoteSource, QuoteVerdict, QuoteVerificationBackend,
    QuoteVerifier, VerificationStatus,
};
use url::Url;

use crate::{
    artifact::{Artifact, ArtifactHeader, KdfParams},
    constants::{HEADER_SIZE, TAG_SIZE},
    crypto::{derive_key, random_nonce, random_salt, seal},
    artifact_file_name, Interaction, ProofError, ProofManager, ProofMetadata, ProofRecord,
    ProofVerifier,
};

const PASSPHRASE: &str = "correct horse battery staple";
const QUESTION: &str = "What is the capital of France?";
const ANSWER: &str = "Paris.";

fn fast_kdf() -> KdfParams {
    KdfParams {
        log_n: 10,
        r: 8,
        p: 1,
    }
}

fn manager() -> ProofManager {
    ProofManager::new()
        .with_kdf_params(fast_kdf())
        .expect("kdf params in range")
}

fn tdx_quote(mrtd: u8, rtmr: [u8; 4], report_data: u8) -> Vec<u8> {
    let mut quote = vec![0u8; QUOTE_HEADER_SIZE + TD10_REPORT_BODY_SIZE + 4];
    quote[0..2].copy_from_slice(&4u16.to_le_bytes());
    quote[4..8].copy_from_slice(&TEE_TYPE_TDX.to_le_bytes());
    let body = &mut quote[QUOTE_HEADER_SIZE..QUOTE_HEADER_SIZE + TD10_REPORT_BODY_SIZE];
    body[BODY_MRTD_OFFSET..BODY_MRTD_OFFSET + 48].fill(mrtd);
    for (i, fill) in rtmr.iter().enumerate() {
        let offset = BODY_RTMR0_OFFSET + i * 48;
        body[offset..offset + 48].fill(*fill);
    }
    body[BODY_REPORT_DATA_OFFSET..BODY_REPORT_DATA_OFFSET + 64].fill(report_data);
    quote
}

struct FixedBackend(VerificationStatus);

impl QuoteVerificationBackend for FixedBackend {
    fn verify_quote(&self, _quote: &[u8]) -> VerifierResult<QuoteVerdict> {
        Ok(QuoteVerdict {
            status: self.0,
            collateral_expired: false,
        })
    }
}

fn record_for(quote: &[u8], status: VerificationStatus) -> AttestationRecord {
    QuoteVerifier::new(Arc::new(FixedBackend(status)))
        .verify(quote)
        .expect("record")
        .with_certificate_fingerprint(sha256_hex(quote))
}

fn verified_dual() -> DualAttestationResult {
    DualAttestationResult::new(
        record_for(&tdx_quote(0x11, [0x21, 0x22, 0x23, 0x24], 0x31), VerificationStatus::Verified),
        record_for(&tdx_quote(0x12, [0x25, 0x26, 0x27, 0x28], 0x32), VerificationStatus::Verified),
    )
}

fn seal_payload(payload: &[u8], passphrase: &str) -> Vec<u8> {
    let header = ArtifactHeader::new(fast_kdf(), random_salt(), random_nonce());
    let header_bytes = header.encode();
    let key = derive_key(passphrase, &header.salt, &header.kdf).expect("key");
    let sealed = seal(&key, &header.nonce, &header_bytes, payload).expect("sealed");
    [header_bytes.as_slice(), sealed.as_slice()].concat()
}

fn seal_json(value: &serde_json::Value) -> Vec<u8> {
    seal_payload(&serde_json::to_vec(value).expect("json"), PASSPHRASE)
}

fn record_json() -> serde_json::Value {
    let record = ProofRecord::new(
        Interaction::new(QUESTION, ANSWER),
        verified_dual(),
        ProofMetadata::default(),
    );
    serde_json::to_value(record).expect("json")
}

#[test]
fn test_round_trip_preserves_interaction_and_attestation() {
    let attestation = verified_dual();
    let artifact = manager()
        .generate(QUESTION, ANSWER, &attestation, PASSPHRASE)
        .expect("artifact");
    let record = ProofVerifier::new()
        .verify(&artifact, PASSPHRASE)
        .expect("verified");

    assert_eq!(record.attestation, attestation);
    assert_eq!(record.interaction.question, QUESTION);
    assert_eq!(record.interaction.answer, ANSWER);
    assert_eq!(record.interaction.question_hash, sha256_hex(QUESTION));
    assert_eq!(record.version, "2.0.0");
    assert_eq!(record.metadata.generator, "secretGPT");
    assert_eq!(record.metadata.proof_type, "dual_vm_attestation");
    assert_eq!(record.metadata.encryption, "scrypt+AES-256-GCM");

    let self_vm = record.attestation.self_vm();
    assert_eq!(self_vm.measurement_boot, hex::encode([0x11; 48]));
    assert_eq!(
        self_vm.measurement_runtime,
        [0x21u8, 0x22, 0x23, 0x24].map(|fill| hex::encode([fill; 48]))
    );
    assert_eq!(
        record.attestation.remote_vm().measurement_runtime,
        [0x25u8, 0x26, 0x27, 0x28].map(|fill| hex::encode([fill; 48]))
    );
    assert!(record.attestation.dual_attestation());
}

#[test]
fn test_report_and_response_for_verified_proof() {
    let artifact = manager()
        .generate(QUESTION, ANSWER, &verified_dual(), PASSPHRASE)
        .expect("artifact");
    let verifier = ProofVerifier::new();
    let report = verifier.verify_report(&artifact, PASSPHRASE).expect("report");
    assert!(report.verified);
    assert!(report.dual_attestation);

    let response = verifier.verify_response(&artifact, PASSPHRASE);
    assert!(response.success);
    assert!(response.verified);
    assert!(response.proof_data.is_some());
    assert!(response.error.is_none());

    let response = verifier.verify_response(&artifact, "wrong");
    assert!(!response.success);
    assert!(!response.verified);
    assert!(response.proof_data.is_none());
    assert!(response.error.is_some());
}

#[test]
fn test_wrong_passphrase_rejected() {
    let artifact = manager()
        .generate(QUESTION, ANSWER, &verified_dual(), PASSPHRASE)
        .expect("artifact");
    let err = ProofVerifier::new()
        .verify(&artifact, "correct horse battery stapler")
        .unwrap_err();
    assert!(matches!(err, ProofError::WrongPassphraseOrCorrupt));
}

#[test]
fn test_any_single_bit_flip_is_indistinguishable_corruption() {
    let artifact = manager()
        .generate(QUESTION, ANSWER, &verified_dual(), PASSPHRASE)
        .expect("artifact");
    let positions = [
        0,                        // magic
        6,                        // log_n, stays in range
        20,                       // salt
        HEADER_SIZE - 1,          // nonce
        HEADER_SIZE,              // first ciphertext byte
        artifact.len() - TAG_SIZE - 1,
        artifact.len() - 1,       // tag
    ];
    for position in positions {
        let mut tampered = artifact.clone();
        tampered[position] ^= 0x01;
        let err = ProofVerifier::new().verify(&tampered, PASSPHRASE).unwrap_err();
        assert!(
            matches!(err, ProofError::WrongPassphraseOrCorrupt),
            "flip at {position} gave {err:?}"
        );
    }
}

#[test]
fn test_unsupported_format_version_reported_distinctly() {
    let mut artifact = manager()
        .generate(QUESTION, ANSWER, &verified_dual(), PASSPHRASE)
        .expect("artifact");
    artifact[4..6].copy_from_slice(&2u16.to_be_bytes());
    let err = ProofVerifier::new().verify(&artifact, PASSPHRASE).unwrap_err();
    assert!(matches!(err, ProofError::UnsupportedFormatVersion(2)));
}

#[test]
fn test_truncated_and_foreign_input_is_corrupt() {
    let artifact = manager()
        .generate(QUESTION, ANSWER, &verified_dual(), PASSPHRASE)
        .expect("artifact");
    let verifier = ProofVerifier::new();
    for input in [
        &artifact[..0],
        &artifact[..5],
        &artifact[..HEADER_SIZE + TAG_SIZE - 1],
        &artifact[..artifact.len() - 1],
        b"gAAAAABfernet-token-from-another-tool".as_slice(),
    ] {
        assert!(matches!(
            verifier.verify(input, PASSPHRASE),
            Err(ProofError::WrongPassphraseOrCorrupt)
        ));
    }
}

#[test]
fn test_out_of_range_kdf_params_are_corrupt() {
    let mut artifact = manager()
        .generate(QUESTION, ANSWER, &verified_dual(), PASSPHRASE)
        .expect("artifact");
    artifact[6] = 30;
    assert!(matches!(
        ProofVerifier::new().verify(&artifact, PASSPHRASE),
        Err(ProofError::WrongPassphraseOrCorrupt)
    ));
}

#[test]
fn test_empty_passphrase_rejected() {
    let err = manager()
        .generate(QUESTION, ANSWER, &verified_dual(), "")
        .unwrap_err();
    assert!(matches!(err, ProofError::EmptyPassphrase));
}

#[test]
fn test_kdf_params_outside_bounds_rejected_by_manager() {
    let err = ProofManager::new()
        .with_kdf_params(KdfParams {
            log_n: 25,
            r: 8,
            p: 1,
        })
        .unwrap_err();
    assert!(matches!(err, ProofError::InvalidKdfParams(_)));
    assert_eq!(ProofManager::new().kdf_params(), KdfParams::default());
}

#[test]
fn test_header_with_excessive_scrypt_cost_rejected_before_key_derivation() {
    let sealed = [0u8; 32];
    for kdf in [
        KdfParams { log_n: 20, r: 32, p: 1 },
        KdfParams { log_n: 20, r: 8, p: 1 },
        KdfParams { log_n: 15, r: 8, p: 16 },
    ] {
        let mut artifact = ArtifactHeader::new(kdf, random_salt(), random_nonce())
            .encode()
            .to_vec();
        artifact.extend_from_slice(&sealed);
        assert!(
            matches!(Artifact::parse(&artifact), Err(ProofError::WrongPassphraseOrCorrupt)),
            "{kdf:?} accepted"
        );
        assert!(matches!(
            ProofVerifier::new().verify(&artifact, PASSPHRASE),
            Err(ProofError::WrongPassphraseOrCorrupt)
        ));
    }

    // 2^18 * 8 * 128 bytes, exactly the memory ceiling
    let at_limit = KdfParams { log_n: 18, r: 8, p: 4 };
    assert_eq!(at_limit.memory_cost(), 256 * 1024 * 1024);
    let mut artifact = ArtifactHeader::new(at_limit, random_salt(), random_nonce())
        .encode()
        .to_vec();
    artifact.extend_from_slice(&sealed);
    let parsed = Artifact::parse(&artifact).expect("header at the ceiling parses");
    assert_eq!(parsed.header.kdf, at_limit);
    assert_eq!(parsed.sealed.len(), sealed.len());
}

#[test]
fn test_artifacts_use_fresh_salt_and_nonce() {
    let attestation = verified_dual();
    let first = manager()
        .generate(QUESTION, ANSWER, &attestation, PASSPHRASE)
        .expect("artifact");
    let second = manager()
        .generate(QUESTION, ANSWER, &attestation, PASSPHRASE)
        .expect("artifact");
    assert_eq!(&first[..7], &second[..7]);
    assert_ne!(&first[15..HEADER_SIZE], &second[15..HEADER_SIZE]);
}

#[test]
fn test_answer_hash_mismatch_is_structure_invalid() {
    let mut json = record_json();
    json["interaction"]["answer"] = serde_json::Value::from("Lyon.");
    let err = ProofVerifier::new()
        .verify(&seal_json(&json), PASSPHRASE)
        .unwrap_err();
    assert!(matches!(err, ProofError::StructureInvalid(ref m) if m.contains("hash")));
}

#[test]
fn test_inconsistent_dual_flag_is_structure_invalid() {
    let mut json = record_json();
    json["attestation"]["remote_vm"]["verification_status"] = serde_json::Value::from("revoked");
    let err = ProofVerifier::new()
        .verify(&seal_json(&json), PASSPHRASE)
        .unwrap_err();
    assert!(matches!(err, ProofError::StructureInvalid(ref m) if m.contains("dual_attestation")));
}

#[test]
fn test_short_measurement_is_structure_invalid() {
    let mut json = record_json();
    json["attestation"]["self_vm"]["measurement_runtime"][2] =
        serde_json::Value::from(hex::encode([0x23u8; 47]));
    let err = ProofVerifier::new()
        .verify(&seal_json(&json), PASSPHRASE)
        .unwrap_err();
    assert!(matches!(err, ProofError::StructureInvalid(ref m) if m.contains("self_vm")));
}

#[test]
fn test_non_record_payload_is_structure_invalid() {
    let artifact = seal_payload(b"{\"hello\": \"world\"}", PASSPHRASE);
    assert!(matches!(
        ProofVerifier::new().verify(&artifact, PASSPHRASE),
        Err(ProofError::StructureInvalid(_))
    ));
}

#[test]
fn test_partial_attestation_proof_opens_but_is_not_verified() {
    let unreachable = AttestationRecord::error_record(
        VerificationStatus::EndpointUnreachable,
        "dual attestation deadline elapsed",
        String::new(),
        String::new(),
    );
    let attestation = DualAttestationResult::new(unreachable, verified_dual().remote_vm().clone());
    let artifact = manager()
        .generate(QUESTION, ANSWER, &attestation, PASSPHRASE)
        .expect("artifact");
    let report = ProofVerifier::new()
        .verify_report(&artifact, PASSPHRASE)
        .expect("report");
    assert!(!report.verified);
    assert!(!report.dual_attestation);
    assert_eq!(
        report.record.attestation.self_vm().verification_status,
        VerificationStatus::EndpointUnreachable
    );
}

#[test]
fn test_reverify_embedded_quotes() {
    let artifact = manager()
        .generate(QUESTION, ANSWER, &verified_dual(), PASSPHRASE)
        .expect("artifact");
    let verifier = ProofVerifier::new();
    let record = verifier.verify(&artifact, PASSPHRASE).expect("record");

    let report =
        verifier.reverify_embedded_quotes(&record, Arc::new(FixedBackend(VerificationStatus::Verified)));
    assert_eq!(report.self_vm, VerificationStatus::Verified);
    assert_eq!(report.remote_vm, VerificationStatus::Verified);
    assert!(report.measurements_match);

    let report =
        verifier.reverify_embedded_quotes(&record, Arc::new(FixedBackend(VerificationStatus::Revoked)));
    assert_eq!(report.remote_vm, VerificationStatus::Revoked);
    assert!(!report.measurements_match);
}

#[test]
fn test_artifact_file_name() {
    let timestamp = Utc
        .with_ymd_and_hms(2025, 1, 2, 3, 4, 5)
        .single()
        .expect("timestamp");
    assert_eq!(
        artifact_file_name(timestamp),
        "secretgpt_proof_20250102_030405.attestproof"
    );
}

struct StaticSource(HashMap<Url, Vec<u8>>);

#[async_trait]
impl QuoteSource for StaticSource {
    async fn fetch(&self, endpoint: &Url) -> ExtractResult<FetchedQuote> {
        let quote = self
            .0
            .get(endpoint)
            .ok_or(remote_attestation::ExtractError::NoQuoteFound)?;
        Ok(FetchedQuote {
            quote_hex: hex::encode(quote),
            certificate_fingerprint: sha256_hex(endpoint.as_str()),
        })
    }
}

#[tokio::test]
async fn test_generate_with_coordinator() {
    let config = AttestationConfig {
        self_endpoint: Url::parse("https://self.test:29343/cpu.html").expect("url"),
        remote_endpoint: Url::parse("https://remote.test:29343/cpu.html").expect("url"),
        ..AttestationConfig::default()
    };
    let mut quotes = HashMap::new();
    quotes.insert(config.self_endpoint.clone(), tdx_quote(0x11, [0x21, 0x22, 0x23, 0x24], 0x31));
    quotes.insert(config.remote_endpoint.clone(), tdx_quote(0x12, [0x25, 0x26, 0x27, 0x28], 0x32));
    let cache = Arc::new(AttestationCache::new(config.cache_ttl));
    let coordinator = AttestationCoordinator::new(
        config,
        Arc::new(StaticSource(quotes)),
        QuoteVerifier::new(Arc::new(FixedBackend(VerificationStatus::Verified))),
        cache,
    );

    let (artifact, attestation) = manager()
        .generate_with_coordinator(&coordinator, QUESTION, ANSWER, PASSPHRASE)
        .await
        .expect("artifact");
    assert!(attestation.dual_attestation());
    let record = ProofVerifier::new()
        .verify(&artifact, PASSPHRASE)
        .expect("record");
    assert_eq!(record.attestation, attestation);
}
