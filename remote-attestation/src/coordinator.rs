use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, instrument, warn};
use url::Url;

use crate::{
    cache::AttestationCache,
    config::AttestationConfig,
    errors::{ExtractError, Result, VerifierError},
    extractor::{QuoteExtractor, QuoteSource},
    types::{AttestationRecord, DualAttestationResult, TargetId, VerificationStatus},
    verifier::QuoteVerifier,
};

/// Snapshot of the coordinator settings and cache occupancy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub self_endpoint: Url,
    pub remote_endpoint: Url,
    pub cached_entries: usize,
    pub cache_ttl_secs: u64,
    pub dual_timeout_secs: u64,
}

struct Inner {
    config: AttestationConfig,
    source: Arc<dyn QuoteSource>,
    verifier: QuoteVerifier,
    cache: Arc<AttestationCache>,
}

/// Attests the self VM and the inference VM.
///
/// Cloning is cheap; clones share the source, verifier and cache.
#[derive(Clone)]
pub struct AttestationCoordinator {
    inner: Arc<Inner>,
}

impl AttestationCoordinator {
    pub fn new(
        config: AttestationConfig,
        source: Arc<dyn QuoteSource>,
        verifier: QuoteVerifier,
        cache: Arc<AttestationCache>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                source,
                verifier,
                cache,
            }),
        }
    }

    /// Builds a coordinator fetching over HTTPS and verifying with the DCAP library.
    ///
    /// # Errors
    ///
    /// * `AttestError::ClientBuildError` - if the HTTP client cannot be built
    pub fn from_config(config: AttestationConfig) -> Result<Self> {
        let source = QuoteExtractor::new(Some(config.request_timeout), config.accept_invalid_certs)?;
        let verifier = QuoteVerifier::dcap(config.qvl_library.clone());
        let cache = Arc::new(AttestationCache::new(config.cache_ttl));
        Ok(Self::new(config, Arc::new(source), verifier, cache))
    }

    pub fn config(&self) -> &AttestationConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &Arc<AttestationCache> {
        &self.inner.cache
    }

    pub async fn get_self_attestation(&self) -> AttestationRecord {
        self.get_attestation(TargetId::SelfVm).await
    }

    pub async fn get_remote_attestation(&self) -> AttestationRecord {
        self.get_attestation(TargetId::RemoteVm).await
    }

    /// Returns the attestation record of `target`, from the cache when fresh.
    ///
    /// Failures are returned as error-status records. Records from a completed fetch
    /// are cached, including `ParseError` ones. `EndpointUnreachable` records are not.
    #[instrument(level = "debug", name = "get_attestation", skip(self, target), fields(vm = %target))]
    pub async fn get_attestation(&self, target: TargetId) -> AttestationRecord {
        if let Some(record) = self.inner.cache.get(target) {
            return record;
        }
        let endpoint = self.inner.config.endpoint(target);
        let record = match self.inner.source.fetch(endpoint).await {
            Ok(fetched) => {
                let verifier = self.inner.verifier.clone();
                let quote_hex = fetched.quote_hex.clone();
                match tokio::task::spawn_blocking(move || verifier.verify_hex(&quote_hex)).await {
                    Ok(Ok(record)) => record.with_certificate_fingerprint(fetched.certificate_fingerprint),
                    Ok(Err(e)) => verifier_error_record(e, fetched.quote_hex, fetched.certificate_fingerprint),
                    Err(e) => {
                        error!(level = "coordinator", "Verification task for {target} failed: {e}");
                        return AttestationRecord::error_record(
                            VerificationStatus::Unspecified,
                            format!("verification task failed: {e}"),
                            fetched.quote_hex,
                            fetched.certificate_fingerprint,
                        );
                    }
                }
            }
            Err(e) => extract_error_record(e),
        };
        if record.verification_status == VerificationStatus::EndpointUnreachable {
            warn!(level = "coordinator", "Attestation endpoint for {target} unreachable");
        } else {
            self.inner.cache.insert(target, record.clone());
        }
        info!(
            level = "coordinator",
            "Attestation of {target}: {}", record.verification_status
        );
        record
    }

    /// Attests both VMs concurrently under one deadline.
    ///
    /// A target still pending when the deadline elapses gets an
    /// `EndpointUnreachable` record. Its task keeps running and may still fill the
    /// cache.
    #[instrument(level = "debug", name = "get_dual_attestation", skip(self))]
    pub async fn get_dual_attestation(&self) -> DualAttestationResult {
        let deadline = Instant::now() + self.inner.config.dual_timeout;
        let self_task = self.spawn_attestation(TargetId::SelfVm);
        let remote_task = self.spawn_attestation(TargetId::RemoteVm);

        let self_vm = Self::await_slot(TargetId::SelfVm, self_task, deadline).await;
        let remote_vm = Self::await_slot(TargetId::RemoteVm, remote_task, deadline).await;
        let result = DualAttestationResult::new(self_vm, remote_vm);
        info!(
            level = "coordinator",
            "Dual attestation: {}", result.dual_attestation()
        );
        result
    }

    pub fn status(&self) -> CoordinatorStatus {
        let config = &self.inner.config;
        CoordinatorStatus {
            self_endpoint: config.self_endpoint.clone(),
            remote_endpoint: config.remote_endpoint.clone(),
            cached_entries: self.inner.cache.len(),
            cache_ttl_secs: self.inner.cache.ttl().as_secs(),
            dual_timeout_secs: config.dual_timeout.as_secs(),
        }
    }

    fn spawn_attestation(&self, target: TargetId) -> tokio::task::JoinHandle<AttestationRecord> {
        let this = self.clone();
        tokio::spawn(async move { this.get_attestation(target).await })
    }

    async fn await_slot(
        target: TargetId,
        task: tokio::task::JoinHandle<AttestationRecord>,
        deadline: Instant,
    ) -> AttestationRecord {
        match timeout_at(deadline, task).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                error!(level = "coordinator", "Attestation task for {target} failed: {e}");
                AttestationRecord::error_record(
                    VerificationStatus::Unspecified,
                    format!("attestation task failed: {e}"),
                    String::new(),
                    String::new(),
                )
            }
            Err(_) => {
                warn!(
                    level = "coordinator",
                    "Attestation of {target} did not finish before the dual deadline"
                );
                AttestationRecord::error_record(
                    VerificationStatus::EndpointUnreachable,
                    "dual attestation deadline elapsed",
                    String::new(),
                    String::new(),
                )
            }
        }
    }
}

impl std::fmt::Debug for AttestationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationCoordinator")
            .field("config", &self.inner.config)
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

fn extract_error_record(e: ExtractError) -> AttestationRecord {
    let status = match e {
        ExtractError::NoQuoteFound => VerificationStatus::ParseError,
        ExtractError::EndpointUnreachable(_)
        | ExtractError::NoPeerCertificate
        | ExtractError::CertificateParseError(_) => VerificationStatus::EndpointUnreachable,
    };
    AttestationRecord::error_record(status, e.to_string(), String::new(), String::new())
}

fn verifier_error_record(
    e: VerifierError,
    quote_hex: String,
    certificate_fingerprint: String,
) -> AttestationRecord {
    let status = match e {
        VerifierError::QuoteTooShort { .. } | VerifierError::InvalidHex(_) => {
            VerificationStatus::ParseError
        }
        VerifierError::BackendError(_) | VerifierError::BackendUnavailable(_) => {
            VerificationStatus::Unspecified
        }
    };
    AttestationRecord::error_record(status, e.to_string(), quote_hex, certificate_fingerprint)
}
