use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::OnceCell;
use tdx_qvl::{QuoteVerificationLibrary, DEFAULT_QVL_LIBRARY};
use tracing::{debug, instrument, warn};

use crate::{
    constants::MIN_QUOTE_SIZE,
    errors::{QuoteParseError, VerifierError},
    quote::{parse_quote, ParsedQuote},
    types::{AttestationRecord, QuoteVerdict, VerificationStatus},
};

pub type VerifierResult<T> = std::result::Result<T, VerifierError>;

/// Vendor quote verification.
///
/// Implementations may block; async callers run them on the blocking pool.
pub trait QuoteVerificationBackend: Send + Sync {
    /// Checks the quote signature chain and TCB status.
    fn verify_quote(&self, quote: &[u8]) -> VerifierResult<QuoteVerdict>;

    /// Decodes the report body of the quote.
    fn extract_report_body(&self, quote: &[u8]) -> Result<ParsedQuote, QuoteParseError> {
        parse_quote(quote)
    }
}

/// Backend calling the Intel DCAP quote verification library.
///
/// The library is loaded on first use. A failed load is retried on the next call.
#[derive(Debug)]
pub struct DcapBackend {
    library_name: String,
    library: OnceCell<QuoteVerificationLibrary>,
}

impl DcapBackend {
    pub fn new(library_name: impl Into<String>) -> Self {
        Self {
            library_name: library_name.into(),
            library: OnceCell::new(),
        }
    }

    fn library(&self) -> VerifierResult<&QuoteVerificationLibrary> {
        self.library
            .get_or_try_init(|| QuoteVerificationLibrary::open(&self.library_name))
            .map_err(|e| {
                warn!(
                    level = "verifier",
                    "Quote verification library {} unavailable: {e}", self.library_name
                );
                VerifierError::BackendUnavailable(format!("{}: {e}", self.library_name))
            })
    }
}

impl Default for DcapBackend {
    fn default() -> Self {
        Self::new(DEFAULT_QVL_LIBRARY)
    }
}

impl QuoteVerificationBackend for DcapBackend {
    fn verify_quote(&self, quote: &[u8]) -> VerifierResult<QuoteVerdict> {
        let verification = self
            .library()?
            .verify_quote(quote, Utc::now().timestamp())?;
        Ok(QuoteVerdict {
            status: verification.result.into(),
            collateral_expired: verification.collateral_expired,
        })
    }
}

/// Turns quote bytes into attestation records.
#[derive(Clone)]
pub struct QuoteVerifier {
    backend: Arc<dyn QuoteVerificationBackend>,
}

impl QuoteVerifier {
    pub fn new(backend: Arc<dyn QuoteVerificationBackend>) -> Self {
        Self { backend }
    }

    /// Verifier backed by the DCAP library with the given name or path.
    pub fn dcap(library_name: impl Into<String>) -> Self {
        Self::new(Arc::new(DcapBackend::new(library_name)))
    }

    /// Verifies a quote and decodes its measurements.
    ///
    /// # Arguments
    ///
    /// * `quote` - The raw quote bytes
    ///
    /// # Returns
    ///
    /// A record whose status is the vendor verdict. The record has no certificate
    /// fingerprint; callers that fetched the quote attach it. If the report body cannot
    /// be located the status is `ParseError` and the measurement fields hold sentinels.
    /// If the vendor backend fails the status is `Unspecified` and `error` says why.
    ///
    /// # Errors
    ///
    /// * `VerifierError::QuoteTooShort` - if the quote is shorter than a header, a
    ///   TD 1.0 body and the signature length together
    #[instrument(level = "debug", name = "verify_quote", skip(self, quote), fields(quote_len = quote.len()))]
    pub fn verify(&self, quote: &[u8]) -> VerifierResult<AttestationRecord> {
        if quote.len() < MIN_QUOTE_SIZE {
            return Err(VerifierError::QuoteTooShort {
                actual: quote.len(),
                minimum: MIN_QUOTE_SIZE,
            });
        }
        let raw_quote = hex::encode(quote);

        let (verdict, backend_error) = match self.backend.verify_quote(quote) {
            Ok(verdict) => (verdict, None),
            Err(e) => {
                warn!(level = "verifier", "Vendor verification failed: {e}");
                (
                    QuoteVerdict {
                        status: VerificationStatus::Unspecified,
                        collateral_expired: false,
                    },
                    Some(e.to_string()),
                )
            }
        };

        let parsed = match self.backend.extract_report_body(quote) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(level = "verifier", "Report body not located: {e}");
                return Ok(AttestationRecord::error_record(
                    VerificationStatus::ParseError,
                    e.to_string(),
                    raw_quote,
                    String::new(),
                ));
            }
        };

        debug!(
            level = "verifier",
            "Quote {:?} verified with status {}", parsed.version, verdict.status
        );
        Ok(record_from_parsed(&parsed, verdict, raw_quote, backend_error))
    }

    /// Same as [`QuoteVerifier::verify`] for a hex encoded quote.
    ///
    /// # Errors
    ///
    /// * `VerifierError::InvalidHex` - if `quote_hex` is not valid hex
    /// * `VerifierError::QuoteTooShort` - see [`QuoteVerifier::verify`]
    pub fn verify_hex(&self, quote_hex: &str) -> VerifierResult<AttestationRecord> {
        let quote = hex::decode(quote_hex.trim())?;
        self.verify(&quote)
    }
}

impl std::fmt::Debug for QuoteVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteVerifier").finish_non_exhaustive()
    }
}

fn record_from_parsed(
    parsed: &ParsedQuote,
    verdict: QuoteVerdict,
    raw_quote: String,
    error: Option<String>,
) -> AttestationRecord {
    AttestationRecord {
        measurement_boot: hex::encode(parsed.body.mr_td),
        measurement_runtime: parsed.body.rtmr.map(hex::encode),
        report_data: hex::encode(parsed.body.report_data),
        certificate_fingerprint: String::new(),
        verification_status: verdict.status,
        collateral_expired: verdict.collateral_expired,
        quote_version: Some(parsed.version),
        raw_quote,
        error,
        timestamp: Utc::now(),
    }
}
