//! Dual-VM TDX attestation
//!
//! This crate fetches TDX quotes from the attestation endpoints of two confidential
//! VMs, verifies them with the Intel DCAP quote verification library and decodes
//! their measurement registers. The coordinator attests both VMs concurrently and
//! keeps a short-lived cache of the results.

pub mod cache;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod errors;
pub mod extractor;
pub mod quote;
pub mod types;
pub mod utils;
pub mod verifier;

pub use cache::AttestationCache;
pub use config::AttestationConfig;
pub use coordinator::{AttestationCoordinator, CoordinatorStatus};
pub use errors::{AttestError, ExtractError, QuoteParseError, Result, VerifierError};
pub use extractor::{find_quote_hex, QuoteExtractor, QuoteSource};
pub use types::{
    AttestationRecord, AttestationResponse, DualAttestationResult, ExpectedMeasurements,
    FetchedQuote, QuoteVerdict, QuoteVersion, TargetId, VerificationStatus,
};
pub use verifier::{DcapBackend, QuoteVerificationBackend, QuoteVerifier};
