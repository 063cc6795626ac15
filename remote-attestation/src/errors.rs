use thiserror::Error;

pub type Result<T> = std::result::Result<T, AttestError>;

#[derive(Debug, Error)]
pub enum AttestError {
    #[error("Failed to extract attestation quote: {0}")]
    ExtractError(#[from] ExtractError),
    #[error("Failed to verify attestation quote: {0}")]
    VerifierError(#[from] VerifierError),
    #[error("Failed to parse endpoint URL")]
    UrlParseError(#[from] url::ParseError),
    #[error("Invalid configuration value for `{key}`: {message}")]
    ConfigError { key: String, message: String },
    #[error("Failed to build HTTP client")]
    ClientBuildError(#[source] reqwest::Error),
}

/// Failures of the quote extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Attestation endpoint unreachable: {0}")]
    EndpointUnreachable(#[from] reqwest::Error),
    #[error("No attestation quote found in endpoint response")]
    NoQuoteFound,
    #[error("Attestation endpoint did not present a TLS certificate")]
    NoPeerCertificate,
    #[error("Failed to parse endpoint certificate")]
    CertificateParseError(
        #[from] x509_parser::asn1_rs::Err<x509_parser::prelude::error::X509Error>,
    ),
}

/// Failures of the quote verifier that prevent producing a record at all.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("Quote too short: {actual} bytes, minimum is {minimum}")]
    QuoteTooShort { actual: usize, minimum: usize },
    #[error("Quote is not valid hex")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("Quote verification library error: {0}")]
    BackendError(#[from] tdx_qvl::QvlError),
    #[error("Quote verification backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Reasons the report body of a quote could not be located.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteParseError {
    #[error("Quote truncated: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("Unsupported TEE type {0:#x}, expected a TDX quote")]
    UnsupportedTeeType(u32),
    #[error("Unsupported quote version {0}")]
    UnsupportedVersion(u16),
    #[error("Unsupported report body type {0}")]
    UnsupportedBodyType(u16),
    #[error("Report body size mismatch: declared {declared}, expected {expected}")]
    BodySizeMismatch { declared: u32, expected: usize },
}
