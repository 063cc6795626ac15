use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::tls::TlsInfo;
use serde_json::Value;
use tracing::{debug, error, instrument, Instrument};
use url::Url;

use crate::{
    constants::{MIN_PRE_QUOTE_HEX_CHARS, MIN_RAW_QUOTE_HEX_CHARS, QUOTE_JSON_KEYS},
    errors::{AttestError, ExtractError, Result},
    types::FetchedQuote,
    utils::sha256_hex,
};

pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

static PRE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<pre[^>]*>(.*?)</pre>").expect("valid <pre> pattern"));

static RAW_HEX_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("[0-9a-fA-F]{{{MIN_RAW_QUOTE_HEX_CHARS},}}"))
        .expect("valid hex run pattern")
});

/// Anything that can produce a quote for an attestation endpoint.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self, endpoint: &Url) -> ExtractResult<FetchedQuote>;
}

/// Fetches quotes over HTTPS and binds them to the certificate of the connection.
#[derive(Debug, Clone)]
pub struct QuoteExtractor {
    client: reqwest::Client,
}

impl QuoteExtractor {
    /// Builds an extractor.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Request timeout. If `None`, uses the default timeout
    /// * `accept_invalid_certs` - Accept self-signed endpoint certificates
    ///
    /// # Errors
    ///
    /// * `AttestError::ClientBuildError` - if the HTTP client cannot be built
    pub fn new(timeout: Option<Duration>, accept_invalid_certs: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(crate::constants::DEFAULT_TIMEOUT))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .tls_info(true)
            .build()
            .map_err(AttestError::ClientBuildError)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl QuoteSource for QuoteExtractor {
    /// Fetches the attestation page of `endpoint` with a single GET.
    ///
    /// # Errors
    ///
    /// * `ExtractError::EndpointUnreachable` - on transport errors and non-2xx responses
    /// * `ExtractError::NoQuoteFound` - if the body holds no recognisable quote
    /// * `ExtractError::NoPeerCertificate` - if the connection presented no certificate
    /// * `ExtractError::CertificateParseError` - if the certificate is not valid X.509
    #[instrument(level = "debug", name = "fetch_quote", skip(self, endpoint), fields(endpoint = %endpoint))]
    async fn fetch(&self, endpoint: &Url) -> ExtractResult<FetchedQuote> {
        let request_span = tracing::info_span!("attestation_request", url = %endpoint);
        let response = self
            .client
            .get(endpoint.clone())
            .send()
            .instrument(request_span)
            .await
            .map_err(|e| {
                error!(level = "extractor", "Failed to reach attestation endpoint: {e}");
                ExtractError::EndpointUnreachable(e)
            })?;
        let response = response.error_for_status().map_err(|e| {
            error!(
                level = "extractor",
                "Attestation endpoint answered with status {:?}",
                e.status()
            );
            ExtractError::EndpointUnreachable(e)
        })?;

        let peer_certificate = response
            .extensions()
            .get::<TlsInfo>()
            .and_then(|info| info.peer_certificate())
            .map(<[u8]>::to_vec);
        let body = response.text().await?;

        let quote_hex = find_quote_hex(&body).ok_or_else(|| {
            error!(level = "extractor", "No quote in {} byte response", body.len());
            ExtractError::NoQuoteFound
        })?;

        let der = peer_certificate.ok_or(ExtractError::NoPeerCertificate)?;
        let (_, certificate) = x509_parser::parse_x509_certificate(&der)?;
        let certificate_fingerprint = sha256_hex(&der);
        debug!(
            level = "extractor",
            "Fetched {} hex char quote, certificate subject {}, fingerprint {certificate_fingerprint}",
            quote_hex.len(),
            certificate.subject()
        );
        Ok(FetchedQuote {
            quote_hex,
            certificate_fingerprint,
        })
    }
}

fn is_even_hex(value: &str) -> bool {
    !value.is_empty() && value.len() % 2 == 0 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Locates a hex quote in an attestation page.
///
/// Tried in order, first match wins:
/// 1. a JSON object with a string `quote` or `tdx_quote` field
/// 2. a `<pre>` block of at least 1000 hex chars
/// 3. a bare hex run of at least 2000 chars, cut to even length
///
/// The quote is returned lowercased.
pub fn find_quote_hex(body: &str) -> Option<String> {
    if let Ok(Value::Object(document)) = serde_json::from_str::<Value>(body) {
        let from_json = QUOTE_JSON_KEYS
            .iter()
            .filter_map(|key| document.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|candidate| is_even_hex(candidate));
        if let Some(quote) = from_json {
            return Some(quote.to_ascii_lowercase());
        }
    }

    let from_pre = PRE_BLOCK
        .captures_iter(body)
        .filter_map(|captures| captures.get(1))
        .map(|content| content.as_str().trim())
        .find(|content| content.len() >= MIN_PRE_QUOTE_HEX_CHARS && is_even_hex(content));
    if let Some(quote) = from_pre {
        return Some(quote.to_ascii_lowercase());
    }

    RAW_HEX_RUN.find(body).map(|run| {
        let run = run.as_str();
        run[..run.len() - run.len() % 2].to_ascii_lowercase()
    })
}
