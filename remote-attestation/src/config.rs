use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{
    constants::{
        ACCEPT_INVALID_CERTS_KEY, CACHE_TTL_SECS_KEY, DEFAULT_CACHE_TTL, DEFAULT_DUAL_TIMEOUT,
        DEFAULT_REMOTE_ATTESTATION_URL, DEFAULT_SELF_ATTESTATION_URL, DEFAULT_TIMEOUT,
        DUAL_TIMEOUT_SECS_KEY, MAX_CONFIG_DURATION, QVL_LIBRARY_KEY, REMOTE_ATTESTATION_ENDPOINT_KEY,
        REQUEST_TIMEOUT_SECS_KEY, SELF_ATTESTATION_ENDPOINT_KEY,
    },
    errors::{AttestError, Result},
    types::TargetId,
    utils::{env_bool, env_secs},
};

/// Settings of the attestation coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationConfig {
    pub self_endpoint: Url,
    pub remote_endpoint: Url,
    pub cache_ttl: Duration,
    /// Timeout of a single endpoint request
    pub request_timeout: Duration,
    /// Deadline of a whole dual attestation request
    pub dual_timeout: Duration,
    pub accept_invalid_certs: bool,
    /// Name or path of the DCAP quote verification library
    pub qvl_library: String,
}

impl AttestationConfig {
    /// Builds the configuration from the defaults and environment overrides.
    ///
    /// # Errors
    ///
    /// * `AttestError::UrlParseError` - if an endpoint override is not a URL
    /// * `AttestError::ConfigError` - if a numeric or boolean override cannot be read
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var(SELF_ATTESTATION_ENDPOINT_KEY) {
            config.self_endpoint = Url::parse(endpoint.trim())?;
        }
        if let Ok(endpoint) = std::env::var(REMOTE_ATTESTATION_ENDPOINT_KEY) {
            config.remote_endpoint = Url::parse(endpoint.trim())?;
        }
        if let Some(secs) = env_secs(CACHE_TTL_SECS_KEY)? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_secs(REQUEST_TIMEOUT_SECS_KEY)? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_secs(DUAL_TIMEOUT_SECS_KEY)? {
            config.dual_timeout = Duration::from_secs(secs);
        }
        if let Some(accept) = env_bool(ACCEPT_INVALID_CERTS_KEY)? {
            config.accept_invalid_certs = accept;
        }
        if let Ok(library) = std::env::var(QVL_LIBRARY_KEY) {
            config.qvl_library = library;
        }
        config.validate()?;
        debug!(level = "config", "Attestation configuration: {config:?}");
        Ok(config)
    }

    /// Rejects zero durations and durations longer than `MAX_CONFIG_DURATION`.
    ///
    /// # Errors
    ///
    /// * `AttestError::ConfigError` - naming the offending environment key
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            (CACHE_TTL_SECS_KEY, self.cache_ttl),
            (REQUEST_TIMEOUT_SECS_KEY, self.request_timeout),
            (DUAL_TIMEOUT_SECS_KEY, self.dual_timeout),
        ] {
            if value.is_zero() {
                return Err(AttestError::ConfigError {
                    key: key.to_string(),
                    message: "duration must be positive".to_string(),
                });
            }
            if value > MAX_CONFIG_DURATION {
                return Err(AttestError::ConfigError {
                    key: key.to_string(),
                    message: format!(
                        "duration of {}s exceeds the maximum of {}s",
                        value.as_secs(),
                        MAX_CONFIG_DURATION.as_secs()
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn endpoint(&self, target: TargetId) -> &Url {
        match target {
            TargetId::SelfVm => &self.self_endpoint,
            TargetId::RemoteVm => &self.remote_endpoint,
        }
    }
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            self_endpoint: Url::parse(DEFAULT_SELF_ATTESTATION_URL)
                .expect("default self attestation URL is valid"),
            remote_endpoint: Url::parse(DEFAULT_REMOTE_ATTESTATION_URL)
                .expect("default remote attestation URL is valid"),
            cache_ttl: DEFAULT_CACHE_TTL,
            request_timeout: DEFAULT_TIMEOUT,
            dual_timeout: DEFAULT_DUAL_TIMEOUT,
            accept_invalid_certs: true,
            qvl_library: tdx_qvl::DEFAULT_QVL_LIBRARY.to_string(),
        }
    }
}
