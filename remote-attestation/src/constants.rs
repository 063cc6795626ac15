use std::time::Duration;

/// Default self attestation endpoint.
///
/// SecretVM exposes its TDX quote page on port 29343 of the VM itself.
pub const DEFAULT_SELF_ATTESTATION_URL: &str = "https://localhost:29343/cpu.html";

/// Default attestation endpoint of the inference VM.
pub const DEFAULT_REMOTE_ATTESTATION_URL: &str = "https://secretai.scrtlabs.com:29343/cpu.html";

/// Default timeout for a single attestation endpoint request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for a whole dual attestation request.
///
/// A sub-fetch still running when it elapses is reported as unreachable.
pub const DEFAULT_DUAL_TIMEOUT: Duration = Duration::from_secs(45);

/// Default time to live of cached attestation records.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Longest accepted cache time to live, request timeout or dual deadline.
pub const MAX_CONFIG_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Environment variable key overriding the self attestation endpoint.
pub const SELF_ATTESTATION_ENDPOINT_KEY: &str = "SECRETGPT_ATTESTATION_ENDPOINT";

/// Environment variable key overriding the inference VM attestation endpoint.
pub const REMOTE_ATTESTATION_ENDPOINT_KEY: &str = "SECRET_AI_ATTESTATION_ENDPOINT";

/// Environment variable key for the cache time to live, in seconds.
pub const CACHE_TTL_SECS_KEY: &str = "ATTESTATION_CACHE_TTL_SECS";

/// Environment variable key for the per-request timeout, in seconds.
pub const REQUEST_TIMEOUT_SECS_KEY: &str = "ATTESTATION_REQUEST_TIMEOUT_SECS";

/// Environment variable key for the dual attestation deadline, in seconds.
pub const DUAL_TIMEOUT_SECS_KEY: &str = "ATTESTATION_DUAL_TIMEOUT_SECS";

/// Environment variable key controlling acceptance of self-signed endpoint certificates.
pub const ACCEPT_INVALID_CERTS_KEY: &str = "ATTESTATION_ACCEPT_INVALID_CERTS";

/// Environment variable key for the quote verification library path.
pub const QVL_LIBRARY_KEY: &str = "SGX_DCAP_QUOTEVERIFY_LIB";

/// JSON keys that may carry a hex quote in an endpoint response.
pub const QUOTE_JSON_KEYS: [&str; 2] = ["quote", "tdx_quote"];

/// Minimum length of a hex quote found inside a `<pre>` block.
pub const MIN_PRE_QUOTE_HEX_CHARS: usize = 1000;

/// Minimum length of a bare hex run accepted as a quote.
pub const MIN_RAW_QUOTE_HEX_CHARS: usize = 2000;

/// Size of a 48-byte measurement register (MRTD, RTMRn).
pub const MEASUREMENT_SIZE: usize = 48;

/// Size of the REPORTDATA field.
pub const REPORT_DATA_SIZE: usize = 64;

/// Number of runtime measurement registers.
pub const RTMR_COUNT: usize = 4;

/// Hex length of a measurement register.
pub const MEASUREMENT_HEX_LEN: usize = MEASUREMENT_SIZE * 2;

/// Hex length of the REPORTDATA field.
pub const REPORT_DATA_HEX_LEN: usize = REPORT_DATA_SIZE * 2;

/// Prefix of the sentinel written into measurement fields of error records.
pub const ERROR_SENTINEL_PREFIX: &str = "error:";

/// Quote layout, Intel TDX DCAP quote format.
pub mod quote_layout {
    /// Size of the quote header common to every version.
    pub const HEADER_SIZE: usize = 48;
    /// Offset of the little-endian u16 version.
    pub const HEADER_VERSION_OFFSET: usize = 0;
    /// Offset of the little-endian u16 attestation key type.
    pub const HEADER_ATTESTATION_KEY_TYPE_OFFSET: usize = 2;
    /// Offset of the little-endian u32 TEE type.
    pub const HEADER_TEE_TYPE_OFFSET: usize = 4;
    /// Offset of the QE vendor id.
    pub const HEADER_QE_VENDOR_ID_OFFSET: usize = 12;
    /// Size of the QE vendor id.
    pub const HEADER_QE_VENDOR_ID_SIZE: usize = 16;

    /// TEE type of a TDX quote.
    pub const TEE_TYPE_TDX: u32 = 0x81;
    /// TEE type of an SGX quote.
    pub const TEE_TYPE_SGX: u32 = 0x00;

    /// Size of the v5 body descriptor (type u16, size u32) that precedes the body.
    pub const V5_BODY_DESCRIPTOR_SIZE: usize = 6;
    /// v5 body type of a TD 1.0 report.
    pub const V5_BODY_TYPE_TD10: u16 = 2;
    /// v5 body type of a TD 1.5 report.
    pub const V5_BODY_TYPE_TD15: u16 = 3;

    /// Size of a TD 1.0 report body.
    pub const TD10_REPORT_BODY_SIZE: usize = 584;
    /// Size of a TD 1.5 report body (TD 1.0 plus TEE_TCB_SVN2 and MRSERVICETD).
    pub const TD15_REPORT_BODY_SIZE: usize = 648;

    /// Size of the signature data length field after the body.
    pub const SIGNATURE_DATA_LEN_SIZE: usize = 4;

    /// Offsets inside a TD report body.
    pub const BODY_TEE_TCB_SVN_OFFSET: usize = 0;
    pub const BODY_MRSEAM_OFFSET: usize = 16;
    pub const BODY_TD_ATTRIBUTES_OFFSET: usize = 120;
    pub const BODY_XFAM_OFFSET: usize = 128;
    pub const BODY_MRTD_OFFSET: usize = 136;
    pub const BODY_MRCONFIGID_OFFSET: usize = 184;
    pub const BODY_MROWNER_OFFSET: usize = 232;
    pub const BODY_MROWNERCONFIG_OFFSET: usize = 280;
    pub const BODY_RTMR0_OFFSET: usize = 328;
    pub const BODY_REPORT_DATA_OFFSET: usize = 520;
}

/// Smallest byte length a quote can have: header, TD 1.0 body and signature length.
pub const MIN_QUOTE_SIZE: usize = quote_layout::HEADER_SIZE
    + quote_layout::TD10_REPORT_BODY_SIZE
    + quote_layout::SIGNATURE_DATA_LEN_SIZE;
