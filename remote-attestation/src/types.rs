use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tdx_qvl::QvResult;

use crate::{
    constants::{
        ERROR_SENTINEL_PREFIX, MEASUREMENT_HEX_LEN, REPORT_DATA_HEX_LEN, RTMR_COUNT,
    },
    utils::is_fixed_hex,
};

/// Trust outcome of a quote.
///
/// Each vendor code has its own variant. Only `Verified` means the quote was accepted
/// without findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    NeedsConfig,
    OutOfDate,
    OutOfDateNeedsConfig,
    SwHardeningNeeded,
    ConfigAndSwHardeningNeeded,
    InvalidSignature,
    Revoked,
    Unspecified,
    ParseError,
    EndpointUnreachable,
}

impl VerificationStatus {
    /// Returns true for statuses that describe a failure to obtain or read the quote,
    /// as opposed to a trust finding about a quote that was read.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            VerificationStatus::ParseError | VerificationStatus::EndpointUnreachable
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::NeedsConfig => "needs_config",
            VerificationStatus::OutOfDate => "out_of_date",
            VerificationStatus::OutOfDateNeedsConfig => "out_of_date_needs_config",
            VerificationStatus::SwHardeningNeeded => "sw_hardening_needed",
            VerificationStatus::ConfigAndSwHardeningNeeded => "config_and_sw_hardening_needed",
            VerificationStatus::InvalidSignature => "invalid_signature",
            VerificationStatus::Revoked => "revoked",
            VerificationStatus::Unspecified => "unspecified",
            VerificationStatus::ParseError => "parse_error",
            VerificationStatus::EndpointUnreachable => "endpoint_unreachable",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<QvResult> for VerificationStatus {
    fn from(result: QvResult) -> Self {
        match result {
            QvResult::Ok => VerificationStatus::Verified,
            QvResult::ConfigNeeded => VerificationStatus::NeedsConfig,
            QvResult::OutOfDate => VerificationStatus::OutOfDate,
            QvResult::OutOfDateConfigNeeded => VerificationStatus::OutOfDateNeedsConfig,
            QvResult::SwHardeningNeeded => VerificationStatus::SwHardeningNeeded,
            QvResult::ConfigAndSwHardeningNeeded => VerificationStatus::ConfigAndSwHardeningNeeded,
            QvResult::InvalidSignature => VerificationStatus::InvalidSignature,
            QvResult::Revoked => VerificationStatus::Revoked,
            QvResult::Unspecified => VerificationStatus::Unspecified,
        }
    }
}

/// Quote layout detected from the quote header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteVersion {
    /// Version 4, TD 1.0 report body directly after the header
    V4,
    /// Version 5 carrying a TD 1.0 report body
    V5Td10,
    /// Version 5 carrying a TD 1.5 report body
    V5Td15,
}

/// Identity of an attested machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetId {
    /// The front-end VM running this service
    SelfVm,
    /// The inference VM
    RemoteVm,
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetId::SelfVm => f.write_str("self_vm"),
            TargetId::RemoteVm => f.write_str("remote_vm"),
        }
    }
}

/// A quote as served by an attestation endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedQuote {
    /// The quote, lowercase hex
    pub quote_hex: String,
    /// SHA-256 of the DER certificate of the connection that served the quote, lowercase hex
    pub certificate_fingerprint: String,
}

/// Verdict of the vendor verification routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteVerdict {
    pub status: VerificationStatus,
    pub collateral_expired: bool,
}

/// One verified (or failed) quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRecord {
    /// MRTD, 96 lowercase hex chars or an error sentinel
    pub measurement_boot: String,
    /// RTMR0..RTMR3 in register order
    pub measurement_runtime: [String; RTMR_COUNT],
    /// REPORTDATA, 128 lowercase hex chars or an error sentinel
    pub report_data: String,
    pub certificate_fingerprint: String,
    pub verification_status: VerificationStatus,
    #[serde(default)]
    pub collateral_expired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_version: Option<QuoteVersion>,
    /// Raw quote, lowercase hex
    pub raw_quote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AttestationRecord {
    /// Builds a record for a quote that could not be fetched or read.
    ///
    /// Every measurement field carries the `error:<status>` sentinel.
    pub fn error_record(
        status: VerificationStatus,
        message: impl Into<String>,
        raw_quote: impl Into<String>,
        certificate_fingerprint: impl Into<String>,
    ) -> Self {
        let sentinel = format!("{ERROR_SENTINEL_PREFIX}{status}");
        Self {
            measurement_boot: sentinel.clone(),
            measurement_runtime: std::array::from_fn(|_| sentinel.clone()),
            report_data: sentinel,
            certificate_fingerprint: certificate_fingerprint.into(),
            verification_status: status,
            collateral_expired: false,
            quote_version: None,
            raw_quote: raw_quote.into(),
            error: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    /// Sets the fingerprint of the channel the quote was retrieved over.
    pub fn with_certificate_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.certificate_fingerprint = fingerprint.into();
        self
    }

    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }

    /// Checks that every measurement field has its exact hex length.
    pub fn has_well_formed_measurements(&self) -> bool {
        is_fixed_hex(&self.measurement_boot, MEASUREMENT_HEX_LEN)
            && self
                .measurement_runtime
                .iter()
                .all(|rtmr| is_fixed_hex(rtmr, MEASUREMENT_HEX_LEN))
            && is_fixed_hex(&self.report_data, REPORT_DATA_HEX_LEN)
    }

    /// Checks that every measurement field carries this record's error sentinel.
    pub fn has_error_sentinels(&self) -> bool {
        let sentinel = format!("{ERROR_SENTINEL_PREFIX}{}", self.verification_status);
        self.measurement_boot == sentinel
            && self.measurement_runtime.iter().all(|rtmr| *rtmr == sentinel)
            && self.report_data == sentinel
    }

    /// Compares the measurements with a set of expected values.
    ///
    /// Fields left as `None` in `expected` are not compared.
    pub fn matches_baseline(&self, expected: &ExpectedMeasurements) -> bool {
        let eq = |actual: &str, expected: &Option<String>| {
            expected
                .as_deref()
                .map_or(true, |e| e.eq_ignore_ascii_case(actual))
        };
        eq(&self.measurement_boot, &expected.measurement_boot)
            && self
                .measurement_runtime
                .iter()
                .zip(expected.measurement_runtime.iter())
                .all(|(actual, expected)| eq(actual, expected))
            && eq(&self.report_data, &expected.report_data)
    }
}

/// Reference measurement values for a VM image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedMeasurements {
    #[serde(default)]
    pub measurement_boot: Option<String>,
    #[serde(default)]
    pub measurement_runtime: [Option<String>; RTMR_COUNT],
    #[serde(default)]
    pub report_data: Option<String>,
}

/// Attestations of both VMs taken for the same request.
///
/// `dual_attestation` is derived at construction and the value is never changed
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualAttestationResult {
    self_vm: AttestationRecord,
    remote_vm: AttestationRecord,
    dual_attestation: bool,
    timestamp: DateTime<Utc>,
}

impl DualAttestationResult {
    pub fn new(self_vm: AttestationRecord, remote_vm: AttestationRecord) -> Self {
        let dual_attestation = self_vm.is_verified() && remote_vm.is_verified();
        Self {
            self_vm,
            remote_vm,
            dual_attestation,
            timestamp: Utc::now(),
        }
    }

    pub fn self_vm(&self) -> &AttestationRecord {
        &self.self_vm
    }

    pub fn remote_vm(&self) -> &AttestationRecord {
        &self.remote_vm
    }

    pub fn dual_attestation(&self) -> bool {
        self.dual_attestation
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns false if a deserialized value claims a dual attestation its
    /// records do not support.
    pub fn is_consistent(&self) -> bool {
        self.dual_attestation == (self.self_vm.is_verified() && self.remote_vm.is_verified())
    }
}

/// Attestation summary returned by `GET /attestation/self` and `GET /attestation/secret-ai`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationView {
    pub measurement_boot: String,
    pub measurement_runtime: [String; RTMR_COUNT],
    pub report_data: String,
    pub certificate_fingerprint: String,
    pub verification_status: VerificationStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationResponse {
    pub success: bool,
    pub attestation: AttestationView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&AttestationRecord> for AttestationResponse {
    fn from(record: &AttestationRecord) -> Self {
        Self {
            success: !record.verification_status.is_error(),
            attestation: AttestationView {
                measurement_boot: record.measurement_boot.clone(),
                measurement_runtime: record.measurement_runtime.clone(),
                report_data: record.report_data.clone(),
                certificate_fingerprint: record.certificate_fingerprint.clone(),
                verification_status: record.verification_status,
                timestamp: record.timestamp,
            },
            error: record.error.clone(),
        }
    }
}
