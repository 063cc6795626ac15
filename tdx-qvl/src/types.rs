use std::ffi::c_void;

use crate::error::QvlError;

/// Return code of the DCAP library entry points (`quote3_error_t`)
pub type Quote3Error = u32;

/// Raw verification result written by the library (`sgx_ql_qv_result_t`)
pub type SgxQlQvResult = u32;

/// Successful return code for `quote3_error_t`
pub const SGX_QL_SUCCESS: Quote3Error = 0x0000;

/// Bit set in the collateral expiration status when any collateral has expired
pub const COLLATERAL_EXPIRED_BIT: u32 = 0x1;

/// Largest quote accepted across the FFI boundary, the library takes a `u32` size.
pub const MAX_QUOTE_SIZE: usize = u32::MAX as usize;

/// `tdx_qv_verify_quote`
///
/// Passing a null collateral pointer lets the library fetch collateral through the
/// platform quote provider library (PCCS).
pub type TdxQvVerifyQuote = unsafe extern "C" fn(
    p_quote: *const u8,
    quote_size: u32,
    p_quote_collateral: *const c_void,
    expiration_check_date: i64,
    p_collateral_expiration_status: *mut u32,
    p_quote_verification_result: *mut SgxQlQvResult,
    p_qve_report_info: *mut c_void,
    supplemental_data_size: u32,
    p_supplemental_data: *mut u8,
) -> Quote3Error;

/// `tdx_qv_get_quote_supplemental_data_size`
pub type TdxQvGetSupplementalDataSize = unsafe extern "C" fn(p_data_size: *mut u32) -> Quote3Error;

/// Quote verification result as reported by the DCAP library.
///
/// Every code is kept distinct, callers decide what each one means for trust.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QvResult {
    Ok = 0x0000,
    ConfigNeeded = 0xA001,
    OutOfDate = 0xA002,
    OutOfDateConfigNeeded = 0xA003,
    InvalidSignature = 0xA004,
    Revoked = 0xA005,
    Unspecified = 0xA006,
    SwHardeningNeeded = 0xA007,
    ConfigAndSwHardeningNeeded = 0xA008,
}

impl TryFrom<SgxQlQvResult> for QvResult {
    type Error = QvlError;

    fn try_from(value: SgxQlQvResult) -> std::result::Result<Self, Self::Error> {
        match value {
            0x0000 => Ok(QvResult::Ok),
            0xA001 => Ok(QvResult::ConfigNeeded),
            0xA002 => Ok(QvResult::OutOfDate),
            0xA003 => Ok(QvResult::OutOfDateConfigNeeded),
            0xA004 => Ok(QvResult::InvalidSignature),
            0xA005 => Ok(QvResult::Revoked),
            0xA006 => Ok(QvResult::Unspecified),
            0xA007 => Ok(QvResult::SwHardeningNeeded),
            0xA008 => Ok(QvResult::ConfigAndSwHardeningNeeded),
            _ => Err(QvlError::UnknownResult(value)),
        }
    }
}

/// Outcome of a single `tdx_qv_verify_quote` call
#[derive(Debug, Clone)]
pub struct QuoteVerification {
    /// Verification result code
    pub result: QvResult,
    /// Whether the library reported expired collateral
    pub collateral_expired: bool,
    /// Supplemental data blob, empty if the library does not export the size query
    pub supplemental_data: Vec<u8>,
}
