use thiserror::Error;

use crate::types::Quote3Error;

pub type Result<T> = std::result::Result<T, QvlError>;

#[derive(Debug, Error)]
pub enum QvlError {
    #[error("Failed to load quote verification library: {0}")]
    LibraryLoadError(#[from] libloading::Error),
    #[error("Unsupported platform")]
    UnsupportedPlatform,
    #[error("Quote verification call failed with code {code:#06x}")]
    CallFailed { code: Quote3Error },
    #[error("Unknown quote verification result code: {0:#06x}")]
    UnknownResult(u32),
    #[error("Quote of {0} bytes exceeds the library size limit")]
    QuoteTooLarge(usize),
}

/// Error codes for DCAP library calls.
#[must_use]
pub const fn quote3_error_to_str(rc: Quote3Error) -> &'static str {
    match rc {
        0x0000 => "SGX_QL_SUCCESS",
        0xE001 => "SGX_QL_ERROR_UNEXPECTED",
        0xE002 => "SGX_QL_ERROR_INVALID_PARAMETER",
        0xE003 => "SGX_QL_ERROR_OUT_OF_MEMORY",
        _ => "Unknown error code",
    }
}

/// Checks a `quote3_error_t` return code.
#[inline(always)]
pub(crate) fn check_rc(rc: Quote3Error) -> Result<()> {
    if rc == crate::types::SGX_QL_SUCCESS {
        Ok(())
    } else {
        tracing::warn!(
            level = "tdx_qvl",
            "DCAP library call returned {:#06x} ({})",
            rc,
            quote3_error_to_str(rc)
        );
        Err(QvlError::CallFailed { code: rc })
    }
}
