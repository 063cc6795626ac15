use std::{path::Path, ptr};

use libloading::{Library, Symbol};
use tracing::{debug, instrument, warn};

use crate::{
    error::{check_rc, QvlError, Result},
    types::{
        QuoteVerification, QvResult, SgxQlQvResult, TdxQvGetSupplementalDataSize,
        TdxQvVerifyQuote, COLLATERAL_EXPIRED_BIT, MAX_QUOTE_SIZE,
    },
};

/// Default shared object name of the DCAP quote verification library
pub const DEFAULT_QVL_LIBRARY: &str = "libsgx_dcap_quoteverify.so.1";

const VERIFY_QUOTE_SYMBOL: &[u8] = b"tdx_qv_verify_quote\0";
const SUPPLEMENTAL_DATA_SIZE_SYMBOL: &[u8] = b"tdx_qv_get_quote_supplemental_data_size\0";

/// Resolves a library name against `LD_LIBRARY_PATH`.
///
/// Names containing a path separator are returned unchanged. Bare names that are not
/// found in `LD_LIBRARY_PATH` are also returned unchanged so the dynamic loader can
/// apply its own search order.
fn find_library(name: &str) -> String {
    if name.contains('/') {
        return name.to_string();
    }
    let paths = std::env::var("LD_LIBRARY_PATH").unwrap_or_default();
    for path in paths.split(':').filter(|p| !p.is_empty()) {
        let lib_path = format!("{path}/{name}");
        if Path::new(&lib_path).exists() {
            return lib_path;
        }
    }
    name.to_string()
}

/// A loaded DCAP quote verification library.
///
/// The resolved function pointers stay valid for as long as `_library` is alive,
/// which is the lifetime of this value.
pub struct QuoteVerificationLibrary {
    _library: Library,
    verify_quote: TdxQvVerifyQuote,
    supplemental_data_size: Option<TdxQvGetSupplementalDataSize>,
}

impl QuoteVerificationLibrary {
    /// Loads the library and resolves the TDX verification entry points.
    ///
    /// # Errors
    ///
    /// * `QvlError::UnsupportedPlatform` - if not running on Linux
    /// * `QvlError::LibraryLoadError` - if the library or `tdx_qv_verify_quote` cannot be found
    #[instrument(level = "debug", name = "qvl_open")]
    pub fn open(name: &str) -> Result<Self> {
        if !cfg!(target_os = "linux") {
            return Err(QvlError::UnsupportedPlatform);
        }
        let path = find_library(name);
        debug!(level = "tdx_qvl", "Loading quote verification library from {path}");
        // Safety: the DCAP library is a C library with no initialisation routines
        // that depend on Rust state, and the symbols below are declared with the
        // signatures from `sgx_dcap_quoteverify.h`.
        unsafe {
            let library = Library::new(&path)?;
            let verify_quote = {
                let symbol: Symbol<TdxQvVerifyQuote> = library.get(VERIFY_QUOTE_SYMBOL)?;
                *symbol
            };
            let supplemental_data_size =
                match library.get::<TdxQvGetSupplementalDataSize>(SUPPLEMENTAL_DATA_SIZE_SYMBOL) {
                    Ok(symbol) => Some(*symbol),
                    Err(e) => {
                        warn!(
                            level = "tdx_qvl",
                            "Library does not export the supplemental data size query: {e}"
                        );
                        None
                    }
                };
            Ok(Self {
                _library: library,
                verify_quote,
                supplemental_data_size,
            })
        }
    }

    /// Size in bytes of the supplemental data the library produces, 0 if unavailable.
    pub fn supplemental_data_size(&self) -> u32 {
        let Some(get_size) = self.supplemental_data_size else {
            return 0;
        };
        let mut size = 0u32;
        // Safety: `size` is a valid, writable u32.
        let rc = unsafe { get_size(&mut size) };
        match check_rc(rc) {
            Ok(()) => size,
            Err(_) => 0,
        }
    }

    /// Verifies a TDX quote with collateral fetched by the library itself.
    ///
    /// # Arguments
    ///
    /// * `quote` - The raw quote bytes
    /// * `expiration_check_date` - Unix time used to check collateral expiration
    ///
    /// # Returns
    ///
    /// The verification result code together with the collateral expiration flag.
    ///
    /// # Errors
    ///
    /// * `QvlError::QuoteTooLarge` - if the quote size does not fit a `u32`
    /// * `QvlError::CallFailed` - if the library call itself fails
    /// * `QvlError::UnknownResult` - if the library reports a result code not known here
    #[instrument(level = "debug", name = "tdx_qv_verify_quote", skip(self, quote), fields(quote_len = quote.len()))]
    pub fn verify_quote(
        &self,
        quote: &[u8],
        expiration_check_date: i64,
    ) -> Result<QuoteVerification> {
        if quote.len() > MAX_QUOTE_SIZE {
            return Err(QvlError::QuoteTooLarge(quote.len()));
        }
        let mut supplemental_data = vec![0u8; self.supplemental_data_size() as usize];
        let mut collateral_expiration_status = 0u32;
        let mut verification_result: SgxQlQvResult = QvResult::Unspecified as SgxQlQvResult;
        // Safety: all pointers reference live buffers of the advertised sizes and the
        // library does not retain them after returning.
        let rc = unsafe {
            (self.verify_quote)(
                quote.as_ptr(),
                quote.len() as u32,
                ptr::null(),
                expiration_check_date,
                &mut collateral_expiration_status,
                &mut verification_result,
                ptr::null_mut(),
                supplemental_data.len() as u32,
                if supplemental_data.is_empty() {
                    ptr::null_mut()
                } else {
                    supplemental_data.as_mut_ptr()
                },
            )
        };
        check_rc(rc)?;
        let result = QvResult::try_from(verification_result)?;
        let collateral_expired = collateral_expiration_status & COLLATERAL_EXPIRED_BIT != 0;
        if collateral_expired {
            warn!(level = "tdx_qvl", "Quote verification reports expired collateral");
        }
        debug!(level = "tdx_qvl", "Quote verification result: {result:?}");
        Ok(QuoteVerification {
            result,
            collateral_expired,
            supplemental_data,
        })
    }
}

impl std::fmt::Debug for QuoteVerificationLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteVerificationLibrary")
            .field("supplemental_data", &self.supplemental_data_size.is_some())
            .finish()
    }
}
