//! Bindings to the Intel DCAP quote verification library
//!
//! The library is loaded at runtime with `libloading`, so hosts without DCAP
//! installed can still build and run everything that does not verify quotes.

pub mod error;
pub mod functions;
#[cfg(test)]
mod tests;
pub mod types;

pub use error::{quote3_error_to_str, QvlError, Result};
pub use functions::{QuoteVerificationLibrary, DEFAULT_QVL_LIBRARY};
pub use types::{QuoteVerification, QvResult};
