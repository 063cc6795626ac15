use crate::{quote3_error_to_str, QuoteVerificationLibrary, QvResult, QvlError};

#[test]
fn test_result_codes_map_to_distinct_variants() {
    let codes = [
        (0x0000, QvResult::Ok),
        (0xA001, QvResult::ConfigNeeded),
        (0xA002, QvResult::OutOfDate),
        (0xA003, QvResult::OutOfDateConfigNeeded),
        (0xA004, QvResult::InvalidSignature),
        (0xA005, QvResult::Revoked),
        (0xA006, QvResult::Unspecified),
        (0xA007, QvResult::SwHardeningNeeded),
        (0xA008, QvResult::ConfigAndSwHardeningNeeded),
    ];
    for (code, expected) in codes {
        let result = QvResult::try_from(code).expect("known result code");
        assert_eq!(result, expected);
        assert_eq!(result as u32, code);
    }
}

#[test]
fn test_unknown_result_code_is_an_error() {
    match QvResult::try_from(0xA0FF) {
        Err(QvlError::UnknownResult(code)) => assert_eq!(code, 0xA0FF),
        other => panic!("expected UnknownResult, got {other:?}"),
    }
}

#[test]
fn test_quote3_error_names() {
    assert_eq!(quote3_error_to_str(0), "SGX_QL_SUCCESS");
    assert_eq!(quote3_error_to_str(0xE002), "SGX_QL_ERROR_INVALID_PARAMETER");
    assert_eq!(quote3_error_to_str(0xBEEF), "Unknown error code");
}

#[test]
fn test_missing_library_fails_to_open() {
    let result = QuoteVerificationLibrary::open("/nonexistent/libsgx_dcap_quoteverify.so.1");
    assert!(matches!(
        result,
        Err(QvlError::LibraryLoadError(_)) | Err(QvlError::UnsupportedPlatform)
    ));
}
