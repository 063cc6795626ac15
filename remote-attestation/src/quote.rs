//! TDX quote layout parsing.
//!
//! Only the fields needed to build an attestation record are decoded. Signature
//! data after the report body is left to the vendor verification library.

use crate::{
    constants::{quote_layout::*, MEASUREMENT_SIZE, REPORT_DATA_SIZE, RTMR_COUNT},
    errors::QuoteParseError,
    types::QuoteVersion,
};

type ParseResult<T> = std::result::Result<T, QuoteParseError>;

fn slice(data: &[u8], offset: usize, len: usize) -> ParseResult<&[u8]> {
    let end = offset + len;
    data.get(offset..end).ok_or(QuoteParseError::Truncated {
        needed: end,
        actual: data.len(),
    })
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> ParseResult<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(slice(data, offset, N)?);
    Ok(out)
}

fn read_u16_le(data: &[u8], offset: usize) -> ParseResult<u16> {
    read_array::<2>(data, offset).map(u16::from_le_bytes)
}

fn read_u32_le(data: &[u8], offset: usize) -> ParseResult<u32> {
    read_array::<4>(data, offset).map(u32::from_le_bytes)
}

/// The 48-byte quote header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteHeader {
    pub version: u16,
    pub attestation_key_type: u16,
    pub tee_type: u32,
    pub qe_vendor_id: [u8; HEADER_QE_VENDOR_ID_SIZE],
}

impl QuoteHeader {
    pub fn parse(quote: &[u8]) -> ParseResult<Self> {
        slice(quote, 0, HEADER_SIZE)?;
        Ok(Self {
            version: read_u16_le(quote, HEADER_VERSION_OFFSET)?,
            attestation_key_type: read_u16_le(quote, HEADER_ATTESTATION_KEY_TYPE_OFFSET)?,
            tee_type: read_u32_le(quote, HEADER_TEE_TYPE_OFFSET)?,
            qe_vendor_id: read_array(quote, HEADER_QE_VENDOR_ID_OFFSET)?,
        })
    }
}

/// Locates the TD report body of a quote from its header.
///
/// # Returns
///
/// The detected layout and the body bytes, exactly as long as the layout requires.
///
/// # Errors
///
/// * `QuoteParseError::UnsupportedTeeType` - for SGX or any non-TDX quote
/// * `QuoteParseError::UnsupportedVersion` - for versions other than 4 and 5
/// * `QuoteParseError::UnsupportedBodyType` - for v5 body types other than TD 1.0 and TD 1.5
/// * `QuoteParseError::BodySizeMismatch` - if the v5 descriptor size disagrees with the body type
/// * `QuoteParseError::Truncated` - if the body extends beyond the buffer
pub fn locate_report_body(quote: &[u8]) -> ParseResult<(QuoteVersion, &[u8])> {
    let header = QuoteHeader::parse(quote)?;
    if header.tee_type != TEE_TYPE_TDX {
        return Err(QuoteParseError::UnsupportedTeeType(header.tee_type));
    }
    match header.version {
        4 => Ok((
            QuoteVersion::V4,
            slice(quote, HEADER_SIZE, TD10_REPORT_BODY_SIZE)?,
        )),
        5 => {
            let body_type = read_u16_le(quote, HEADER_SIZE)?;
            let declared = read_u32_le(quote, HEADER_SIZE + 2)?;
            let (version, expected) = match body_type {
                V5_BODY_TYPE_TD10 => (QuoteVersion::V5Td10, TD10_REPORT_BODY_SIZE),
                V5_BODY_TYPE_TD15 => (QuoteVersion::V5Td15, TD15_REPORT_BODY_SIZE),
                other => return Err(QuoteParseError::UnsupportedBodyType(other)),
            };
            if declared as usize != expected {
                return Err(QuoteParseError::BodySizeMismatch { declared, expected });
            }
            let offset = HEADER_SIZE + V5_BODY_DESCRIPTOR_SIZE;
            Ok((version, slice(quote, offset, expected)?))
        }
        other => Err(QuoteParseError::UnsupportedVersion(other)),
    }
}

/// Fields of a TD report body.
///
/// TD 1.5 bodies share the TD 1.0 prefix, so the same offsets apply to both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportBody {
    pub tee_tcb_svn: [u8; 16],
    pub mr_seam: [u8; MEASUREMENT_SIZE],
    pub td_attributes: [u8; 8],
    pub xfam: [u8; 8],
    pub mr_td: [u8; MEASUREMENT_SIZE],
    pub mr_config_id: [u8; MEASUREMENT_SIZE],
    pub mr_owner: [u8; MEASUREMENT_SIZE],
    pub mr_owner_config: [u8; MEASUREMENT_SIZE],
    pub rtmr: [[u8; MEASUREMENT_SIZE]; RTMR_COUNT],
    pub report_data: [u8; REPORT_DATA_SIZE],
}

impl ReportBody {
    pub fn parse(body: &[u8]) -> ParseResult<Self> {
        let mut rtmr = [[0u8; MEASUREMENT_SIZE]; RTMR_COUNT];
        for (i, register) in rtmr.iter_mut().enumerate() {
            *register = read_array(body, BODY_RTMR0_OFFSET + i * MEASUREMENT_SIZE)?;
        }
        Ok(Self {
            tee_tcb_svn: read_array(body, BODY_TEE_TCB_SVN_OFFSET)?,
            mr_seam: read_array(body, BODY_MRSEAM_OFFSET)?,
            td_attributes: read_array(body, BODY_TD_ATTRIBUTES_OFFSET)?,
            xfam: read_array(body, BODY_XFAM_OFFSET)?,
            mr_td: read_array(body, BODY_MRTD_OFFSET)?,
            mr_config_id: read_array(body, BODY_MRCONFIGID_OFFSET)?,
            mr_owner: read_array(body, BODY_MROWNER_OFFSET)?,
            mr_owner_config: read_array(body, BODY_MROWNERCONFIG_OFFSET)?,
            rtmr,
            report_data: read_array(body, BODY_REPORT_DATA_OFFSET)?,
        })
    }
}

/// A quote with its report body decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuote {
    pub header: QuoteHeader,
    pub version: QuoteVersion,
    pub body: ReportBody,
}

pub fn parse_quote(quote: &[u8]) -> ParseResult<ParsedQuote> {
    let header = QuoteHeader::parse(quote)?;
    let (version, body) = locate_report_body(quote)?;
    Ok(ParsedQuote {
        header,
        version,
        body: ReportBody::parse(body)?,
    })
}
