//! Error handling for the ATT protocol
use super::constants::*;
use thiserror::Error;

/// ATT error codes as carried in an Error Response PDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttErrorCode {
    /// Invalid handle
    InvalidHandle,
    /// Read not permitted
    ReadNotPermitted,
    /// Write not permitted
    WriteNotPermitted,
    /// Invalid PDU
    InvalidPdu,
    /// Request not supported
    RequestNotSupported,
    /// Offset past the end of the value
    InvalidOffset,
    /// Invalid attribute value length
    InvalidAttributeValueLength,
    /// Unlikely error
    Unlikely,
    /// Value not allowed
    ValueNotAllowed,
    /// Application error (0x80..=0x9F)
    ApplicationError(u8),
    /// Anything else
    Unknown(u8),
}

impl From<u8> for AttErrorCode {
    fn from(code: u8) -> Self {
        match code {
            ATT_ERROR_INVALID_HANDLE => AttErrorCode::InvalidHandle,
            ATT_ERROR_READ_NOT_PERMITTED => AttErrorCode::ReadNotPermitted,
            ATT_ERROR_WRITE_NOT_PERMITTED => AttErrorCode::WriteNotPermitted,
            ATT_ERROR_INVALID_PDU => AttErrorCode::InvalidPdu,
            ATT_ERROR_REQUEST_NOT_SUPPORTED => AttErrorCode::RequestNotSupported,
            ATT_ERROR_INVALID_OFFSET => AttErrorCode::InvalidOffset,
            ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH => AttErrorCode::InvalidAttributeValueLength,
            ATT_ERROR_UNLIKELY => AttErrorCode::Unlikely,
            ATT_ERROR_VALUE_NOT_ALLOWED => AttErrorCode::ValueNotAllowed,
            c if (ATT_ERROR_APPLICATION_ERROR_START..=ATT_ERROR_APPLICATION_ERROR_END)
                .contains(&c) =>
            {
                AttErrorCode::ApplicationError(c)
            }
            _ => AttErrorCode::Unknown(code),
        }
    }
}

impl From<AttErrorCode> for u8 {
    fn from(code: AttErrorCode) -> u8 {
        match code {
            AttErrorCode::InvalidHandle => ATT_ERROR_INVALID_HANDLE,
            AttErrorCode::ReadNotPermitted => ATT_ERROR_READ_NOT_PERMITTED,
            AttErrorCode::WriteNotPermitted => ATT_ERROR_WRITE_NOT_PERMITTED,
            AttErrorCode::InvalidPdu => ATT_ERROR_INVALID_PDU,
            AttErrorCode::RequestNotSupported => ATT_ERROR_REQUEST_NOT_SUPPORTED,
            AttErrorCode::InvalidOffset => ATT_ERROR_INVALID_OFFSET,
            AttErrorCode::InvalidAttributeValueLength => ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH,
            AttErrorCode::Unlikely => ATT_ERROR_UNLIKELY,
            AttErrorCode::ValueNotAllowed => ATT_ERROR_VALUE_NOT_ALLOWED,
            AttErrorCode::ApplicationError(code) => code,
            AttErrorCode::Unknown(code) => code,
        }
    }
}

/// Errors raised while decoding ATT PDUs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttError {
    #[error("empty PDU")]
    EmptyPdu,

    #[error("malformed PDU for opcode 0x{0:02x}")]
    InvalidPdu(u8),

    #[error("request not supported: opcode 0x{0:02x}")]
    RequestNotSupported(u8),
}

impl AttError {
    /// Convert to ATT error code
    pub fn to_error_code(&self) -> AttErrorCode {
        match self {
            AttError::EmptyPdu | AttError::InvalidPdu(_) => AttErrorCode::InvalidPdu,
            AttError::RequestNotSupported(_) => AttErrorCode::RequestNotSupported,
        }
    }

    /// Opcode of the offending PDU, zero when the PDU was empty
    pub fn request_opcode(&self) -> u8 {
        match self {
            AttError::EmptyPdu => 0,
            AttError::InvalidPdu(opcode) | AttError::RequestNotSupported(opcode) => *opcode,
        }
    }
}

/// ATT Result type
pub type AttResult<T> = Result<T, AttError>;
