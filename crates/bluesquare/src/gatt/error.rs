//! Errors raised by the attribute table, the value store and the dispatcher
use super::types::Handle;
use crate::att::AttErrorCode;
use crate::att::constants::ATT_ERROR_SHUTTING_DOWN;
use thiserror::Error;

/// Failures of the GATT server core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GattError {
    #[error("no attribute with handle 0x{0:04x}")]
    NotFound(Handle),

    #[error("attribute table is sealed")]
    TableSealed,

    #[error("attribute table must be sealed first")]
    TableNotSealed,

    #[error("handle 0x{0:04x} cannot be a parent for this declaration")]
    InvalidParent(Handle),

    #[error("attribute 0x{0:04x} is not a characteristic")]
    NotACharacteristic(Handle),

    #[error("attribute handle space exhausted")]
    HandleSpaceExhausted,

    #[error("attribute 0x{0:04x} is not readable")]
    AttributeNotReadable(Handle),

    #[error("attribute 0x{0:04x} is not writable")]
    AttributeNotWritable(Handle),

    #[error("value of {len} bytes for 0x{handle:04x} exceeds maximum of {max}")]
    ValueTooLong { handle: Handle, len: usize, max: usize },

    #[error("offset {offset} is past the end of 0x{handle:04x}")]
    InvalidOffset { handle: Handle, offset: u16 },

    #[error("value for 0x{0:04x} rejected by its computed-value policy")]
    PolicyRejected(Handle),

    #[error("server is shutting down")]
    ShuttingDown,
}

impl GattError {
    /// Convert to the ATT error code sent to the peer
    pub fn to_error_code(&self) -> AttErrorCode {
        match self {
            GattError::NotFound(_) => AttErrorCode::InvalidHandle,
            GattError::AttributeNotReadable(_) => AttErrorCode::ReadNotPermitted,
            GattError::AttributeNotWritable(_) => AttErrorCode::WriteNotPermitted,
            GattError::ValueTooLong { .. } => AttErrorCode::InvalidAttributeValueLength,
            GattError::InvalidOffset { .. } => AttErrorCode::InvalidOffset,
            GattError::PolicyRejected(_) => AttErrorCode::ValueNotAllowed,
            GattError::ShuttingDown => AttErrorCode::ApplicationError(ATT_ERROR_SHUTTING_DOWN),
            GattError::TableSealed
            | GattError::TableNotSealed
            | GattError::InvalidParent(_)
            | GattError::NotACharacteristic(_)
            | GattError::HandleSpaceExhausted => AttErrorCode::Unlikely,
        }
    }
}

/// GATT Result type
pub type GattResult<T> = Result<T, GattError>;
