//! Typed requests and responses exchanged with a transport

use super::error::GattError;
use super::types::{Handle, WriteKind};
use crate::att::constants::{
    ATT_DEFAULT_MTU, ATT_READ_BLOB_REQ, ATT_READ_REQ, ATT_WRITE_CMD, ATT_WRITE_REQ,
};
use crate::att::types::{AttPacket, ErrorResponse, ReadBlobResponse, ReadResponse, WriteResponse};

/// An inbound attribute request, decoded once at the transport boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Read {
        handle: Handle,
    },
    /// Continuation of a read past what fit in the first response
    ReadBlob {
        handle: Handle,
        offset: u16,
    },
    Write {
        handle: Handle,
        value: Vec<u8>,
        kind: WriteKind,
    },
}

impl Request {
    pub fn read(handle: Handle) -> Self {
        Request::Read { handle }
    }

    pub fn read_blob(handle: Handle, offset: u16) -> Self {
        Request::ReadBlob { handle, offset }
    }

    pub fn write(handle: Handle, value: impl Into<Vec<u8>>) -> Self {
        Request::Write {
            handle,
            value: value.into(),
            kind: WriteKind::WithResponse,
        }
    }

    pub fn write_without_response(handle: Handle, value: impl Into<Vec<u8>>) -> Self {
        Request::Write {
            handle,
            value: value.into(),
            kind: WriteKind::WithoutResponse,
        }
    }

    pub fn handle(&self) -> Handle {
        match self {
            Request::Read { handle }
            | Request::ReadBlob { handle, .. }
            | Request::Write { handle, .. } => *handle,
        }
    }

    /// Whether the peer waits for an answer to this request
    pub fn expects_response(&self) -> bool {
        !matches!(
            self,
            Request::Write {
                kind: WriteKind::WithoutResponse,
                ..
            }
        )
    }

    /// ATT opcode this request travels as
    pub fn opcode(&self) -> u8 {
        match self {
            Request::Read { .. } => ATT_READ_REQ,
            Request::ReadBlob { .. } => ATT_READ_BLOB_REQ,
            Request::Write {
                kind: WriteKind::WithResponse,
                ..
            } => ATT_WRITE_REQ,
            Request::Write {
                kind: WriteKind::WithoutResponse,
                ..
            } => ATT_WRITE_CMD,
        }
    }
}

/// Outcome of a request that expects an answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Successful read
    Value { handle: Handle, value: Vec<u8> },
    /// Successful blob read, holding the value from the requested offset on
    Blob { handle: Handle, value: Vec<u8> },
    /// Successful write with response
    WriteAck { handle: Handle },
    /// Typed failure
    Error {
        request_opcode: u8,
        handle: Handle,
        error: GattError,
    },
}

impl Response {
    pub fn error(request: &Request, error: GattError) -> Self {
        Response::Error {
            request_opcode: request.opcode(),
            handle: request.handle(),
            error,
        }
    }

    pub fn handle(&self) -> Handle {
        match self {
            Response::Value { handle, .. }
            | Response::Blob { handle, .. }
            | Response::WriteAck { handle }
            | Response::Error { handle, .. } => *handle,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Encode as an ATT PDU for a link with the given MTU.
    ///
    /// Read values longer than `mtu - 1` are truncated. The peer fetches the
    /// rest with [`Request::ReadBlob`] from the offset it has received so far.
    pub fn to_pdu(&self, mtu: u16) -> Vec<u8> {
        let max_len = usize::from(mtu.max(ATT_DEFAULT_MTU)) - 1;
        match self {
            Response::Value { value, .. } => ReadResponse {
                value: value[..value.len().min(max_len)].to_vec(),
            }
            .serialize(),
            Response::Blob { value, .. } => ReadBlobResponse {
                value: value[..value.len().min(max_len)].to_vec(),
            }
            .serialize(),
            Response::WriteAck { .. } => WriteResponse.serialize(),
            Response::Error {
                request_opcode,
                handle,
                error,
            } => ErrorResponse::new(*request_opcode, *handle, error.to_error_code()).serialize(),
        }
    }
}
