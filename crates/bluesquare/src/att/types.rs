//! PDU definitions for the subset of ATT the server core answers
use super::constants::*;
use super::error::{AttError, AttErrorCode, AttResult};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// ATT packet formats
pub trait AttPacket: Sized {
    /// Opcode for this packet
    fn opcode() -> u8;

    /// Parse packet from bytes, opcode included
    fn parse(data: &[u8]) -> AttResult<Self>;

    /// Serialize packet to bytes
    fn serialize(&self) -> Vec<u8>;
}

/// Reads the 16-bit little-endian field that follows the opcode.
fn read_handle(data: &[u8], opcode: u8) -> AttResult<u16> {
    if data.first() != Some(&opcode) {
        return Err(AttError::InvalidPdu(opcode));
    }
    let mut cursor = Cursor::new(&data[1..]);
    cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| AttError::InvalidPdu(opcode))
}

/// Error response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Request opcode in error
    pub request_opcode: u8,
    /// Attribute handle in error
    pub handle: u16,
    /// Error code
    pub error_code: AttErrorCode,
}

impl ErrorResponse {
    pub fn new(request_opcode: u8, handle: u16, error_code: AttErrorCode) -> Self {
        Self {
            request_opcode,
            handle,
            error_code,
        }
    }

    /// Builds the reply for a PDU that could not be decoded.
    pub fn from_decode_error(error: &AttError) -> Self {
        Self::new(error.request_opcode(), 0, error.to_error_code())
    }
}

impl AttPacket for ErrorResponse {
    fn opcode() -> u8 {
        ATT_ERROR_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 5 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu(Self::opcode()));
        }

        let mut cursor = Cursor::new(&data[2..4]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu(Self::opcode()))?;

        Ok(Self {
            request_opcode: data[1],
            handle,
            error_code: data[4].into(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5);
        packet.push(Self::opcode());
        packet.push(self.request_opcode);
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.push(self.error_code.into());
        packet
    }
}

/// Exchange MTU Request packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeMtuRequest {
    /// Client Rx MTU size
    pub client_mtu: u16,
}

impl AttPacket for ExchangeMtuRequest {
    fn opcode() -> u8 {
        ATT_EXCHANGE_MTU_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        let client_mtu = read_handle(data, Self::opcode())?;
        Ok(Self { client_mtu })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.client_mtu.to_le_bytes());
        packet
    }
}

/// Exchange MTU Response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeMtuResponse {
    /// Server Rx MTU size
    pub server_mtu: u16,
}

impl AttPacket for ExchangeMtuResponse {
    fn opcode() -> u8 {
        ATT_EXCHANGE_MTU_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        let server_mtu = read_handle(data, Self::opcode())?;
        Ok(Self { server_mtu })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.server_mtu.to_le_bytes());
        packet
    }
}

/// Read Request packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    /// Handle to read
    pub handle: u16,
}

impl AttPacket for ReadRequest {
    fn opcode() -> u8 {
        ATT_READ_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        let handle = read_handle(data, Self::opcode())?;
        Ok(Self { handle })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet
    }
}

/// Read Response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    /// Attribute value
    pub value: Vec<u8>,
}

impl AttPacket for ReadResponse {
    fn opcode() -> u8 {
        ATT_READ_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.first() != Some(&Self::opcode()) {
            return Err(AttError::InvalidPdu(Self::opcode()));
        }
        Ok(Self {
            value: data[1..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Read Blob Request packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBlobRequest {
    /// Handle to read
    pub handle: u16,
    /// Offset to start reading from
    pub offset: u16,
}

impl AttPacket for ReadBlobRequest {
    fn opcode() -> u8 {
        ATT_READ_BLOB_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.len() < 5 || data[0] != Self::opcode() {
            return Err(AttError::InvalidPdu(Self::opcode()));
        }

        let mut cursor = Cursor::new(&data[1..]);
        let handle = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu(Self::opcode()))?;
        let offset = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| AttError::InvalidPdu(Self::opcode()))?;

        Ok(Self { handle, offset })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5);
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.offset.to_le_bytes());
        packet
    }
}

/// Read Blob Response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBlobResponse {
    /// Attribute value part
    pub value: Vec<u8>,
}

impl AttPacket for ReadBlobResponse {
    fn opcode() -> u8 {
        ATT_READ_BLOB_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.first() != Some(&Self::opcode()) {
            return Err(AttError::InvalidPdu(Self::opcode()));
        }
        Ok(Self {
            value: data[1..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Write Request packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    /// Handle to write
    pub handle: u16,
    /// Value to write
    pub value: Vec<u8>,
}

impl AttPacket for WriteRequest {
    fn opcode() -> u8 {
        ATT_WRITE_REQ
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        let handle = read_handle(data, Self::opcode())?;
        Ok(Self {
            handle,
            value: data[3..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3 + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Write Response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResponse;

impl AttPacket for WriteResponse {
    fn opcode() -> u8 {
        ATT_WRITE_RSP
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        if data.first() != Some(&Self::opcode()) {
            return Err(AttError::InvalidPdu(Self::opcode()));
        }
        Ok(Self)
    }

    fn serialize(&self) -> Vec<u8> {
        vec![Self::opcode()]
    }
}

/// Write Command packet (write without response)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCommand {
    /// Handle to write
    pub handle: u16,
    /// Value to write
    pub value: Vec<u8>,
}

impl AttPacket for WriteCommand {
    fn opcode() -> u8 {
        ATT_WRITE_CMD
    }

    fn parse(data: &[u8]) -> AttResult<Self> {
        let handle = read_handle(data, Self::opcode())?;
        Ok(Self {
            handle,
            value: data[3..].to_vec(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(3 + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}
