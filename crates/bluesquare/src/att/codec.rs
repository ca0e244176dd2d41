//! Decoding of inbound ATT PDUs into typed requests

use super::constants::*;
use super::error::{AttError, AttResult};
use super::types::{
    AttPacket, ExchangeMtuRequest, ReadBlobRequest, ReadRequest, WriteCommand, WriteRequest,
};
use crate::gatt::request::Request;

/// A PDU the server core knows how to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPdu {
    /// Read or write, handed to the dispatcher
    Request(Request),
    /// MTU negotiation, answered by the transport itself
    ExchangeMtu { client_mtu: u16 },
}

/// Whether a PDU with this opcode is a command, which never gets a reply
pub fn is_command(opcode: u8) -> bool {
    opcode & ATT_COMMAND_FLAG != 0
}

/// Decode one complete PDU, opcode included.
pub fn decode_pdu(data: &[u8]) -> AttResult<InboundPdu> {
    let opcode = *data.first().ok_or(AttError::EmptyPdu)?;

    let pdu = match opcode {
        ATT_EXCHANGE_MTU_REQ => InboundPdu::ExchangeMtu {
            client_mtu: ExchangeMtuRequest::parse(data)?.client_mtu,
        },
        ATT_READ_REQ => {
            let request = ReadRequest::parse(data)?;
            InboundPdu::Request(Request::read(request.handle))
        }
        ATT_READ_BLOB_REQ => {
            let request = ReadBlobRequest::parse(data)?;
            InboundPdu::Request(Request::read_blob(request.handle, request.offset))
        }
        ATT_WRITE_REQ => {
            let request = WriteRequest::parse(data)?;
            InboundPdu::Request(Request::write(request.handle, request.value))
        }
        ATT_WRITE_CMD => {
            let command = WriteCommand::parse(data)?;
            InboundPdu::Request(Request::write_without_response(
                command.handle,
                command.value,
            ))
        }
        _ => return Err(AttError::RequestNotSupported(opcode)),
    };

    Ok(pdu)
}
