//! Attribute Protocol (ATT) wire layer
//!
//! The GATT core never sees raw bytes. Transports decode inbound PDUs with
//! [`decode_pdu`] once, hand the typed request to the dispatcher, and encode
//! whatever comes back with [`Response::to_pdu`](crate::gatt::Response::to_pdu).

pub mod codec;
pub mod constants;
pub mod error;
pub mod types;

pub use self::codec::{decode_pdu, is_command, InboundPdu};
pub use self::constants::*;
pub use self::error::{AttError, AttErrorCode, AttResult};
pub use self::types::*;
