//! ATT Protocol constants

// ATT opcode values served by the core
pub const ATT_ERROR_RSP: u8 = 0x01;
pub const ATT_EXCHANGE_MTU_REQ: u8 = 0x02;
pub const ATT_EXCHANGE_MTU_RSP: u8 = 0x03;
pub const ATT_READ_REQ: u8 = 0x0A;
pub const ATT_READ_RSP: u8 = 0x0B;
pub const ATT_READ_BLOB_REQ: u8 = 0x0C;
pub const ATT_READ_BLOB_RSP: u8 = 0x0D;
pub const ATT_WRITE_REQ: u8 = 0x12;
pub const ATT_WRITE_RSP: u8 = 0x13;
pub const ATT_WRITE_CMD: u8 = 0x52;

// Bit 6 of an opcode marks a command; commands never get a response
pub const ATT_COMMAND_FLAG: u8 = 0x40;

// ATT error codes
pub const ATT_ERROR_INVALID_HANDLE: u8 = 0x01;
pub const ATT_ERROR_READ_NOT_PERMITTED: u8 = 0x02;
pub const ATT_ERROR_WRITE_NOT_PERMITTED: u8 = 0x03;
pub const ATT_ERROR_INVALID_PDU: u8 = 0x04;
pub const ATT_ERROR_REQUEST_NOT_SUPPORTED: u8 = 0x06;
pub const ATT_ERROR_INVALID_OFFSET: u8 = 0x07;
pub const ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH: u8 = 0x0D;
pub const ATT_ERROR_UNLIKELY: u8 = 0x0E;
pub const ATT_ERROR_VALUE_NOT_ALLOWED: u8 = 0x13;
pub const ATT_ERROR_APPLICATION_ERROR_START: u8 = 0x80;
pub const ATT_ERROR_APPLICATION_ERROR_END: u8 = 0x9F;

/// Application error sent for requests that arrive while the server drains.
pub const ATT_ERROR_SHUTTING_DOWN: u8 = ATT_ERROR_APPLICATION_ERROR_START;

// ATT handle values
pub const ATT_HANDLE_MIN: u16 = 0x0001;
pub const ATT_HANDLE_MAX: u16 = 0xFFFF;

// ATT MTU limits
pub const ATT_DEFAULT_MTU: u16 = 23;
pub const ATT_MAX_MTU: u16 = 517;

// Descriptor UUIDs
pub const CHAR_USER_DESC_UUID: u16 = 0x2901;
pub const CLIENT_CHAR_CONFIG_UUID: u16 = 0x2902;
