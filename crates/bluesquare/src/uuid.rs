//! Bluetooth UUIDs
//!
//! Every attribute type in the table is a 128-bit UUID. SIG-assigned 16-bit
//! and 32-bit values are expanded against the Bluetooth base UUID so that all
//! forms compare equal once constructed.

use serde::de::{self, Deserialize, Deserializer};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 128-bit Bluetooth UUID.
///
/// Stored little-endian, which is the order the attribute protocol puts on
/// the wire.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Uuid {
    bytes: [u8; 16],
}

/// "00000000-0000-1000-8000-00805F9B34FB" in little-endian order.
const BASE_UUID_BYTES: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Offset within the base UUID where the 16/32-bit value is inserted.
const BASE_OFFSET: usize = 12;

impl Uuid {
    /// Creates a UUID from 16 little-endian bytes.
    pub const fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Uuid { bytes }
    }

    /// Creates a UUID from 16 big-endian bytes (textual order).
    pub fn from_bytes_be(mut bytes: [u8; 16]) -> Self {
        bytes.reverse();
        Uuid { bytes }
    }

    /// Creates a UUID from its 128-bit integer value, e.g.
    /// `0x12345678_1234_5678_1234_56789abcdef0`.
    pub const fn from_u128(value: u128) -> Self {
        Uuid {
            bytes: value.to_le_bytes(),
        }
    }

    /// Creates a UUID from a 16-bit SIG-assigned value.
    pub const fn from_u16(uuid16: u16) -> Self {
        let mut bytes = BASE_UUID_BYTES;
        bytes[BASE_OFFSET] = uuid16 as u8;
        bytes[BASE_OFFSET + 1] = (uuid16 >> 8) as u8;
        Uuid { bytes }
    }

    /// Creates a UUID from a 32-bit SIG-assigned value.
    pub const fn from_u32(uuid32: u32) -> Self {
        let mut bytes = BASE_UUID_BYTES;
        bytes[BASE_OFFSET] = uuid32 as u8;
        bytes[BASE_OFFSET + 1] = (uuid32 >> 8) as u8;
        bytes[BASE_OFFSET + 2] = (uuid32 >> 16) as u8;
        bytes[BASE_OFFSET + 3] = (uuid32 >> 24) as u8;
        Uuid { bytes }
    }

    /// Tries to create a UUID from a little-endian wire slice of 2, 4 or 16
    /// bytes.
    pub fn try_from_slice_le(slice: &[u8]) -> Option<Self> {
        match slice.len() {
            2 => Some(Uuid::from_u16(u16::from_le_bytes([slice[0], slice[1]]))),
            4 => Some(Uuid::from_u32(u32::from_le_bytes([
                slice[0], slice[1], slice[2], slice[3],
            ]))),
            16 => {
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(slice);
                Some(Uuid::from_bytes_le(bytes))
            }
            _ => None,
        }
    }

    /// Returns the underlying bytes in little-endian order.
    pub const fn as_bytes_le(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// Returns the bytes in big-endian (textual) order.
    pub fn as_bytes_be(&self) -> [u8; 16] {
        let mut bytes = self.bytes;
        bytes.reverse();
        bytes
    }

    fn is_sig_assigned(&self) -> bool {
        self.bytes[0..BASE_OFFSET] == BASE_UUID_BYTES[0..BASE_OFFSET]
    }

    /// Returns the 16-bit short form if this is a SIG-assigned 16-bit UUID.
    pub fn as_u16(&self) -> Option<u16> {
        if self.is_sig_assigned()
            && self.bytes[BASE_OFFSET + 2] == 0
            && self.bytes[BASE_OFFSET + 3] == 0
        {
            Some(u16::from_le_bytes([
                self.bytes[BASE_OFFSET],
                self.bytes[BASE_OFFSET + 1],
            ]))
        } else {
            None
        }
    }

    /// The shortest little-endian form allowed in an attribute value:
    /// 2 bytes for 16-bit UUIDs, 16 bytes otherwise.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        match self.as_u16() {
            Some(short) => short.to_le_bytes().to_vec(),
            None => self.bytes.to_vec(),
        }
    }
}

impl From<u16> for Uuid {
    fn from(uuid16: u16) -> Self {
        Uuid::from_u16(uuid16)
    }
}

impl From<u128> for Uuid {
    fn from(value: u128) -> Self {
        Uuid::from_u128(value)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.as_bytes_be();
        write!(
            f,
            "{}-{}-{}-{}-{}",
            hex::encode(&b[0..4]),
            hex::encode(&b[4..6]),
            hex::encode(&b[6..8]),
            hex::encode(&b[8..10]),
            hex::encode(&b[10..16])
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_u16() {
            Some(short) => write!(f, "Uuid(0x{:04X})", short),
            None => write!(f, "Uuid({})", self),
        }
    }
}

/// Errors from parsing a textual UUID.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UuidParseError {
    #[error("UUID must have 4, 8 or 32 hex digits, got {0}")]
    InvalidLength(usize),

    #[error("UUID contains non-hex character {0:?}")]
    InvalidCharacter(char),

    #[error("invalid hex in UUID: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    /// Accepts "180A", "0000180A" and the hyphenated or plain 128-bit form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cleaned = String::with_capacity(32);
        for c in s.trim().chars() {
            match c {
                '-' => continue,
                c if c.is_ascii_hexdigit() => cleaned.push(c),
                c => return Err(UuidParseError::InvalidCharacter(c)),
            }
        }

        match cleaned.len() {
            4 => {
                let mut raw = [0u8; 2];
                hex::decode_to_slice(&cleaned, &mut raw)?;
                Ok(Uuid::from_u16(u16::from_be_bytes(raw)))
            }
            8 => {
                let mut raw = [0u8; 4];
                hex::decode_to_slice(&cleaned, &mut raw)?;
                Ok(Uuid::from_u32(u32::from_be_bytes(raw)))
            }
            32 => {
                let mut bytes_be = [0u8; 16];
                hex::decode_to_slice(&cleaned, &mut bytes_be)?;
                Ok(Uuid::from_bytes_be(bytes_be))
            }
            n => Err(UuidParseError::InvalidLength(n)),
        }
    }
}

impl Serialize for Uuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uuid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
