//! Computed-value policies
//!
//! A computed characteristic stores what the peer wrote and serves a value
//! derived from it. Derivation runs once per accepted write so reads stay
//! O(1). Payloads the transform cannot interpret either fall back to the
//! transform's sentinel or reject the write, see [`InvalidInput`].

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Caller-supplied derivation; `None` means the input could not be parsed.
pub type DeriveFn = Arc<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;

/// The pure function from written bytes to readable bytes
#[derive(Clone)]
pub enum Transform {
    /// ASCII decimal integer in, its square as ASCII decimal out
    SquareDecimal,
    /// Up to four little-endian bytes in, the square as four little-endian
    /// bytes out
    SquareLe32,
    /// First byte in, its square as a single byte out
    SquareByte,
    Custom {
        name: String,
        derive: DeriveFn,
        sentinel: Vec<u8>,
    },
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::SquareDecimal => f.write_str("SquareDecimal"),
            Transform::SquareLe32 => f.write_str("SquareLe32"),
            Transform::SquareByte => f.write_str("SquareByte"),
            Transform::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}

impl Transform {
    /// Applies the transform, `None` when the input is not understood.
    pub fn derive(&self, input: &[u8]) -> Option<Vec<u8>> {
        match self {
            Transform::SquareDecimal => square_decimal(input),
            Transform::SquareLe32 => square_le32(input),
            Transform::SquareByte => {
                let first = *input.first()?;
                first.checked_mul(first).map(|sq| vec![sq])
            }
            Transform::Custom { derive, .. } => derive(input),
        }
    }

    /// Value served when the last write could not be interpreted.
    pub fn sentinel(&self) -> Vec<u8> {
        match self {
            Transform::SquareDecimal => b"0".to_vec(),
            Transform::SquareLe32 => vec![0; 4],
            Transform::SquareByte => vec![0],
            Transform::Custom { sentinel, .. } => sentinel.clone(),
        }
    }
}

fn square_decimal(input: &[u8]) -> Option<Vec<u8>> {
    let end = input.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let text = std::str::from_utf8(&input[..end]).ok()?.trim();
    let value: i64 = text.parse().ok()?;
    let squared = value.checked_mul(value)?;
    Some(squared.to_string().into_bytes())
}

fn square_le32(input: &[u8]) -> Option<Vec<u8>> {
    if input.len() > 4 {
        return None;
    }
    let mut raw = [0u8; 4];
    raw[..input.len()].copy_from_slice(input);
    let value = u32::from_le_bytes(raw);
    let squared = value.checked_mul(value)?;
    Some(squared.to_le_bytes().to_vec())
}

/// What a write does when the transform rejects its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidInput {
    /// Accept the write and serve the transform's sentinel
    #[default]
    Sentinel,
    /// Fail the write; nothing is stored
    Reject,
}

/// A transform plus its invalid-input rule
#[derive(Debug, Clone)]
pub struct ComputedValue {
    pub transform: Transform,
    pub on_invalid: InvalidInput,
}

impl ComputedValue {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            on_invalid: InvalidInput::default(),
        }
    }

    /// The square-the-integer characteristic with text payloads
    pub fn square_decimal() -> Self {
        Self::new(Transform::SquareDecimal)
    }

    pub fn custom<F>(name: impl Into<String>, sentinel: impl Into<Vec<u8>>, derive: F) -> Self
    where
        F: Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        Self::new(Transform::Custom {
            name: name.into(),
            derive: Arc::new(derive),
            sentinel: sentinel.into(),
        })
    }

    pub fn rejecting_invalid(mut self) -> Self {
        self.on_invalid = InvalidInput::Reject;
        self
    }

    /// Derived bytes to cache for `input`, or `None` if the write must be
    /// refused.
    pub fn evaluate(&self, input: &[u8]) -> Option<Vec<u8>> {
        match (self.transform.derive(input), self.on_invalid) {
            (Some(derived), _) => Some(derived),
            (None, InvalidInput::Sentinel) => Some(self.transform.sentinel()),
            (None, InvalidInput::Reject) => None,
        }
    }
}
