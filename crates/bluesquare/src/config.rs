//! JSON configuration for a peripheral
//!
//! ```json
//! {
//!   "adapter": { "alias": "test-rs9116", "discoverable": true, "pairable": true },
//!   "services": [{
//!     "uuid": "12345678-1234-5678-1234-56789abcdef1",
//!     "characteristics": [{
//!       "uuid": "12345678-1234-5678-1234-56789abcdef2",
//!       "flags": ["read", "write"],
//!       "policy": "square-decimal"
//!     }]
//!   }]
//! }
//! ```

use crate::att::constants::ATT_DEFAULT_MTU;
use crate::error::ConfigError;
use crate::gatt::{ComputedValue, Declaration, InvalidInput, Properties, Transform};
use crate::peripheral::{PeripheralOptions, DEFAULT_LOCAL_NAME};
use crate::uuid::Uuid;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Adapter settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub alias: String,
    pub discoverable: bool,
    pub pairable: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            alias: DEFAULT_LOCAL_NAME.to_string(),
            discoverable: true,
            pairable: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorConfig {
    pub uuid: Uuid,
    #[serde(default)]
    pub flags: Vec<String>,
    pub value: Option<String>,
    pub value_hex: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CharacteristicConfig {
    pub uuid: Uuid,
    pub flags: Vec<String>,
    /// Name of a built-in computed-value transform
    pub policy: Option<String>,
    #[serde(default)]
    pub on_invalid: InvalidInput,
    /// Initial value as text
    pub value: Option<String>,
    /// Initial value as hex
    pub value_hex: Option<String>,
    #[serde(default)]
    pub descriptors: Vec<DescriptorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub uuid: Uuid,
    #[serde(default)]
    pub characteristics: Vec<CharacteristicConfig>,
}

/// Top-level configuration document
#[derive(Debug, Clone, Deserialize)]
pub struct PeripheralConfig {
    #[serde(default)]
    pub adapter: AdapterConfig,
    /// Maximum value length until a peer negotiates a larger MTU
    #[serde(default = "default_max_value_len")]
    pub max_value_len: u16,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

fn default_max_value_len() -> u16 {
    ATT_DEFAULT_MTU
}

impl PeripheralConfig {
    /// Read and parse a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Options for [`PeripheralController::new`](crate::PeripheralController::new)
    pub fn options(&self) -> PeripheralOptions {
        PeripheralOptions {
            local_name: self.adapter.alias.clone(),
            discoverable: self.adapter.discoverable,
            pairable: self.adapter.pairable,
            max_value_len: self.max_value_len,
            ..PeripheralOptions::default()
        }
    }

    /// Service definitions in declaration order
    pub fn declarations(&self) -> Result<Vec<Declaration>, ConfigError> {
        let mut declarations = Vec::new();
        for service in &self.services {
            declarations.push(Declaration::service(service.uuid));
            for chr in &service.characteristics {
                let properties = parse_flags(&chr.flags)?;
                let initial = initial_value(chr.uuid, &chr.value, &chr.value_hex)?;
                let declaration = match &chr.policy {
                    Some(name) => {
                        let policy = ComputedValue {
                            transform: parse_transform(name)?,
                            on_invalid: chr.on_invalid,
                        };
                        Declaration::computed(chr.uuid, properties, policy)
                    }
                    None => Declaration::characteristic(chr.uuid, properties),
                };
                declarations.push(declaration.with_initial_value(initial));

                for desc in &chr.descriptors {
                    let properties = parse_flags(&desc.flags)?;
                    let initial = initial_value(desc.uuid, &desc.value, &desc.value_hex)?;
                    declarations
                        .push(Declaration::descriptor(desc.uuid, properties).with_initial_value(initial));
                }
            }
        }
        Ok(declarations)
    }
}

/// Maps flag names onto properties. Both write flavours map to `WRITABLE`,
/// since either kind of write is accepted on a writable attribute.
fn parse_flags(flags: &[String]) -> Result<Properties, ConfigError> {
    flags.iter().try_fold(Properties::empty(), |acc, flag| {
        let bit = match flag.as_str() {
            "read" => Properties::READABLE,
            "write" | "write-without-response" => Properties::WRITABLE,
            "notify" => Properties::NOTIFIABLE,
            other => return Err(ConfigError::UnknownFlag(other.to_string())),
        };
        Ok(acc | bit)
    })
}

fn parse_transform(name: &str) -> Result<Transform, ConfigError> {
    match name {
        "square-decimal" => Ok(Transform::SquareDecimal),
        "square-le32" => Ok(Transform::SquareLe32),
        "square-byte" => Ok(Transform::SquareByte),
        other => Err(ConfigError::UnknownPolicy(other.to_string())),
    }
}

fn initial_value(uuid: Uuid, text: &Option<String>, hex: &Option<String>) -> Result<Vec<u8>, ConfigError> {
    match (text, hex) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingValues(uuid)),
        (Some(text), None) => Ok(text.as_bytes().to_vec()),
        (None, Some(hex)) => Ok(hex::decode(hex)?),
        (None, None) => Ok(Vec::new()),
    }
}
