//! Error types for the bluesquare library
//!
//! Errors of the request path live next to the code that raises them
//! ([`GattError`], [`AttError`](crate::att::AttError)). This module holds the
//! errors of starting a peripheral and of loading its configuration.

use crate::gap::AdvertiseError;
use crate::gatt::GattError;
use crate::transport::TransportError;
use crate::uuid::Uuid;
use thiserror::Error;

/// Reasons a peripheral could not be started
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("characteristic {uuid} declared twice in service {service}")]
    DuplicateUuid { service: Uuid, uuid: Uuid },

    #[error("characteristic {0} declares no properties")]
    NoProperties(Uuid),

    #[error("characteristic {0} declared outside of any service")]
    OrphanCharacteristic(Uuid),

    #[error("descriptor {0} declared without a characteristic")]
    OrphanDescriptor(Uuid),

    #[error("initial value of {uuid} is {len} bytes, maximum is {max}")]
    InitialValueTooLong { uuid: Uuid, len: usize, max: usize },

    #[error("failed to build attribute table: {0}")]
    Table(#[from] GattError),

    #[error("failed to bind transport: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to advertise: {0}")]
    Advertisement(#[from] AdvertiseError),
}

/// Errors raised while loading a configuration document
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown characteristic flag {0:?}")]
    UnknownFlag(String),

    #[error("unknown computed-value policy {0:?}")]
    UnknownPolicy(String),

    #[error("invalid hex value: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("{0} sets both value and value_hex")]
    ConflictingValues(Uuid),
}
