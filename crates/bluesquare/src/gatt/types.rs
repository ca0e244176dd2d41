//! Common types for the GATT server core

use super::policy::ComputedValue;
use crate::uuid::Uuid;
use bitflags::bitflags;

/// Attribute handle
pub type Handle = u16;

bitflags! {
    /// Declared properties of an attribute.
    ///
    /// The bit values match the characteristic properties field of a GATT
    /// characteristic declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Properties: u8 {
        const READABLE = 0x02;
        const WRITABLE = 0x08;
        const NOTIFIABLE = 0x10;
    }
}

impl Properties {
    pub fn can_read(&self) -> bool {
        self.contains(Properties::READABLE)
    }

    pub fn can_write(&self) -> bool {
        self.contains(Properties::WRITABLE)
    }

    pub fn can_notify(&self) -> bool {
        self.contains(Properties::NOTIFIABLE)
    }
}

/// What an attribute declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Service,
    Characteristic,
    Descriptor,
}

/// One entry of the attribute table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Stable handle, assigned in declaration order
    pub handle: Handle,
    /// Attribute kind
    pub kind: AttributeKind,
    /// Service, characteristic or descriptor UUID
    pub uuid: Uuid,
    /// Declared properties
    pub properties: Properties,
}

/// How the peer expects a write to be acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// ATT Write Request; an acknowledgement or error is returned
    WithResponse,
    /// ATT Write Command; nothing is ever returned
    WithoutResponse,
}

/// One line of a service definition, consumed in order by the peripheral
#[derive(Debug, Clone)]
pub enum Declaration {
    Service {
        uuid: Uuid,
    },
    Characteristic {
        uuid: Uuid,
        properties: Properties,
        policy: Option<ComputedValue>,
        initial_value: Vec<u8>,
    },
    /// Belongs to the characteristic declared just before it
    Descriptor {
        uuid: Uuid,
        properties: Properties,
        initial_value: Vec<u8>,
    },
}

impl Declaration {
    pub fn service(uuid: Uuid) -> Self {
        Declaration::Service { uuid }
    }

    /// A plain characteristic holding whatever was last written
    pub fn characteristic(uuid: Uuid, properties: Properties) -> Self {
        Declaration::Characteristic {
            uuid,
            properties,
            policy: None,
            initial_value: Vec::new(),
        }
    }

    /// A characteristic whose readable value is derived from the last write
    pub fn computed(uuid: Uuid, properties: Properties, policy: ComputedValue) -> Self {
        Declaration::Characteristic {
            uuid,
            properties,
            policy: Some(policy),
            initial_value: Vec::new(),
        }
    }

    pub fn descriptor(uuid: Uuid, properties: Properties) -> Self {
        Declaration::Descriptor {
            uuid,
            properties,
            initial_value: Vec::new(),
        }
    }

    /// Replaces the initial value of a characteristic or descriptor.
    pub fn with_initial_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        match &mut self {
            Declaration::Characteristic { initial_value, .. }
            | Declaration::Descriptor { initial_value, .. } => *initial_value = value.into(),
            Declaration::Service { .. } => {}
        }
        self
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            Declaration::Service { uuid }
            | Declaration::Characteristic { uuid, .. }
            | Declaration::Descriptor { uuid, .. } => *uuid,
        }
    }
}
