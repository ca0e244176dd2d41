//! Attribute table
//!
//! A dense, handle-ordered list of services, characteristics and descriptors.
//! The table is built once, sealed, and then shared read-only.

use super::error::{GattError, GattResult};
use super::types::{Attribute, AttributeKind, Handle, Properties};
use crate::att::constants::{ATT_HANDLE_MAX, ATT_HANDLE_MIN};
use crate::uuid::Uuid;
use log::debug;

/// Static model of the services exposed by one peripheral
#[derive(Debug, Clone)]
pub struct AttributeTable {
    /// Handle of `attributes[0]`
    base: Handle,
    attributes: Vec<Attribute>,
    sealed: bool,
    /// Most recent service; new characteristics must belong to it
    current_service: Option<Handle>,
    /// Most recent characteristic; new descriptors must belong to it
    current_characteristic: Option<Handle>,
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeTable {
    /// Create an empty table whose first handle is `0x0001`
    pub fn new() -> Self {
        Self::with_base_handle(ATT_HANDLE_MIN)
    }

    /// Create an empty table whose first handle is `base`.
    ///
    /// Handle `0x0000` is reserved by ATT, so a zero base is bumped to the
    /// minimum.
    pub fn with_base_handle(base: Handle) -> Self {
        Self {
            base: base.max(ATT_HANDLE_MIN),
            attributes: Vec::new(),
            sealed: false,
            current_service: None,
            current_characteristic: None,
        }
    }

    /// Declare a primary service
    pub fn declare_service(&mut self, uuid: Uuid) -> GattResult<Handle> {
        // Service declarations are always readable; their value is the UUID.
        let handle = self.push(AttributeKind::Service, uuid, Properties::READABLE)?;
        self.current_service = Some(handle);
        self.current_characteristic = None;
        Ok(handle)
    }

    /// Declare a characteristic inside the service at `service_handle`
    pub fn declare_characteristic(
        &mut self,
        service_handle: Handle,
        uuid: Uuid,
        properties: Properties,
    ) -> GattResult<Handle> {
        self.ensure_building()?;
        match self.resolve(service_handle) {
            Ok(attr) if attr.kind == AttributeKind::Service => {}
            _ => return Err(GattError::InvalidParent(service_handle)),
        }
        // Services are contiguous handle ranges; reopening an earlier one
        // would interleave its characteristics with a later service.
        if self.current_service != Some(service_handle) {
            return Err(GattError::InvalidParent(service_handle));
        }

        let handle = self.push(AttributeKind::Characteristic, uuid, properties)?;
        self.current_characteristic = Some(handle);
        Ok(handle)
    }

    /// Declare a descriptor of the characteristic at `characteristic_handle`,
    /// which must be the characteristic declared most recently.
    pub fn declare_descriptor(
        &mut self,
        characteristic_handle: Handle,
        uuid: Uuid,
        properties: Properties,
    ) -> GattResult<Handle> {
        self.ensure_building()?;
        if self.current_characteristic != Some(characteristic_handle) {
            return Err(GattError::InvalidParent(characteristic_handle));
        }
        self.push(AttributeKind::Descriptor, uuid, properties)
    }

    /// Freeze the table. Irreversible; sealing twice is a no-op.
    pub fn seal(&mut self) {
        if !self.sealed {
            debug!(
                "sealing attribute table with {} attributes",
                self.attributes.len()
            );
        }
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Look up an attribute by handle in O(1)
    pub fn resolve(&self, handle: Handle) -> GattResult<&Attribute> {
        self.index_of(handle)
            .and_then(|index| self.attributes.get(index))
            .ok_or(GattError::NotFound(handle))
    }

    /// All handles whose attribute has `uuid`, in ascending order
    pub fn find_by_uuid(&self, uuid: &Uuid) -> Vec<Handle> {
        self.attributes
            .iter()
            .filter(|attr| attr.uuid == *uuid)
            .map(|attr| attr.handle)
            .collect()
    }

    /// The service that contains `handle` (a service contains itself)
    pub fn parent_service(&self, handle: Handle) -> GattResult<&Attribute> {
        let index = self
            .index_of(handle)
            .filter(|&i| i < self.attributes.len())
            .ok_or(GattError::NotFound(handle))?;
        self.attributes[..=index]
            .iter()
            .rev()
            .find(|attr| attr.kind == AttributeKind::Service)
            .ok_or(GattError::NotFound(handle))
    }

    /// UUIDs of all declared services in declaration order
    pub fn service_uuids(&self) -> Vec<Uuid> {
        self.attributes
            .iter()
            .filter(|attr| attr.kind == AttributeKind::Service)
            .map(|attr| attr.uuid)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// First handle of the table
    pub fn base_handle(&self) -> Handle {
        self.base
    }

    /// Position of `handle` in the dense attribute list, if it could exist
    pub(crate) fn index_of(&self, handle: Handle) -> Option<usize> {
        handle.checked_sub(self.base).map(usize::from)
    }

    fn ensure_building(&self) -> GattResult<()> {
        if self.sealed {
            Err(GattError::TableSealed)
        } else {
            Ok(())
        }
    }

    fn push(
        &mut self,
        kind: AttributeKind,
        uuid: Uuid,
        properties: Properties,
    ) -> GattResult<Handle> {
        self.ensure_building()?;
        let next = usize::from(self.base) + self.attributes.len();
        if next > usize::from(ATT_HANDLE_MAX) {
            return Err(GattError::HandleSpaceExhausted);
        }
        let handle = next as Handle;
        self.attributes.push(Attribute {
            handle,
            kind,
            uuid,
            properties,
        });
        debug!("declared {:?} {} at handle 0x{:04x}", kind, uuid, handle);
        Ok(handle)
    }
}
