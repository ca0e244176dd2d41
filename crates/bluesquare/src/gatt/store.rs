//! Characteristic value storage
//!
//! The value store owns every mutable byte of the server. Each attribute gets
//! its own slot behind a read/write lock, so concurrent exchanges on
//! different handles never contend and a read can never observe half of a
//! write.

use super::error::{GattError, GattResult};
use super::policy::ComputedValue;
use super::table::AttributeTable;
use super::types::{AttributeKind, Handle, WriteKind};
use crate::att::constants::{ATT_DEFAULT_MTU, ATT_MAX_MTU};
use log::{debug, trace};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Current contents of one attribute
#[derive(Debug, Default)]
struct CharacteristicValue {
    /// Bytes of the last accepted write (or the initial value)
    raw: Vec<u8>,
    /// Cached policy output; served instead of `raw` when present
    derived: Option<Vec<u8>>,
    /// Number of accepted writes
    revision: u64,
}

/// Values and access policy for every attribute of one sealed table
#[derive(Debug)]
pub struct ValueStore {
    table: Arc<AttributeTable>,
    slots: Vec<RwLock<CharacteristicValue>>,
    policies: Vec<Option<ComputedValue>>,
    max_value_len: AtomicUsize,
}

impl ValueStore {
    /// Create a store sized to `table`, which must already be sealed.
    ///
    /// Service attributes start out holding their UUID, everything else is
    /// empty. The maximum value length defaults to the ATT minimum MTU.
    pub fn new(table: Arc<AttributeTable>) -> GattResult<Self> {
        if !table.is_sealed() {
            return Err(GattError::TableNotSealed);
        }

        let slots = table
            .iter()
            .map(|attr| {
                let raw = match attr.kind {
                    AttributeKind::Service => attr.uuid.to_wire_bytes(),
                    _ => Vec::new(),
                };
                RwLock::new(CharacteristicValue {
                    raw,
                    ..Default::default()
                })
            })
            .collect();
        let policies = vec![None; table.len()];

        Ok(Self {
            table,
            slots,
            policies,
            max_value_len: AtomicUsize::new(usize::from(ATT_DEFAULT_MTU)),
        })
    }

    /// Attach a computed-value policy to a characteristic.
    ///
    /// The derived value is computed from the current raw value right away,
    /// so reads before the first write already go through the policy.
    pub fn attach_policy(&mut self, handle: Handle, policy: ComputedValue) -> GattResult<()> {
        let index = self.slot_index(handle)?;
        if self.table.resolve(handle)?.kind != AttributeKind::Characteristic {
            return Err(GattError::NotACharacteristic(handle));
        }

        let slot = self.slots[index].get_mut();
        slot.derived = Some(
            policy
                .evaluate(&slot.raw)
                .unwrap_or_else(|| policy.transform.sentinel()),
        );
        self.policies[index] = Some(policy);
        Ok(())
    }

    /// Seed the value of an attribute before the store is shared.
    pub fn set_initial_value(&mut self, handle: Handle, value: impl Into<Vec<u8>>) -> GattResult<()> {
        let index = self.slot_index(handle)?;
        let slot = self.slots[index].get_mut();
        slot.raw = value.into();
        if let Some(policy) = &self.policies[index] {
            slot.derived = Some(
                policy
                    .evaluate(&slot.raw)
                    .unwrap_or_else(|| policy.transform.sentinel()),
            );
        }
        Ok(())
    }

    /// Read the current value of `handle`
    pub fn read(&self, handle: Handle) -> GattResult<Vec<u8>> {
        let attr = self.table.resolve(handle)?;
        if !attr.properties.can_read() {
            return Err(GattError::AttributeNotReadable(handle));
        }

        let slot = self.slots[self.slot_index(handle)?].read();
        let value = slot.derived.as_ref().unwrap_or(&slot.raw).clone();
        trace!("read 0x{:04x} -> {:02x?}", handle, value);
        Ok(value)
    }

    /// Read the part of `handle`'s value starting at `offset`.
    ///
    /// An offset equal to the value length yields an empty part.
    pub fn read_blob(&self, handle: Handle, offset: u16) -> GattResult<Vec<u8>> {
        let value = self.read(handle)?;
        let start = usize::from(offset);
        if start > value.len() {
            return Err(GattError::InvalidOffset { handle, offset });
        }
        Ok(value[start..].to_vec())
    }

    /// Write `value` to `handle` under the store-wide maximum length.
    ///
    /// Both write kinds mutate state identically. A failed write leaves the
    /// value and revision untouched.
    pub fn write(&self, handle: Handle, value: &[u8], kind: WriteKind) -> GattResult<()> {
        self.write_limited(handle, value, kind, self.max_value_len())
    }

    /// Write `value` to `handle`, rejecting values longer than `max`.
    ///
    /// Used for peers whose link negotiated its own transmission size.
    pub fn write_limited(
        &self,
        handle: Handle,
        value: &[u8],
        kind: WriteKind,
        max: usize,
    ) -> GattResult<()> {
        let attr = self.table.resolve(handle)?;
        if !attr.properties.can_write() {
            return Err(GattError::AttributeNotWritable(handle));
        }

        if value.len() > max {
            return Err(GattError::ValueTooLong {
                handle,
                len: value.len(),
                max,
            });
        }

        let index = self.slot_index(handle)?;
        let derived = match &self.policies[index] {
            Some(policy) => Some(
                policy
                    .evaluate(value)
                    .ok_or(GattError::PolicyRejected(handle))?,
            ),
            None => None,
        };

        let mut slot = self.slots[index].write();
        slot.raw = value.to_vec();
        slot.derived = derived;
        slot.revision += 1;
        debug!(
            "write {:?} 0x{:04x} <- {:02x?} (revision {})",
            kind, handle, value, slot.revision
        );
        Ok(())
    }

    /// Update a value from the server side, bypassing peer permissions.
    ///
    /// Computed characteristics ignore pushed values; their reads keep
    /// following the last accepted write. Pushes never bump the revision.
    pub fn push_value(&self, handle: Handle, value: &[u8]) -> GattResult<()> {
        let index = self.slot_index(handle)?;
        if self.policies[index].is_some() {
            debug!("ignoring pushed value for computed 0x{:04x}", handle);
            return Ok(());
        }
        self.slots[index].write().raw = value.to_vec();
        Ok(())
    }

    /// Number of accepted writes to `handle`
    pub fn revision(&self, handle: Handle) -> GattResult<u64> {
        Ok(self.slots[self.slot_index(handle)?].read().revision)
    }

    /// Largest value a peer may write before its link negotiated a size
    pub fn max_value_len(&self) -> usize {
        self.max_value_len.load(Ordering::Acquire)
    }

    /// Set the default transmission size, clamped to the ATT limits.
    /// Returns the size actually in effect.
    pub fn set_max_value_len(&self, negotiated: u16) -> usize {
        let applied = usize::from(negotiated.clamp(ATT_DEFAULT_MTU, ATT_MAX_MTU));
        self.max_value_len.store(applied, Ordering::Release);
        debug!("maximum value length now {} (requested {})", applied, negotiated);
        applied
    }

    pub fn table(&self) -> &Arc<AttributeTable> {
        &self.table
    }

    fn slot_index(&self, handle: Handle) -> GattResult<usize> {
        self.table
            .index_of(handle)
            .filter(|&index| index < self.slots.len())
            .ok_or(GattError::NotFound(handle))
    }
}
