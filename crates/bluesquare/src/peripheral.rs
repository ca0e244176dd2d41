//! Peripheral lifecycle
//!
//! [`PeripheralController::start`] turns a list of declarations into a
//! running GATT server: it builds and seals the attribute table, seeds the
//! value store, binds the transport and publishes the advertisement intent.
//! [`Running::stop`] undoes all of it after letting in-flight exchanges
//! finish.

use crate::att::constants::{ATT_DEFAULT_MTU, ATT_MAX_MTU};
use crate::error::StartupError;
use crate::gap::{AdvertisementIntent, Advertiser};
use crate::gatt::{
    AttributeTable, Declaration, DispatchStats, Handle, RequestDispatcher, ValueStore,
};
use crate::transport::{Endpoint, Transport};
use crate::uuid::Uuid;
use log::{debug, info};
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::sync::Arc;

/// Default adapter alias
pub const DEFAULT_LOCAL_NAME: &str = "test-rs9116";

/// Settings that do not come from the service definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralOptions {
    /// Name to advertise
    pub local_name: String,
    pub discoverable: bool,
    pub pairable: bool,
    /// Maximum value length before any MTU exchange
    pub max_value_len: u16,
    /// MTU offered to peers in an MTU exchange
    pub server_mtu: u16,
}

impl Default for PeripheralOptions {
    fn default() -> Self {
        Self {
            local_name: DEFAULT_LOCAL_NAME.to_string(),
            discoverable: true,
            pairable: true,
            max_value_len: ATT_DEFAULT_MTU,
            server_mtu: ATT_MAX_MTU,
        }
    }
}

#[derive(Debug)]
struct GateState {
    open: bool,
    in_flight: usize,
}

/// Admission control for exchanges; closing it lets the current ones drain.
#[derive(Debug)]
pub(crate) struct DrainGate {
    state: Mutex<GateState>,
    drained: Condvar,
}

/// Held for the duration of one admitted exchange
pub(crate) struct Admission<'a> {
    gate: &'a DrainGate,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.gate.drained.notify_all();
        }
    }
}

impl DrainGate {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                open: true,
                in_flight: 0,
            }),
            drained: Condvar::new(),
        }
    }

    /// Admit one exchange, or `None` once the gate is closed
    pub(crate) fn enter(&self) -> Option<Admission<'_>> {
        let mut state = self.state.lock();
        if !state.open {
            return None;
        }
        state.in_flight += 1;
        Some(Admission { gate: self })
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Close the gate and block until every admitted exchange finished
    pub(crate) fn close_and_drain(&self) {
        let mut state = self.state.lock();
        state.open = false;
        while state.in_flight > 0 {
            debug!("waiting for {} in-flight exchanges", state.in_flight);
            self.drained.wait(&mut state);
        }
    }
}

/// Starts peripherals from service definitions
#[derive(Debug, Clone, Default)]
pub struct PeripheralController {
    options: PeripheralOptions,
}

impl PeripheralController {
    pub fn new(options: PeripheralOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PeripheralOptions {
        &self.options
    }

    /// Build the server and bring it up on `transport`.
    ///
    /// Nothing is left bound or advertised when this fails.
    pub fn start(
        &self,
        definitions: impl IntoIterator<Item = Declaration>,
        mut transport: Box<dyn Transport>,
        mut advertiser: Box<dyn Advertiser>,
    ) -> Result<Running, StartupError> {
        let definitions: Vec<Declaration> = definitions.into_iter().collect();
        validate(&definitions)?;

        let max_value_len = usize::from(self.options.max_value_len.clamp(ATT_DEFAULT_MTU, ATT_MAX_MTU));
        let store = Arc::new(build(&definitions, max_value_len)?);
        let table = Arc::clone(store.table());
        info!(
            "attribute table ready: {} attributes in {} services",
            table.len(),
            table.service_uuids().len()
        );

        let dispatcher = Arc::new(RequestDispatcher::new(Arc::clone(&store)));
        let gate = Arc::new(DrainGate::new());
        let endpoint = Endpoint::new(Arc::clone(&dispatcher), Arc::clone(&gate), self.options.server_mtu);

        transport.bind(endpoint.clone())?;
        debug!("transport bound");

        let advertisement = AdvertisementIntent::new(&self.options.local_name, table.service_uuids())
            .discoverable(self.options.discoverable)
            .pairable(self.options.pairable);
        if let Err(err) = advertiser.advertise(&advertisement) {
            transport.unbind();
            return Err(err.into());
        }
        info!("advertising as {:?}", advertisement.local_name);

        Ok(Running {
            table,
            store,
            dispatcher,
            gate,
            endpoint,
            transport,
            advertiser,
            advertisement,
        })
    }
}

/// Checks the shape of the definitions before anything is built
fn validate(definitions: &[Declaration]) -> Result<(), StartupError> {
    let mut service: Option<Uuid> = None;
    let mut seen = HashSet::new();
    let mut has_characteristic = false;

    for declaration in definitions {
        match declaration {
            Declaration::Service { uuid } => {
                service = Some(*uuid);
                seen.clear();
                has_characteristic = false;
            }
            Declaration::Characteristic {
                uuid, properties, ..
            } => {
                let service = service.ok_or(StartupError::OrphanCharacteristic(*uuid))?;
                if properties.is_empty() {
                    return Err(StartupError::NoProperties(*uuid));
                }
                if !seen.insert(*uuid) {
                    return Err(StartupError::DuplicateUuid {
                        service,
                        uuid: *uuid,
                    });
                }
                has_characteristic = true;
            }
            Declaration::Descriptor { uuid, .. } => {
                if !has_characteristic {
                    return Err(StartupError::OrphanDescriptor(*uuid));
                }
            }
        }
    }
    Ok(())
}

/// Declares, seals and seeds; `definitions` must have passed [`validate`]
fn build(definitions: &[Declaration], max_value_len: usize) -> Result<ValueStore, StartupError> {
    let mut table = AttributeTable::new();
    let mut service: Handle = 0;
    let mut characteristic: Handle = 0;
    let mut seeds = Vec::new();

    for declaration in definitions {
        match declaration {
            Declaration::Service { uuid } => {
                service = table.declare_service(*uuid)?;
            }
            Declaration::Characteristic {
                uuid,
                properties,
                policy,
                initial_value,
            } => {
                characteristic = table.declare_characteristic(service, *uuid, *properties)?;
                seeds.push((characteristic, *uuid, policy.clone(), initial_value));
            }
            Declaration::Descriptor {
                uuid,
                properties,
                initial_value,
            } => {
                let handle = table.declare_descriptor(characteristic, *uuid, *properties)?;
                seeds.push((handle, *uuid, None, initial_value));
            }
        }
    }
    table.seal();

    let mut store = ValueStore::new(Arc::new(table))?;
    store.set_max_value_len(max_value_len as u16);
    for (handle, uuid, policy, initial_value) in seeds {
        if initial_value.len() > max_value_len {
            return Err(StartupError::InitialValueTooLong {
                uuid,
                len: initial_value.len(),
                max: max_value_len,
            });
        }
        if let Some(policy) = policy {
            store.attach_policy(handle, policy)?;
        }
        store.set_initial_value(handle, initial_value.clone())?;
    }
    Ok(store)
}

/// A started peripheral
pub struct Running {
    table: Arc<AttributeTable>,
    store: Arc<ValueStore>,
    dispatcher: Arc<RequestDispatcher>,
    gate: Arc<DrainGate>,
    endpoint: Endpoint,
    transport: Box<dyn Transport>,
    advertiser: Box<dyn Advertiser>,
    advertisement: AdvertisementIntent,
}

impl Running {
    /// The endpoint handed to the transport
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn value_store(&self) -> &Arc<ValueStore> {
        &self.store
    }

    pub fn table(&self) -> &Arc<AttributeTable> {
        &self.table
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    pub fn advertisement(&self) -> &AdvertisementIntent {
        &self.advertisement
    }

    /// Handle of the first characteristic with `uuid`
    pub fn characteristic(&self, uuid: &Uuid) -> Option<Handle> {
        self.table
            .find_by_uuid(uuid)
            .into_iter()
            .find(|&handle| {
                self.table
                    .resolve(handle)
                    .map(|attr| attr.kind == crate::gatt::AttributeKind::Characteristic)
                    .unwrap_or(false)
            })
    }

    /// Stop admitting requests, wait for in-flight exchanges, then unbind
    /// the transport and withdraw the advertisement.
    pub fn stop(mut self) -> Stopped {
        info!("stopping peripheral");
        self.gate.close_and_drain();
        self.transport.unbind();
        self.advertiser.withdraw();

        let stats = self.dispatcher.stats();
        info!(
            "peripheral stopped after {} reads and {} writes",
            stats.reads, stats.writes
        );
        Stopped {
            stats,
            store: self.store,
        }
    }
}

/// A peripheral that has been shut down
#[derive(Debug)]
pub struct Stopped {
    stats: DispatchStats,
    store: Arc<ValueStore>,
}

impl Stopped {
    /// Final dispatcher counters
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Values as they were when the last exchange completed
    pub fn value_store(&self) -> &Arc<ValueStore> {
        &self.store
    }
}
