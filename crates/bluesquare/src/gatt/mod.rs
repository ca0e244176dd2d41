//! GATT (Generic Attribute Profile) server core
//!
//! This module provides the attribute table, the value store behind it and
//! the dispatcher that answers read and write requests from peers.

pub mod dispatcher;
pub mod error;
pub mod policy;
pub mod request;
pub mod store;
pub mod table;
pub mod types;


pub use dispatcher::{DispatchStats, Exchange, RequestDispatcher};
pub use error::{GattError, GattResult};
pub use policy::{ComputedValue, InvalidInput, Transform};
pub use request::{Request, Response};
pub use store::ValueStore;
pub use table::AttributeTable;
pub use types::{Attribute, AttributeKind, Declaration, Handle, Properties, WriteKind};
