//! bluesquare - a GATT attribute server core
//!
//! This library models the services, characteristics and descriptors of a
//! Bluetooth LE peripheral and answers attribute read and write requests
//! against them. Radio access, link layer and advertising packets are left
//! to external collaborators reached through the [`Transport`] and
//! [`Advertiser`] traits.
//!
//! The stock use case is a characteristic that squares the integer written
//! to it:
//!
//! ```
//! use bluesquare::gatt::{ComputedValue, Declaration, Properties, Request, Response};
//! use bluesquare::gap::{AdvertiseError, AdvertisementIntent, Advertiser};
//! use bluesquare::transport::{Endpoint, PeerId, Transport, TransportError};
//! use bluesquare::{PeripheralController, PeripheralOptions, Uuid};
//!
//! struct Loopback;
//! impl Transport for Loopback {
//!     fn bind(&mut self, _endpoint: Endpoint) -> Result<(), TransportError> { Ok(()) }
//!     fn unbind(&mut self) {}
//! }
//! struct Silent;
//! impl Advertiser for Silent {
//!     fn advertise(&mut self, _: &AdvertisementIntent) -> Result<(), AdvertiseError> { Ok(()) }
//!     fn withdraw(&mut self) {}
//! }
//!
//! let service: Uuid = "12345678-1234-5678-1234-56789abcdef1".parse().unwrap();
//! let square: Uuid = "12345678-1234-5678-1234-56789abcdef2".parse().unwrap();
//! let running = PeripheralController::new(PeripheralOptions::default())
//!     .start(
//!         vec![
//!             Declaration::service(service),
//!             Declaration::computed(
//!                 square,
//!                 Properties::READABLE | Properties::WRITABLE,
//!                 ComputedValue::square_decimal(),
//!             ),
//!         ],
//!         Box::new(Loopback),
//!         Box::new(Silent),
//!     )
//!     .unwrap();
//!
//! let handle = running.characteristic(&square).unwrap();
//! let endpoint = running.endpoint();
//! endpoint.submit(PeerId(1), Request::write(handle, b"7".to_vec()));
//! assert_eq!(
//!     endpoint.submit(PeerId(1), Request::read(handle)),
//!     Some(Response::Value { handle, value: b"49".to_vec() })
//! );
//! running.stop();
//! ```

pub mod att;
pub mod config;
pub mod error;
pub mod gap;
pub mod gatt;
pub mod peripheral;
pub mod transport;
pub mod uuid;

// Re-export common types for convenience
pub use config::PeripheralConfig;
pub use error::{ConfigError, StartupError};
pub use gap::{AdvertisementIntent, Advertiser};
pub use gatt::{
    AttributeTable, ComputedValue, Declaration, GattError, Properties, Request, RequestDispatcher,
    Response, ValueStore,
};
pub use peripheral::{PeripheralController, PeripheralOptions, Running, Stopped};
pub use transport::{Endpoint, PeerId, Transport};
pub use uuid::Uuid;
