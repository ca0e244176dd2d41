//! GAP (Generic Access Profile) surface of a peripheral
//!
//! The core only describes what it wants advertised. Building advertising
//! packets and scheduling them on the radio is up to the [`Advertiser`].

pub mod advertising;

pub use advertising::{AdvertiseError, AdvertisementIntent, Advertiser, MAX_LOCAL_NAME_LEN};
