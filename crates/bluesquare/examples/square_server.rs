//! Example demonstrating the square characteristic
//!
//! Starts a peripheral with a Device Information service and the square
//! service, then plays the part of a client by pushing raw ATT PDUs through
//! the endpoint the transport was given.

use bluesquare::gap::{AdvertiseError, AdvertisementIntent, Advertiser};
use bluesquare::gatt::{ComputedValue, Declaration, Properties};
use bluesquare::transport::{Endpoint, PeerId, Transport, TransportError};
use bluesquare::{PeripheralController, PeripheralOptions, Uuid};
use parking_lot::Mutex;
use std::sync::Arc;

/// Keeps the endpoint around so `main` can act as the link
#[derive(Clone, Default)]
struct Loopback(Arc<Mutex<Option<Endpoint>>>);

impl Transport for Loopback {
    fn bind(&mut self, endpoint: Endpoint) -> Result<(), TransportError> {
        *self.0.lock() = Some(endpoint);
        Ok(())
    }

    fn unbind(&mut self) {
        self.0.lock().take();
    }
}

struct PrintAdvertiser;

impl Advertiser for PrintAdvertiser {
    fn advertise(&mut self, intent: &AdvertisementIntent) -> Result<(), AdvertiseError> {
        println!("Advertising {:?} with {} services", intent.local_name, intent.service_uuids.len());
        Ok(())
    }

    fn withdraw(&mut self) {
        println!("Advertisement withdrawn");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let square_uuid: Uuid = "12345678-1234-5678-1234-56789abcdef2".parse()?;
    let definitions = vec![
        // Device Information
        Declaration::service(Uuid::from_u16(0x180A)),
        Declaration::characteristic(Uuid::from_u16(0x2A29), Properties::READABLE)
            .with_initial_value(b"bluesquare".to_vec()),
        Declaration::service("12345678-1234-5678-1234-56789abcdef1".parse()?),
        Declaration::computed(
            square_uuid,
            Properties::READABLE | Properties::WRITABLE,
            ComputedValue::square_decimal(),
        ),
    ];

    let link = Loopback::default();
    let running = PeripheralController::new(PeripheralOptions::default()).start(
        definitions,
        Box::new(link.clone()),
        Box::new(PrintAdvertiser),
    )?;
    for attr in running.table().iter() {
        println!("0x{:04x} {:?} {}", attr.handle, attr.kind, attr.uuid);
    }

    let endpoint = running.endpoint().clone();
    let handle = running
        .characteristic(&square_uuid)
        .ok_or("square characteristic missing")?;
    let peer = PeerId(1);

    for input in ["7", "12", "oops"] {
        let mut write = vec![0x12];
        write.extend_from_slice(&handle.to_le_bytes());
        write.extend_from_slice(input.as_bytes());
        let ack = endpoint.submit_pdu(peer, &write);
        println!("write {:?} -> {:02x?}", input, ack);

        let mut read = vec![0x0A];
        read.extend_from_slice(&handle.to_le_bytes());
        if let Some(rsp) = endpoint.submit_pdu(peer, &read) {
            println!("read -> {:?}", String::from_utf8_lossy(&rsp[1..]));
        }
    }

    let stopped = running.stop();
    println!("{:?}", stopped.stats());
    Ok(())
}
