//! End-to-end tests of a peripheral driven through a spy transport

use bluesquare::att::constants::*;
use bluesquare::gap::{AdvertiseError, AdvertisementIntent, Advertiser};
use bluesquare::gatt::{
    ComputedValue, Declaration, GattError, Handle, Properties, Request, Response, Transform,
};
use bluesquare::transport::{Endpoint, PeerId, Transport, TransportError};
use bluesquare::{PeripheralConfig, PeripheralController, PeripheralOptions, StartupError, Uuid};
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SERVICE: Uuid = Uuid::from_u128(0x12345678_1234_5678_1234_56789abcdef1);
const SQUARE: Uuid = Uuid::from_u128(0x12345678_1234_5678_1234_56789abcdef2);
const NOTES: Uuid = Uuid::from_u128(0x12345678_1234_5678_1234_56789abcdef3);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct SpyState {
    endpoint: Option<Endpoint>,
    binds: usize,
    unbinds: usize,
    fail_bind: bool,
    /// Every response the transport would have put on the air
    sent: Vec<(PeerId, Response)>,
}

/// Transport that records what happens to it
#[derive(Clone, Default)]
struct SpyTransport {
    state: Arc<Mutex<SpyState>>,
}

impl SpyTransport {
    fn failing() -> Self {
        let spy = Self::default();
        spy.state.lock().fail_bind = true;
        spy
    }

    fn endpoint(&self) -> Endpoint {
        self.state.lock().endpoint.clone().expect("transport not bound")
    }

    fn is_bound(&self) -> bool {
        self.state.lock().endpoint.is_some()
    }

    /// Deliver a request the way a link would, recording any response
    fn deliver(&self, peer: PeerId, request: Request) -> Option<Response> {
        let response = self.endpoint().submit(peer, request);
        if let Some(response) = &response {
            self.state.lock().sent.push((peer, response.clone()));
        }
        response
    }

    fn sent(&self) -> Vec<(PeerId, Response)> {
        self.state.lock().sent.clone()
    }
}

impl Transport for SpyTransport {
    fn bind(&mut self, endpoint: Endpoint) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.binds += 1;
        if state.fail_bind {
            return Err(TransportError::Unavailable("no adapter".to_string()));
        }
        state.endpoint = Some(endpoint);
        Ok(())
    }

    fn unbind(&mut self) {
        let mut state = self.state.lock();
        state.unbinds += 1;
        state.endpoint = None;
    }
}

#[derive(Default)]
struct AdvertiserState {
    current: Option<AdvertisementIntent>,
    withdrawn: usize,
    fail: bool,
}

#[derive(Clone, Default)]
struct SpyAdvertiser {
    state: Arc<Mutex<AdvertiserState>>,
}

impl Advertiser for SpyAdvertiser {
    fn advertise(&mut self, intent: &AdvertisementIntent) -> Result<(), AdvertiseError> {
        let mut state = self.state.lock();
        if state.fail {
            return Err(AdvertiseError::Rejected("too many advertisements".to_string()));
        }
        state.current = Some(intent.clone());
        Ok(())
    }

    fn withdraw(&mut self) {
        let mut state = self.state.lock();
        state.current = None;
        state.withdrawn += 1;
    }
}

fn square_service(policy: ComputedValue) -> Vec<Declaration> {
    let rw = Properties::READABLE | Properties::WRITABLE;
    vec![
        Declaration::service(SERVICE),
        Declaration::computed(SQUARE, rw, policy),
        Declaration::descriptor(Uuid::from_u16(CHAR_USER_DESC_UUID), Properties::READABLE)
            .with_initial_value(b"Square".to_vec()),
        Declaration::characteristic(NOTES, rw),
    ]
}

fn start(
    policy: ComputedValue,
) -> (bluesquare::Running, SpyTransport, SpyAdvertiser, Handle) {
    init_logging();
    let transport = SpyTransport::default();
    let advertiser = SpyAdvertiser::default();
    let running = PeripheralController::new(PeripheralOptions::default())
        .start(
            square_service(policy),
            Box::new(transport.clone()),
            Box::new(advertiser.clone()),
        )
        .unwrap();
    let square = running.characteristic(&SQUARE).unwrap();
    (running, transport, advertiser, square)
}

/// Policy that parks every write of `"9"` until released
fn parking_square() -> (ComputedValue, mpsc::Receiver<()>, mpsc::Sender<()>) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);
    let policy = ComputedValue::custom("parking-square", b"0".to_vec(), move |input: &[u8]| {
        if input == b"9" {
            let _ = entered_tx.lock().send(());
            let _ = release_rx.lock().recv();
        }
        Transform::SquareDecimal.derive(input)
    });
    (policy, entered_rx, release_tx)
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_startup_layout_and_advertisement() {
    let (running, transport, advertiser, square) = start(ComputedValue::square_decimal());
    assert!(transport.is_bound());
    assert_eq!(square, 2);
    assert_eq!(running.table().len(), 4);
    assert!(running.table().is_sealed());

    let intent = advertiser.state.lock().current.clone().unwrap();
    assert_eq!(intent, *running.advertisement());
    assert_eq!(intent.local_name, "test-rs9116");
    assert_eq!(intent.service_uuids, vec![SERVICE]);
    assert!(intent.discoverable && intent.pairable);

    let peer = PeerId(1);
    assert_eq!(
        transport.deliver(peer, Request::read(3)),
        Some(Response::Value {
            handle: 3,
            value: b"Square".to_vec()
        })
    );
    running.stop();
}

#[test]
fn test_square_scenario() {
    let (running, transport, _advertiser, square) = start(ComputedValue::square_decimal());
    let peer = PeerId(7);

    let steps: [(&[u8], &[u8]); 2] = [(b"7", b"49"), (b"oops", b"0")];
    for (input, expected) in steps {
        assert_eq!(
            transport.deliver(peer, Request::write(square, input.to_vec())),
            Some(Response::WriteAck { handle: square })
        );
        assert_eq!(
            transport.deliver(peer, Request::read(square)),
            Some(Response::Value {
                handle: square,
                value: expected.to_vec()
            })
        );
    }
    assert_eq!(running.value_store().revision(square).unwrap(), 2);

    let stopped = running.stop();
    assert_eq!(stopped.stats().writes, 2);
    assert_eq!(stopped.stats().reads, 2);
}

#[test]
fn test_write_without_response_never_answers() {
    let (running, transport, _advertiser, square) = start(ComputedValue::square_decimal());
    let peer = PeerId(3);
    let notes = running.characteristic(&NOTES).unwrap();

    let commands = [
        Request::write_without_response(square, b"12".to_vec()),
        Request::write_without_response(notes, vec![0xEEu8; 40]),
        Request::write_without_response(0x0077, b"1".to_vec()),
        Request::write_without_response(3, b"read only".to_vec()),
    ];
    for command in commands {
        assert_eq!(transport.deliver(peer, command), None);
    }
    assert!(transport.sent().is_empty());

    assert_eq!(
        running.value_store().read(square).unwrap(),
        b"144".to_vec()
    );
    let stats = running.stats();
    assert_eq!(stats.writes, 1);
    assert_eq!(stats.suppressed, 3);
    running.stop();
}

#[test]
fn test_stop_drains_in_flight_exchange() {
    let (policy, entered, release) = parking_square();
    let (running, transport, advertiser, square) = start(policy);
    let endpoint = transport.endpoint();
    let store = Arc::clone(running.value_store());

    let writer = {
        let endpoint = endpoint.clone();
        thread::spawn(move || endpoint.submit(PeerId(1), Request::write(square, b"9".to_vec())))
    };
    entered.recv().unwrap();

    let stopper = thread::spawn(move || running.stop());
    wait_until(|| !endpoint.is_accepting());

    // Late arrivals are turned away while the drain is in progress
    let late = endpoint.submit(PeerId(2), Request::write(square, b"3".to_vec()));
    assert_eq!(
        late,
        Some(Response::Error {
            request_opcode: ATT_WRITE_REQ,
            handle: square,
            error: GattError::ShuttingDown,
        })
    );
    assert_eq!(
        endpoint.submit(PeerId(2), Request::write_without_response(square, b"4".to_vec())),
        None
    );
    assert!(!stopper.is_finished());
    assert!(transport.is_bound());

    release.send(()).unwrap();
    assert_eq!(
        writer.join().unwrap(),
        Some(Response::WriteAck { handle: square })
    );
    let stopped = stopper.join().unwrap();

    assert_eq!(store.read(square).unwrap(), b"81".to_vec());
    assert_eq!(store.revision(square).unwrap(), 1);
    assert_eq!(stopped.value_store().read(square).unwrap(), b"81".to_vec());
    assert!(!transport.is_bound());
    assert_eq!(transport.state.lock().unbinds, 1);
    assert_eq!(advertiser.state.lock().withdrawn, 1);
    assert!(advertiser.state.lock().current.is_none());
}

#[test]
fn test_disconnect_discards_response() {
    let (policy, entered, release) = parking_square();
    let (running, transport, _advertiser, square) = start(policy);
    let endpoint = transport.endpoint();
    endpoint.peer_connected(PeerId(5));

    let writer = {
        let endpoint = endpoint.clone();
        thread::spawn(move || endpoint.submit(PeerId(5), Request::write(square, b"9".to_vec())))
    };
    entered.recv().unwrap();
    endpoint.peer_disconnected(PeerId(5));
    release.send(()).unwrap();

    assert_eq!(writer.join().unwrap(), None);
    // The write itself was applied before the response was dropped
    assert_eq!(running.value_store().read(square).unwrap(), b"81".to_vec());
    running.stop();
}

#[test]
fn test_raw_pdus_and_mtu_exchange() {
    let (running, transport, _advertiser, square) = start(ComputedValue::square_decimal());
    let endpoint = transport.endpoint();
    let peer = PeerId(9);
    let notes = running.characteristic(&NOTES).unwrap();

    let mut write = vec![ATT_WRITE_REQ];
    write.extend_from_slice(&notes.to_le_bytes());
    write.extend_from_slice(&[0x11; 100]);
    let rsp = endpoint.submit_pdu(peer, &write).unwrap();
    assert_eq!(
        rsp,
        vec![
            ATT_ERROR_RSP,
            ATT_WRITE_REQ,
            notes as u8,
            0x00,
            ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH
        ]
    );

    assert_eq!(
        endpoint.submit_pdu(peer, &[ATT_EXCHANGE_MTU_REQ, 0xF7, 0x00]),
        Some(vec![ATT_EXCHANGE_MTU_RSP, 0x05, 0x02])
    );
    assert_eq!(endpoint.mtu(peer), 247);
    assert_eq!(running.value_store().max_value_len(), 23);
    assert_eq!(endpoint.submit_pdu(peer, &write), Some(vec![ATT_WRITE_RSP]));

    let mut read = vec![ATT_READ_REQ];
    read.extend_from_slice(&notes.to_le_bytes());
    let rsp = endpoint.submit_pdu(peer, &read).unwrap();
    assert_eq!(rsp.len(), 101);
    assert_eq!(rsp[0], ATT_READ_RSP);

    let mut command = vec![ATT_WRITE_CMD];
    command.extend_from_slice(&square.to_le_bytes());
    command.extend_from_slice(b"6");
    assert_eq!(endpoint.submit_pdu(peer, &command), None);
    assert_eq!(running.value_store().read(square).unwrap(), b"36".to_vec());

    // Unsupported requests get an error, malformed commands get nothing
    assert_eq!(
        endpoint.submit_pdu(peer, &[0x08, 0x01, 0x00, 0xFF, 0xFF, 0x03, 0x28]),
        Some(vec![ATT_ERROR_RSP, 0x08, 0x00, 0x00, ATT_ERROR_REQUEST_NOT_SUPPORTED])
    );
    assert_eq!(endpoint.submit_pdu(peer, &[ATT_WRITE_CMD, 0x02]), None);
    running.stop();
}

fn pdu(opcode: u8, handle: Handle, payload: &[u8]) -> Vec<u8> {
    let mut pdu = vec![opcode];
    pdu.extend_from_slice(&handle.to_le_bytes());
    pdu.extend_from_slice(payload);
    pdu
}

#[test]
fn test_mtu_is_per_peer() {
    let (running, transport, _advertiser, _square) = start(ComputedValue::square_decimal());
    let endpoint = transport.endpoint();
    let notes = running.characteristic(&NOTES).unwrap();
    let (wide, narrow) = (PeerId(1), PeerId(2));

    assert_eq!(
        endpoint.submit_pdu(wide, &[ATT_EXCHANGE_MTU_REQ, 0xF7, 0x00]),
        Some(vec![ATT_EXCHANGE_MTU_RSP, 0x05, 0x02])
    );
    assert_eq!(
        endpoint.submit_pdu(wide, &pdu(ATT_WRITE_REQ, notes, &[0x11; 100])),
        Some(vec![ATT_WRITE_RSP])
    );

    // A peer that never negotiated still gets responses sized for 23
    let rsp = endpoint.submit_pdu(narrow, &pdu(ATT_READ_REQ, notes, &[])).unwrap();
    assert_eq!(rsp.len(), 23);
    assert_eq!(endpoint.mtu(narrow), 23);

    // Its own exchange leaves the other link alone
    assert_eq!(
        endpoint.submit_pdu(narrow, &[ATT_EXCHANGE_MTU_REQ, 0x17, 0x00]),
        Some(vec![ATT_EXCHANGE_MTU_RSP, 0x05, 0x02])
    );
    assert_eq!(
        endpoint.submit_pdu(wide, &pdu(ATT_WRITE_REQ, notes, &[0x22; 50])),
        Some(vec![ATT_WRITE_RSP])
    );
    assert_eq!(
        endpoint.submit_pdu(narrow, &pdu(ATT_WRITE_REQ, notes, &[0x33; 50])),
        Some(vec![
            ATT_ERROR_RSP,
            ATT_WRITE_REQ,
            notes as u8,
            0x00,
            ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH
        ])
    );
    let rsp = endpoint.submit_pdu(wide, &pdu(ATT_READ_REQ, notes, &[])).unwrap();
    assert_eq!(rsp.len(), 51);
    assert_eq!((endpoint.mtu(wide), endpoint.mtu(narrow)), (247, 23));

    // A reconnect starts over at the default
    endpoint.peer_disconnected(wide);
    endpoint.peer_connected(wide);
    assert_eq!(endpoint.mtu(wide), 23);
    running.stop();
}

#[test]
fn test_full_length_value_is_readable_with_blobs() {
    init_logging();
    let transport = SpyTransport::default();
    let label: Vec<u8> = (b'a'..=b'w').collect();
    assert_eq!(label.len(), 23);
    let running = PeripheralController::default()
        .start(
            vec![
                Declaration::service(SERVICE),
                Declaration::characteristic(NOTES, Properties::READABLE)
                    .with_initial_value(label.clone()),
            ],
            Box::new(transport.clone()),
            Box::new(SpyAdvertiser::default()),
        )
        .unwrap();
    let endpoint = transport.endpoint();
    let notes = running.characteristic(&NOTES).unwrap();
    let peer = PeerId(4);

    let first = endpoint.submit_pdu(peer, &pdu(ATT_READ_REQ, notes, &[])).unwrap();
    assert_eq!(first[0], ATT_READ_RSP);
    assert_eq!(&first[1..], &label[..22]);

    let rest = endpoint
        .submit_pdu(peer, &pdu(ATT_READ_BLOB_REQ, notes, &22u16.to_le_bytes()))
        .unwrap();
    assert_eq!(rest, vec![ATT_READ_BLOB_RSP, b'w']);

    let mut received = first[1..].to_vec();
    received.extend_from_slice(&rest[1..]);
    assert_eq!(received, label);

    assert_eq!(
        endpoint.submit_pdu(peer, &pdu(ATT_READ_BLOB_REQ, notes, &24u16.to_le_bytes())),
        Some(vec![ATT_ERROR_RSP, ATT_READ_BLOB_REQ, notes as u8, 0x00, ATT_ERROR_INVALID_OFFSET])
    );
    assert_eq!(running.stats().reads, 2);
    running.stop();
}

#[test]
fn test_mtu_exchange_refused_after_stop() {
    let (running, transport, _advertiser, _square) = start(ComputedValue::square_decimal());
    let endpoint = transport.endpoint();
    let peer = PeerId(6);
    running.stop();

    assert_eq!(
        endpoint.submit_pdu(peer, &[ATT_EXCHANGE_MTU_REQ, 0xF7, 0x00]),
        Some(vec![ATT_ERROR_RSP, ATT_EXCHANGE_MTU_REQ, 0x00, 0x00, ATT_ERROR_SHUTTING_DOWN])
    );
    assert_eq!(endpoint.mtu(peer), 23);
}

#[test]
fn test_offered_mtu_is_capped() {
    init_logging();
    let transport = SpyTransport::default();
    let options = PeripheralOptions {
        server_mtu: 1024,
        ..PeripheralOptions::default()
    };
    let running = PeripheralController::new(options)
        .start(
            square_service(ComputedValue::square_decimal()),
            Box::new(transport.clone()),
            Box::new(SpyAdvertiser::default()),
        )
        .unwrap();
    let endpoint = transport.endpoint();
    assert_eq!(endpoint.server_mtu(), 517);
    assert_eq!(
        endpoint.submit_pdu(PeerId(1), &[ATT_EXCHANGE_MTU_REQ, 0xFF, 0xFF]),
        Some(vec![ATT_EXCHANGE_MTU_RSP, 0x05, 0x02])
    );
    assert_eq!(endpoint.mtu(PeerId(1)), 517);
    running.stop();
}

#[test]
fn test_transport_failure_is_propagated() {
    init_logging();
    let transport = SpyTransport::failing();
    let advertiser = SpyAdvertiser::default();
    let result = PeripheralController::default().start(
        square_service(ComputedValue::square_decimal()),
        Box::new(transport.clone()),
        Box::new(advertiser.clone()),
    );
    assert!(matches!(
        result,
        Err(StartupError::Transport(TransportError::Unavailable(_)))
    ));
    assert!(advertiser.state.lock().current.is_none());
}

#[test]
fn test_advertising_failure_unbinds() {
    init_logging();
    let transport = SpyTransport::default();
    let advertiser = SpyAdvertiser::default();
    advertiser.state.lock().fail = true;
    let result = PeripheralController::default().start(
        square_service(ComputedValue::square_decimal()),
        Box::new(transport.clone()),
        Box::new(advertiser),
    );
    assert!(matches!(result, Err(StartupError::Advertisement(_))));
    let state = transport.state.lock();
    assert_eq!((state.binds, state.unbinds), (1, 1));
    assert!(state.endpoint.is_none());
}

#[test]
fn test_invalid_definitions_never_bind() {
    init_logging();
    let transport = SpyTransport::default();
    let result = PeripheralController::default().start(
        vec![
            Declaration::service(SERVICE),
            Declaration::characteristic(SQUARE, Properties::empty()),
        ],
        Box::new(transport.clone()),
        Box::new(SpyAdvertiser::default()),
    );
    assert!(matches!(result, Err(StartupError::NoProperties(uuid)) if uuid == SQUARE));
    assert_eq!(transport.state.lock().binds, 0);
}

#[test]
fn test_independent_peripherals() {
    let (first, t1, _a1, square) = start(ComputedValue::square_decimal());
    let (second, t2, _a2, _) = start(ComputedValue::square_decimal());

    t1.deliver(PeerId(1), Request::write(square, b"5".to_vec()));
    assert_eq!(first.value_store().read(square).unwrap(), b"25".to_vec());
    assert_eq!(second.value_store().read(square).unwrap(), b"0".to_vec());
    assert!(t2.sent().is_empty());

    first.stop();
    second.stop();
}

#[test]
fn test_started_from_config() {
    init_logging();
    let config = PeripheralConfig::from_json(
        r#"{
            "adapter": { "alias": "square-box", "discoverable": false },
            "services": [{
                "uuid": "12345678-1234-5678-1234-56789abcdef1",
                "characteristics": [{
                    "uuid": "12345678-1234-5678-1234-56789abcdef2",
                    "flags": ["read", "write"],
                    "policy": "square-decimal",
                    "on_invalid": "reject"
                }]
            }]
        }"#,
    )
    .unwrap();
    let transport = SpyTransport::default();
    let advertiser = SpyAdvertiser::default();
    let running = PeripheralController::new(config.options())
        .start(
            config.declarations().unwrap(),
            Box::new(transport.clone()),
            Box::new(advertiser.clone()),
        )
        .unwrap();

    let intent = advertiser.state.lock().current.clone().unwrap();
    assert_eq!(intent.local_name, "square-box");
    assert!(!intent.discoverable);

    let square = running.characteristic(&SQUARE).unwrap();
    assert_eq!(
        transport.deliver(PeerId(1), Request::write(square, b"oops".to_vec())),
        Some(Response::Error {
            request_opcode: ATT_WRITE_REQ,
            handle: square,
            error: GattError::PolicyRejected(square),
        })
    );
    running.stop();
}
