//! Boundary between the server core and whatever carries ATT traffic
//!
//! A [`Transport`] is bound to an [`Endpoint`] when the peripheral starts.
//! From then on it feeds every inbound request through the endpoint and
//! sends back whatever response comes out.

use crate::att::constants::{ATT_DEFAULT_MTU, ATT_EXCHANGE_MTU_REQ, ATT_MAX_MTU};
use crate::att::types::{AttPacket, ErrorResponse, ExchangeMtuResponse};
use crate::att::{decode_pdu, is_command, InboundPdu};
use crate::gatt::{DispatchStats, GattError, Request, RequestDispatcher, Response};
use crate::peripheral::DrainGate;
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Identifies one connected peer for the lifetime of its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Errors reported by a [`Transport`]
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport is already bound")]
    AlreadyBound,

    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// External collaborator delivering requests from peers
pub trait Transport: Send {
    /// Start delivering inbound requests to `endpoint`
    fn bind(&mut self, endpoint: Endpoint) -> Result<(), TransportError>;

    /// Stop delivering requests and drop the endpoint
    fn unbind(&mut self);
}

/// One connection of one peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Session {
    id: u64,
    /// ATT MTU negotiated on this link
    mtu: u16,
}

#[derive(Debug)]
struct EndpointInner {
    dispatcher: Arc<RequestDispatcher>,
    gate: Arc<DrainGate>,
    /// Connection session per peer; responses are only delivered to the
    /// session the request arrived on
    sessions: Mutex<HashMap<PeerId, Session>>,
    next_session: AtomicU64,
    /// MTU this server offers in an MTU exchange
    server_mtu: u16,
}

/// Handle a transport uses to reach the running server core.
///
/// Cheap to clone; every clone talks to the same peripheral. Each peer has
/// its own negotiated MTU, which sizes its read responses and caps its
/// writes.
#[derive(Debug, Clone)]
pub struct Endpoint {
    inner: Arc<EndpointInner>,
}

impl Endpoint {
    pub(crate) fn new(dispatcher: Arc<RequestDispatcher>, gate: Arc<DrainGate>, server_mtu: u16) -> Self {
        Self {
            inner: Arc::new(EndpointInner {
                dispatcher,
                gate,
                sessions: Mutex::new(HashMap::new()),
                next_session: AtomicU64::new(1),
                server_mtu: server_mtu.clamp(ATT_DEFAULT_MTU, ATT_MAX_MTU),
            }),
        }
    }

    /// Run one exchange for `peer`.
    ///
    /// Returns `None` for writes without response, and when the peer
    /// disconnected before the exchange completed. Once the peripheral is
    /// stopping, requests are answered with [`GattError::ShuttingDown`].
    pub fn submit(&self, peer: PeerId, request: Request) -> Option<Response> {
        let session = self.session_of(peer);
        trace!("{} submitted {:?}", peer, request);

        let response = match self.inner.gate.enter() {
            Some(_admitted) => self
                .inner
                .dispatcher
                .handle_request_limited(request, usize::from(session.mtu)),
            None => {
                debug!("{} rejected: shutting down", peer);
                self.inner.dispatcher.reject(request, GattError::ShuttingDown)
            }
        };

        if self.inner.sessions.lock().get(&peer).map(|current| current.id) != Some(session.id) {
            debug!("{} disconnected mid-exchange, discarding response", peer);
            return None;
        }
        response
    }

    /// Decode a raw ATT PDU from `peer`, run it, and encode the reply.
    ///
    /// MTU exchanges are answered here and set the MTU of `peer`'s link.
    /// Undecodable PDUs get an error response unless they are commands.
    pub fn submit_pdu(&self, peer: PeerId, pdu: &[u8]) -> Option<Vec<u8>> {
        match decode_pdu(pdu) {
            Ok(InboundPdu::Request(request)) => {
                let mtu = self.session_of(peer).mtu;
                self.submit(peer, request).map(|response| response.to_pdu(mtu))
            }
            Ok(InboundPdu::ExchangeMtu { client_mtu }) => {
                let Some(_admitted) = self.inner.gate.enter() else {
                    debug!("{} MTU exchange rejected: shutting down", peer);
                    return Some(
                        ErrorResponse::new(
                            ATT_EXCHANGE_MTU_REQ,
                            0,
                            GattError::ShuttingDown.to_error_code(),
                        )
                        .serialize(),
                    );
                };
                self.mtu_changed(peer, client_mtu.min(self.inner.server_mtu));
                Some(
                    ExchangeMtuResponse {
                        server_mtu: self.inner.server_mtu,
                    }
                    .serialize(),
                )
            }
            Err(error) => {
                debug!("{} sent undecodable PDU: {}", peer, error);
                if is_command(error.request_opcode()) {
                    None
                } else {
                    Some(ErrorResponse::from_decode_error(&error).serialize())
                }
            }
        }
    }

    /// Apply a negotiated MTU to `peer`'s link, clamped to the ATT limits.
    /// Returns the MTU now in effect for that peer.
    pub fn mtu_changed(&self, peer: PeerId, mtu: u16) -> u16 {
        let applied = mtu.clamp(ATT_DEFAULT_MTU, ATT_MAX_MTU);
        let mut sessions = self.inner.sessions.lock();
        let session = sessions
            .entry(peer)
            .or_insert_with(|| self.new_session());
        session.mtu = applied;
        debug!("{} MTU now {} (requested {})", peer, applied, mtu);
        applied
    }

    /// MTU used to size responses to `peer`
    pub fn mtu(&self, peer: PeerId) -> u16 {
        self.inner
            .sessions
            .lock()
            .get(&peer)
            .map_or_else(|| self.default_mtu(), |session| session.mtu)
    }

    /// MTU offered to peers in an MTU exchange
    pub fn server_mtu(&self) -> u16 {
        self.inner.server_mtu
    }

    pub fn peer_connected(&self, peer: PeerId) {
        let session = self.new_session();
        self.inner.sessions.lock().insert(peer, session);
        debug!("{} connected", peer);
    }

    /// Forget `peer`. Responses to its in-flight exchanges are dropped;
    /// writes they already applied stay applied.
    pub fn peer_disconnected(&self, peer: PeerId) {
        if self.inner.sessions.lock().remove(&peer).is_some() {
            debug!("{} disconnected", peer);
        }
    }

    /// Whether new requests are still being executed
    pub fn is_accepting(&self) -> bool {
        self.inner.gate.is_open()
    }

    pub fn stats(&self) -> DispatchStats {
        self.inner.dispatcher.stats()
    }

    /// Session of `peer`, connecting it implicitly on first contact
    fn session_of(&self, peer: PeerId) -> Session {
        let mut sessions = self.inner.sessions.lock();
        *sessions.entry(peer).or_insert_with(|| self.new_session())
    }

    fn new_session(&self) -> Session {
        Session {
            id: self.inner.next_session.fetch_add(1, Ordering::Relaxed),
            mtu: self.default_mtu(),
        }
    }

    /// MTU of a link that has not negotiated one
    fn default_mtu(&self) -> u16 {
        u16::try_from(self.inner.dispatcher.store().max_value_len()).unwrap_or(ATT_MAX_MTU)
    }
}
