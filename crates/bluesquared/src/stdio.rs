//! Line-oriented transport over stdin/stdout
//!
//! Each input line is one of
//!
//! ```text
//! [<peer>:]<hex PDU>     e.g. "0a0200" or "2:12020037"
//! connect <peer>
//! disconnect <peer>
//! ```
//!
//! Every response PDU is written as `<peer>:<hex>` on its own line.

use bluesquare::transport::{Endpoint, PeerId, Transport, TransportError};
use log::{debug, warn};
use parking_lot::Mutex;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Peer used for lines without a peer prefix
const DEFAULT_PEER: PeerId = PeerId(1);

#[derive(Debug, PartialEq, Eq)]
enum Line {
    Pdu(PeerId, Vec<u8>),
    Connect(PeerId),
    Disconnect(PeerId),
}

#[derive(Debug, thiserror::Error, PartialEq)]
enum LineError {
    #[error("invalid peer id {0:?}")]
    Peer(String),
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

fn parse_peer(text: &str) -> Result<PeerId, LineError> {
    text.trim()
        .parse()
        .map(PeerId)
        .map_err(|_| LineError::Peer(text.to_string()))
}

fn parse_line(line: &str) -> Result<Option<Line>, LineError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    if let Some(peer) = line.strip_prefix("connect ") {
        return Ok(Some(Line::Connect(parse_peer(peer)?)));
    }
    if let Some(peer) = line.strip_prefix("disconnect ") {
        return Ok(Some(Line::Disconnect(parse_peer(peer)?)));
    }

    let (peer, pdu) = match line.split_once(':') {
        Some((peer, pdu)) => (parse_peer(peer)?, pdu),
        None => (DEFAULT_PEER, line),
    };
    let pdu: String = pdu.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(Some(Line::Pdu(peer, hex::decode(pdu)?)))
}

/// Transport whose link is the process' standard streams
#[derive(Clone, Default)]
pub struct StdioTransport {
    endpoint: Arc<Mutex<Option<Endpoint>>>,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed `input` to the bound endpoint until EOF, writing replies to
    /// `output`.
    pub fn run(&self, input: impl BufRead, mut output: impl Write) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;
            let endpoint = match self.endpoint.lock().clone() {
                Some(endpoint) => endpoint,
                None => break,
            };

            match parse_line(&line) {
                Ok(Some(Line::Pdu(peer, pdu))) => {
                    if let Some(reply) = endpoint.submit_pdu(peer, &pdu) {
                        writeln!(output, "{}:{}", peer.0, hex::encode(reply))?;
                        output.flush()?;
                    }
                }
                Ok(Some(Line::Connect(peer))) => endpoint.peer_connected(peer),
                Ok(Some(Line::Disconnect(peer))) => endpoint.peer_disconnected(peer),
                Ok(None) => {}
                Err(err) => warn!("ignoring line {:?}: {}", line, err),
            }
        }
        debug!("input closed");
        Ok(())
    }
}

impl Transport for StdioTransport {
    fn bind(&mut self, endpoint: Endpoint) -> Result<(), TransportError> {
        let mut slot = self.endpoint.lock();
        if slot.is_some() {
            return Err(TransportError::AlreadyBound);
        }
        *slot = Some(endpoint);
        Ok(())
    }

    fn unbind(&mut self) {
        self.endpoint.lock().take();
    }
}
