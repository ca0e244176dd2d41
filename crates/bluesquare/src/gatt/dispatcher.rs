//! Request dispatcher
//!
//! Turns one decoded [`Request`] into at most one [`Response`]. Every request
//! is an independent exchange: it starts *pending*, is executed against the
//! value store, and ends *completed*. The dispatcher keeps no per-exchange
//! state beyond the effects left in the store.

use super::error::{GattError, GattResult};
use super::request::{Request, Response};
use super::store::ValueStore;
use super::types::WriteKind;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle of a single request/response exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// Received, not yet executed
    Pending(Request),
    /// Executed; `None` when the peer gets no answer
    Completed(Option<Response>),
}

impl Exchange {
    pub fn new(request: Request) -> Self {
        Exchange::Pending(request)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Exchange::Completed(_))
    }

    /// Finish a pending exchange with the outcome of its request.
    ///
    /// `Ok(Some(value))` is read data, `Ok(None)` a successful write.
    /// Completing twice keeps the first outcome.
    pub fn complete(self, outcome: GattResult<Option<Vec<u8>>>) -> Self {
        let request = match self {
            Exchange::Pending(request) => request,
            completed @ Exchange::Completed(_) => return completed,
        };

        let response = match outcome {
            Ok(Some(value)) if matches!(request, Request::ReadBlob { .. }) => Response::Blob {
                handle: request.handle(),
                value,
            },
            Ok(Some(value)) => Response::Value {
                handle: request.handle(),
                value,
            },
            Ok(None) => Response::WriteAck {
                handle: request.handle(),
            },
            Err(error) => Response::error(&request, error),
        };

        if request.expects_response() {
            Exchange::Completed(Some(response))
        } else {
            Exchange::Completed(None)
        }
    }

    /// The response to send, if this exchange has completed with one
    pub fn into_response(self) -> Option<Response> {
        match self {
            Exchange::Completed(response) => response,
            Exchange::Pending(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
    suppressed: AtomicU64,
}

/// Snapshot of dispatcher activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Successful reads
    pub reads: u64,
    /// Accepted writes of either kind
    pub writes: u64,
    /// Failures answered with an error response
    pub errors: u64,
    /// Failed writes without response, which nobody is told about
    pub suppressed: u64,
}

/// Executes requests against a [`ValueStore`]
#[derive(Debug)]
pub struct RequestDispatcher {
    store: Arc<ValueStore>,
    counters: Counters,
}

impl RequestDispatcher {
    pub fn new(store: Arc<ValueStore>) -> Self {
        Self {
            store,
            counters: Counters::default(),
        }
    }

    /// Execute `request` and produce its response.
    ///
    /// Returns `None` for writes without response, whether or not they
    /// succeeded.
    pub fn handle_request(&self, request: Request) -> Option<Response> {
        self.handle_request_limited(request, self.store.max_value_len())
    }

    /// Like [`handle_request`](Self::handle_request), with writes capped at
    /// `max_value_len` bytes instead of the store default
    pub fn handle_request_limited(&self, request: Request, max_value_len: usize) -> Option<Response> {
        let outcome = self.execute(&request, max_value_len);
        self.finish(Exchange::new(request), outcome)
    }

    /// Complete `request` with `error` without touching the store
    pub fn reject(&self, request: Request, error: GattError) -> Option<Response> {
        self.finish(Exchange::new(request), Err(error))
    }

    pub fn store(&self) -> &Arc<ValueStore> {
        &self.store
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            reads: self.counters.reads.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
        }
    }

    fn execute(&self, request: &Request, max_value_len: usize) -> GattResult<Option<Vec<u8>>> {
        match request {
            Request::Read { handle } => {
                let value = self.store.read(*handle)?;
                self.counters.reads.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Request::ReadBlob { handle, offset } => {
                let value = self.store.read_blob(*handle, *offset)?;
                self.counters.reads.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Request::Write {
                handle,
                value,
                kind,
            } => {
                self.store.write_limited(*handle, value, *kind, max_value_len)?;
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn finish(&self, exchange: Exchange, outcome: GattResult<Option<Vec<u8>>>) -> Option<Response> {
        if let (Exchange::Pending(request), Err(error)) = (&exchange, &outcome) {
            match request {
                Request::Write {
                    handle,
                    kind: WriteKind::WithoutResponse,
                    ..
                } => {
                    warn!("write command to 0x{:04x} dropped: {}", handle, error);
                    self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
                }
                _ => {
                    debug!("request {:?} failed: {}", request, error);
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let completed = exchange.complete(outcome);
        debug_assert!(completed.is_completed());
        completed.into_response()
    }
}
