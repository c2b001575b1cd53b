//! Last-request-wins bookkeeping for callers that fire pipeline runs faster
//! than they finish (for example a cluster-count slider).
//!
//! Runs share nothing, so a stale run is never cancelled, only ignored: take a
//! ticket before starting, and hand the result to [`RequestGate::accept`]
//! when it arrives.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues increasing request generations.
#[derive(Debug, Default)]
pub struct RequestGate {
    latest: AtomicU64,
}

/// Generation number of one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request; every earlier ticket becomes stale.
    pub fn issue(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }

    /// Keep `result` only if no newer request has been issued since `ticket`.
    pub fn accept<T>(&self, ticket: RequestTicket, result: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(result)
        } else {
            tracing::debug!(generation = ticket.0, "discarding stale result");
            None
        }
    }
}
