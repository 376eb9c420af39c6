use chrono::{DateTime, Utc};

use crate::controller::Request;

/// A request held back until the bound clock reaches its apply time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredRequest {
    pub request: Request,
    pub apply_at: DateTime<Utc>,
}

/// Single-slot deferred queue. Scheduling replaces any pending entry and a
/// successfully transmitted immediate request cancels it; there is never
/// more than one request waiting.
#[derive(Debug, Default)]
pub struct DeferredSlot {
    pending: Option<DeferredRequest>,
}

impl DeferredSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry that was replaced, if any.
    pub fn schedule(&mut self, request: Request, apply_at: DateTime<Utc>) -> Option<DeferredRequest> {
        self.pending.replace(DeferredRequest { request, apply_at })
    }

    pub fn cancel(&mut self) -> Option<DeferredRequest> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<&DeferredRequest> {
        self.pending.as_ref()
    }

    /// Returns the pending request once its time has come. The entry stays
    /// in the slot until the caller commits it with `cancel`, so a request
    /// whose transmit fails is retried instead of lost.
    pub fn peek_due(&self, now: DateTime<Utc>) -> Option<Request> {
        self.pending
            .filter(|entry| entry.apply_at <= now)
            .map(|entry| entry.request)
    }
}
