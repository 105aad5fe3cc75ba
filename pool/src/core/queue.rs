//! Per-tier FIFO of requests waiting for a worker

use serde_json::Value;
use shared::Tier;
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::PoolResult;

/// Completion channel handed back to the submitting caller
pub type Responder = oneshot::Sender<PoolResult<Value>>;

/// One caller's in-flight job
#[derive(Debug)]
pub struct PendingRequest {
    pub id: Uuid,
    pub tier: Tier,
    pub payload: Value,
    pub enqueued_at: Instant,
    responder: Responder,
}

impl PendingRequest {
    /// Create a request with a fresh correlation id and its completion receiver
    pub fn new(tier: Tier, payload: Value) -> (Self, oneshot::Receiver<PoolResult<Value>>) {
        let (responder, receiver) = oneshot::channel();
        let request = Self {
            id: Uuid::new_v4(),
            tier,
            payload,
            enqueued_at: Instant::now(),
            responder,
        };
        (request, receiver)
    }

    /// Instant after which a still-queued request gives up
    pub fn queue_deadline(&self) -> Instant {
        self.enqueued_at + self.tier.timeout()
    }

    /// Whether the submitting caller stopped waiting
    pub fn is_abandoned(&self) -> bool {
        self.responder.is_closed()
    }

    /// Complete the request; returns false when the caller is gone
    pub fn complete(self, outcome: PoolResult<Value>) -> bool {
        self.responder.send(outcome).is_ok()
    }

    /// Split into the parts an assignment needs
    pub fn into_parts(self) -> (Uuid, Value, Responder) {
        (self.id, self.payload, self.responder)
    }
}

/// Requests waiting for one tier's workers, in submission order
#[derive(Debug, Default)]
pub struct TierQueue {
    items: VecDeque<PendingRequest>,
}

impl TierQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: PendingRequest) {
        self.items.push_back(request);
    }

    /// Put a request back at the head, keeping its place in line
    pub fn push_front(&mut self, request: PendingRequest) {
        self.items.push_front(request);
    }

    pub fn pop(&mut self) -> Option<PendingRequest> {
        self.items.pop_front()
    }

    /// Withdraw a specific request, e.g. when its queue deadline passed
    pub fn remove(&mut self, id: Uuid) -> Option<PendingRequest> {
        let index = self.items.iter().position(|request| request.id == id)?;
        self.items.remove(index)
    }

    pub fn drain(&mut self) -> Vec<PendingRequest> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
