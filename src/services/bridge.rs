//! Rendezvous between the orchestrator (producer) and the worker's response
//! inquiry (consumer), keyed by request id. Neither side may assume the
//! other arrives first: an early envelope is stashed until asked for, an
//! early inquiry parks until delivery, and both paths hand over exactly one
//! envelope to exactly one consumer.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::models::envelope::ResponseEnvelope;

pub const DEFAULT_CONSUMER_TIMEOUT: Duration = Duration::from_secs(30);

enum Slot {
    /// Envelope arrived before anyone asked for it.
    Stored(ResponseEnvelope),
    /// Consumer asked before the envelope arrived.
    Waiting(oneshot::Sender<ResponseEnvelope>),
    /// Consumer gave up; a late delivery is dropped on sight.
    TimedOut,
}

pub struct ResponseBridge {
    slots: DashMap<String, Slot>,
    consumer_timeout: Duration,
}

impl Default for ResponseBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBridge {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_CONSUMER_TIMEOUT)
    }

    pub fn with_timeout(consumer_timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            consumer_timeout,
        }
    }

    /// Hand the computed envelope to whoever is (or will be) asking for this
    /// request id. At most one delivery per id takes effect; duplicates and
    /// deliveries after the consumer timed out are logged and dropped.
    pub fn deliver(&self, request_id: &str, envelope: ResponseEnvelope) {
        match self.slots.entry(request_id.to_string()) {
            Entry::Occupied(occupied) => match occupied.get() {
                Slot::Waiting(_) => {
                    if let Slot::Waiting(sender) = occupied.remove() {
                        // The receiver may have just timed out; nothing to do
                        // then, it already resolved with a 504.
                        if sender.send(envelope).is_err() {
                            warn!(request_id, "consumer_gone_envelope_dropped");
                        } else {
                            debug!(request_id, "envelope_delivered_to_waiting_consumer");
                        }
                    }
                }
                Slot::TimedOut => {
                    occupied.remove();
                    warn!(request_id, "late_delivery_after_timeout_ignored");
                }
                Slot::Stored(_) => {
                    warn!(request_id, "duplicate_delivery_ignored");
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Stored(envelope));
                debug!(request_id, "envelope_stashed_for_pickup");
            }
        }
    }

    /// Wait for the envelope for this request id. Resolves immediately when
    /// one is already stashed; otherwise parks until delivery or until the
    /// consumer timeout elapses, in which case a 504 envelope is fabricated
    /// locally; this safety net never depends on the producer side.
    pub async fn await_response(&self, request_id: &str) -> ResponseEnvelope {
        let receiver = match self.slots.entry(request_id.to_string()) {
            Entry::Occupied(occupied) => match occupied.remove() {
                Slot::Stored(envelope) => {
                    debug!(request_id, "stashed_envelope_consumed");
                    return envelope;
                }
                // A second consumer for the same id displaces the first;
                // the displaced receiver resolves via its timeout arm.
                Slot::Waiting(_) | Slot::TimedOut => {
                    warn!(request_id, "consumer_replaced_existing_registration");
                    let (sender, receiver) = oneshot::channel();
                    self.slots
                        .insert(request_id.to_string(), Slot::Waiting(sender));
                    receiver
                }
            },
            Entry::Vacant(vacant) => {
                let (sender, receiver) = oneshot::channel();
                vacant.insert(Slot::Waiting(sender));
                receiver
            }
        };

        match timeout(self.consumer_timeout, receiver).await {
            Ok(Ok(envelope)) => envelope,
            _ => {
                warn!(request_id, "consumer_timed_out_fabricating_504");
                // Tombstone our own registration so a late delivery is
                // recognized and dropped; never touch a newer consumer's
                // live registration or a stash meant for it.
                match self.slots.entry(request_id.to_string()) {
                    Entry::Occupied(mut occupied) => {
                        if matches!(occupied.get(), Slot::Waiting(sender) if sender.is_closed()) {
                            occupied.insert(Slot::TimedOut);
                        }
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(Slot::TimedOut);
                    }
                }
                ResponseEnvelope::gateway_timeout(request_id)
            }
        }
    }

    /// Number of unpaired entries (stashed, waiting, or tombstoned).
    pub fn pending_count(&self) -> usize {
        self.slots.len()
    }
}
