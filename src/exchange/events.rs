use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::exchange::error::{DeleteStatus, InsertStatus};
use crate::exchange::types::{OrderId, Price, UserReference, Volume};

/// Events published by the engine, in call order, synchronously within the
/// triggering `insert_order`/`delete_order` call.
///
/// When an operation also moves the top of book, the `OrderInserted` or
/// `OrderDeleted` event is published first and the `BestPriceChanged` event
/// second. `BestPriceChanged` always carries the full current top of book for
/// the symbol, both sides, with `(0, 0)` for an empty side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeEvent {
    OrderInserted {
        user_reference: UserReference,
        status: InsertStatus,
        /// Meaningful only when `status` is `Ok`; otherwise `NULL_ORDER_ID`.
        order_id: OrderId,
    },
    OrderDeleted {
        order_id: OrderId,
        status: DeleteStatus,
    },
    BestPriceChanged {
        symbol: String,
        best_bid_price: Price,
        best_bid_volume: Volume,
        best_ask_price: Price,
        best_ask_volume: Volume,
    },
}

/// Destination for engine events, supplied at engine construction.
///
/// Delivery happens on the calling context; transports that need queuing or
/// fan-out own that concern behind this trait.
pub trait EventSink: Send {
    fn publish(&self, event: ExchangeEvent);
}

/// Sink that appends every event to a shared vector.
///
/// Clones share the same storage, so a test can keep a handle while the
/// engine owns the sink.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ExchangeEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn events(&self) -> Vec<ExchangeEvent> {
        self.events.lock().clone()
    }

    /// Drain and return the recorded events.
    pub fn take(&self) -> Vec<ExchangeEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: ExchangeEvent) {
        self.events.lock().push(event);
    }
}

/// Sink that forwards events over a crossbeam channel to a consumer thread.
pub struct ChannelSink {
    sender: Sender<ExchangeEvent>,
}

impl ChannelSink {
    /// Create an unbounded sink together with its receiving end.
    pub fn unbounded() -> (Self, Receiver<ExchangeEvent>) {
        let (sender, receiver) = channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: ExchangeEvent) {
        if self.sender.send(event).is_err() {
            warn!("event receiver dropped, discarding event");
        }
    }
}

/// Sink that discards everything. Used by benchmarks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: ExchangeEvent) {}
}
