//! In-Memory Limit Order Book Engine
//!
//! Maintains, per tradable symbol, the resting buy and sell orders ranked by
//! price (time priority within a price), and publishes an event whenever the
//! best bid/ask price or the volume resting at it changes. No matching: buy
//! and sell levels rest independently even when they cross.
//!
//! # Features
//!
//! - **Price-Time Priority**: strict FIFO ordering within each price level
//! - **O(1) Deletion**: orders carry stable handles to their book, level and
//!   queue slot, so deletes never scan the book
//! - **Cached Top of Book**: best bid/ask change detection is a field
//!   comparison, not a recomputation
//! - **Event-Driven**: results and rejections are published through a
//!   pluggable sink (callback, channel, test recorder)
//! - **Comprehensive Monitoring**: built-in metrics with Prometheus support
//!
//! # Quick Start
//!
//! ```rust
//! use orderbook_exchange_engine::exchange::{Exchange, RecordingSink, Side};
//! use std::collections::HashSet;
//!
//! let symbols: HashSet<String> = ["AAPL".to_string()].into_iter().collect();
//! let sink = RecordingSink::new();
//! let mut exchange = Exchange::new(symbols, Box::new(sink.clone()));
//!
//! // Insert a bid; outcome and the top-of-book change arrive as events.
//! exchange.insert_order("AAPL", Side::Buy, 10000, 100, 1);
//! assert_eq!(sink.events().len(), 2); // OrderInserted + BestPriceChanged
//! ```
//!
//! # Architecture
//!
//! The engine is a strictly single-writer structure built from three
//! mutually consistent collections:
//!
//! 1. **Order Registry**: `HashMap<OrderId, Order>` — the canonical record
//!    for every resting order, plus the monotonic id allocator
//! 2. **Symbol Books**: per symbol, two `BTreeMap<Price, PriceLevel>` sides
//!    (asks best-first ascending, bids best-first descending) and a cached
//!    best bid/ask snapshot
//! 3. **Price Levels**: aggregate volume plus a linked FIFO of order ids
//!
//! Every insert or delete updates all three together, evicts levels the
//! moment they empty, and publishes events synchronously before returning.

pub mod exchange;
pub mod metrics;
pub mod utils;

// Re-export commonly used types
pub use exchange::{
    error::{DeleteStatus, InsertStatus},
    events::{ChannelSink, EventSink, ExchangeEvent, NullSink, RecordingSink},
    types::{Order, OrderId, Price, Side, TopOfBook, UserReference, Volume},
    Exchange,
};

pub use metrics::EngineMetrics;
