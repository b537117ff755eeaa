//! Core exchange engine module
//!
//! This module contains the order book data structures and the engine that
//! maintains resting orders, ranks price levels, and publishes top-of-book
//! change events.

pub mod book;
pub mod engine;
pub mod error;
pub mod events;
pub mod price_level;
pub mod registry;
pub mod types;

// Re-export main types for convenience
pub use book::{BookSide, SymbolBook};
pub use engine::{BookStats, Exchange};
pub use error::{DeleteStatus, InsertStatus};
pub use events::{ChannelSink, EventSink, ExchangeEvent, NullSink, RecordingSink};
pub use price_level::PriceLevel;
pub use registry::OrderRegistry;
pub use types::{Order, OrderId, Price, Side, TopOfBook, UserReference, Volume, NULL_ORDER_ID};
