use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type OrderId = u64;
pub type Price = u64; // Price in ticks (e.g., 1 tick = 0.01 cents)
pub type Volume = u64;

/// Opaque caller-supplied token, echoed back verbatim in events.
pub type UserReference = u64;

/// Order id value reported in events when no order was created.
pub const NULL_ORDER_ID: OrderId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A resting order. Owned by the [`OrderRegistry`](crate::exchange::registry::OrderRegistry)
/// for its entire lifetime; the (symbol, side, price) triple identifies the
/// book and level it rests in, and the id its slot in the level queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub price: Price,
    pub volume: Volume,
    pub user_reference: UserReference,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    pub fn new(
        id: OrderId,
        symbol: String,
        side: Side,
        price: Price,
        volume: Volume,
        user_reference: UserReference,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            price,
            volume,
            user_reference,
            timestamp: Utc::now(),
        }
    }
}

/// Cached best bid/ask snapshot for one symbol.
///
/// A side with no resting levels reports `(0, 0)`. Kept cached on the book so
/// "did the top change" detection is a field comparison, not a recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopOfBook {
    pub best_bid_price: Price,
    pub best_bid_volume: Volume,
    pub best_ask_price: Price,
    pub best_ask_volume: Volume,
}

impl TopOfBook {
    pub fn new(
        best_bid_price: Price,
        best_bid_volume: Volume,
        best_ask_price: Price,
        best_ask_volume: Volume,
    ) -> Self {
        Self {
            best_bid_price,
            best_bid_volume,
            best_ask_price,
            best_ask_volume,
        }
    }

    /// Returns `true` if there is no bid and no ask.
    pub fn is_empty(&self) -> bool {
        self.best_bid_price == 0 && self.best_ask_price == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_creation() {
        let order = Order::new(1, "AAPL".to_string(), Side::Buy, 15000, 100, 42);

        assert_eq!(order.id, 1);
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.price, 15000);
        assert_eq!(order.volume, 100);
        assert_eq!(order.user_reference, 42);
    }

    #[test]
    fn test_side_display_and_opposite() {
        assert_eq!(Side::Buy.to_string(), "BUY");
        assert_eq!(Side::Sell.to_string(), "SELL");
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_top_of_book_sentinel() {
        let empty = TopOfBook::default();
        assert!(empty.is_empty());
        assert_eq!(empty, TopOfBook::new(0, 0, 0, 0));

        let top = TopOfBook::new(10000, 100, 10100, 50);
        assert!(!top.is_empty());
        assert_ne!(top, empty);
    }
}
