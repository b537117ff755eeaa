use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info};

use crate::exchange::book::SymbolBook;
use crate::exchange::error::{DeleteStatus, InsertStatus};
use crate::exchange::events::{EventSink, ExchangeEvent};
use crate::exchange::registry::OrderRegistry;
use crate::exchange::types::{
    Order, OrderId, Price, Side, TopOfBook, UserReference, Volume, NULL_ORDER_ID,
};

/// The exchange engine: validates inserts, allocates order ids, routes
/// operations to the right book and level, and publishes events.
///
/// Strictly single-writer: every call runs to completion, including event
/// publication, before returning. Callers needing concurrent access serialize
/// externally. Failures are reported through the event channel, never as
/// return values, so success and failure are uniform terminal outcomes of one
/// call.
pub struct Exchange {
    symbols: HashSet<String>,
    books: HashMap<String, SymbolBook>,
    registry: OrderRegistry,
    sink: Box<dyn EventSink>,
}

impl Exchange {
    /// Build an engine over an externally supplied, read-only symbol set.
    pub fn new(symbols: HashSet<String>, sink: Box<dyn EventSink>) -> Self {
        info!("creating exchange engine with {} symbols", symbols.len());
        Self {
            symbols,
            books: HashMap::new(),
            registry: OrderRegistry::new(),
            sink,
        }
    }

    /// Insert a limit order. Outcome arrives as `OrderInserted`, followed by
    /// `BestPriceChanged` iff the symbol's top of book moved.
    ///
    /// Validation order: symbol, then price, then volume; the first failing
    /// check wins and nothing is mutated.
    pub fn insert_order(
        &mut self,
        symbol: &str,
        side: Side,
        price: Price,
        volume: Volume,
        user_reference: UserReference,
    ) {
        if !self.symbols.contains(symbol) {
            self.reject_insert(user_reference, InsertStatus::SymbolNotFound);
            return;
        }
        if price == 0 {
            self.reject_insert(user_reference, InsertStatus::InvalidPrice);
            return;
        }
        if volume == 0 {
            self.reject_insert(user_reference, InsertStatus::InvalidVolume);
            return;
        }

        let order_id = self.registry.allocate();
        let order = Order::new(
            order_id,
            symbol.to_string(),
            side,
            price,
            volume,
            user_reference,
        );

        let book = self
            .books
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolBook::new(symbol.to_string()));
        book.side_mut(side).level_mut(price).add_order(order_id, volume);

        // The inserted level is the top either because it improved the best
        // price or because it merged into the existing best level; both move
        // the cached snapshot.
        let best_changed = book.is_top(side, price) && book.refresh_best(side);
        let top = book.top_of_book();

        self.registry.insert(order);
        debug!(
            "inserted order {} {} {}@{} x{}",
            order_id, symbol, side, price, volume
        );

        self.sink.publish(ExchangeEvent::OrderInserted {
            user_reference,
            status: InsertStatus::Ok,
            order_id,
        });
        if best_changed {
            self.publish_best_price(symbol, top);
        }
    }

    /// Delete a resting order by id. Outcome arrives as `OrderDeleted`,
    /// followed by `BestPriceChanged` iff the symbol's top of book moved.
    pub fn delete_order(&mut self, order_id: OrderId) {
        let Some(order) = self.registry.remove(order_id) else {
            debug!("delete for unknown order id {}", order_id);
            self.sink.publish(ExchangeEvent::OrderDeleted {
                order_id,
                status: DeleteStatus::OrderNotFound,
            });
            return;
        };

        let Some(book) = self.books.get_mut(&order.symbol) else {
            error!("no book for symbol {} of order {}", order.symbol, order_id);
            return;
        };

        let side_book = book.side_mut(order.side);
        let was_top = side_book.best_price() == Some(order.price);

        let Some(level) = side_book.get_mut(order.price) else {
            error!("no {} level at {} for order {}", order.side, order.price, order_id);
            return;
        };
        level.remove_order(order_id, order.volume);
        if level.is_empty() {
            side_book.remove_level(order.price);
        }

        let best_changed = was_top && book.refresh_best(order.side);
        let top = book.top_of_book();
        debug!(
            "deleted order {} {} {}@{} x{}",
            order_id, order.symbol, order.side, order.price, order.volume
        );

        self.sink.publish(ExchangeEvent::OrderDeleted {
            order_id,
            status: DeleteStatus::Ok,
        });
        if best_changed {
            self.publish_best_price(&order.symbol, top);
        }
    }

    /// Cached top of book for a symbol; `None` before the first order.
    ///
    /// Read-only; call between operations, not during one.
    pub fn top_of_book(&self, symbol: &str) -> Option<TopOfBook> {
        self.books.get(symbol).map(|book| book.top_of_book())
    }

    pub fn book(&self, symbol: &str) -> Option<&SymbolBook> {
        self.books.get(symbol)
    }

    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.registry.get(order_id)
    }

    /// Total resting orders across all symbols.
    pub fn resting_orders(&self) -> usize {
        self.registry.len()
    }

    pub fn symbols(&self) -> &HashSet<String> {
        &self.symbols
    }

    pub fn book_stats(&self, symbol: &str) -> Option<BookStats> {
        self.books.get(symbol).map(|book| {
            let resting_orders = book
                .side(Side::Buy)
                .levels()
                .chain(book.side(Side::Sell).levels())
                .map(|level| level.order_count())
                .sum();
            BookStats {
                symbol: symbol.to_string(),
                resting_orders,
                bid_levels: book.side(Side::Buy).len(),
                ask_levels: book.side(Side::Sell).len(),
                top: book.top_of_book(),
            }
        })
    }

    fn reject_insert(&self, user_reference: UserReference, status: InsertStatus) {
        debug!("rejecting insert (user ref {}): {}", user_reference, status);
        self.sink.publish(ExchangeEvent::OrderInserted {
            user_reference,
            status,
            order_id: NULL_ORDER_ID,
        });
    }

    fn publish_best_price(&self, symbol: &str, top: TopOfBook) {
        self.sink.publish(ExchangeEvent::BestPriceChanged {
            symbol: symbol.to_string(),
            best_bid_price: top.best_bid_price,
            best_bid_volume: top.best_bid_volume,
            best_ask_price: top.best_ask_price,
            best_ask_volume: top.best_ask_volume,
        });
    }
}

/// Shape of one symbol's book, for reporting.
#[derive(Debug, Clone)]
pub struct BookStats {
    pub symbol: String,
    pub resting_orders: usize,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub top: TopOfBook,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::events::RecordingSink;
    use proptest::prelude::*;

    fn exchange() -> (Exchange, RecordingSink) {
        let sink = RecordingSink::new();
        let symbols: HashSet<String> = ["AAPL", "MSFT", "GOOG"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        (Exchange::new(symbols, Box::new(sink.clone())), sink)
    }

    fn best_price(
        symbol: &str,
        bid: Price,
        bid_volume: Volume,
        ask: Price,
        ask_volume: Volume,
    ) -> ExchangeEvent {
        ExchangeEvent::BestPriceChanged {
            symbol: symbol.to_string(),
            best_bid_price: bid,
            best_bid_volume: bid_volume,
            best_ask_price: ask,
            best_ask_volume: ask_volume,
        }
    }

    fn inserted_id(event: &ExchangeEvent) -> OrderId {
        match event {
            ExchangeEvent::OrderInserted {
                status: InsertStatus::Ok,
                order_id,
                ..
            } => *order_id,
            other => panic!("expected successful OrderInserted, got {:?}", other),
        }
    }

    fn best_price_events(events: &[ExchangeEvent]) -> Vec<ExchangeEvent> {
        events
            .iter()
            .filter(|e| matches!(e, ExchangeEvent::BestPriceChanged { .. }))
            .cloned()
            .collect()
    }

    #[test]
    fn test_insert_unknown_symbol_rejected() {
        let (mut exchange, sink) = exchange();
        exchange.insert_order("INVALID", Side::Buy, 100, 10, 2);

        assert_eq!(
            sink.take(),
            vec![ExchangeEvent::OrderInserted {
                user_reference: 2,
                status: InsertStatus::SymbolNotFound,
                order_id: NULL_ORDER_ID,
            }]
        );
        assert_eq!(exchange.resting_orders(), 0);
    }

    #[test]
    fn test_insert_invalid_price_rejected() {
        let (mut exchange, sink) = exchange();
        exchange.insert_order("AAPL", Side::Buy, 0, 10, 3);

        assert_eq!(
            sink.take(),
            vec![ExchangeEvent::OrderInserted {
                user_reference: 3,
                status: InsertStatus::InvalidPrice,
                order_id: NULL_ORDER_ID,
            }]
        );
    }

    #[test]
    fn test_insert_invalid_volume_rejected() {
        let (mut exchange, sink) = exchange();
        exchange.insert_order("AAPL", Side::Sell, 100, 0, 4);

        assert_eq!(
            sink.take(),
            vec![ExchangeEvent::OrderInserted {
                user_reference: 4,
                status: InsertStatus::InvalidVolume,
                order_id: NULL_ORDER_ID,
            }]
        );
    }

    #[test]
    fn test_first_failing_validation_wins() {
        let (mut exchange, sink) = exchange();
        // Bad symbol, price and volume at once: symbol is checked first.
        exchange.insert_order("INVALID", Side::Buy, 0, 0, 5);

        assert_eq!(
            sink.take(),
            vec![ExchangeEvent::OrderInserted {
                user_reference: 5,
                status: InsertStatus::SymbolNotFound,
                order_id: NULL_ORDER_ID,
            }]
        );
    }

    #[test]
    fn test_delete_unknown_order() {
        let (mut exchange, sink) = exchange();
        exchange.delete_order(999);

        assert_eq!(
            sink.take(),
            vec![ExchangeEvent::OrderDeleted {
                order_id: 999,
                status: DeleteStatus::OrderNotFound,
            }]
        );

        // Re-deleting is just as silent on the book.
        exchange.delete_order(999);
        assert_eq!(
            sink.take(),
            vec![ExchangeEvent::OrderDeleted {
                order_id: 999,
                status: DeleteStatus::OrderNotFound,
            }]
        );
    }

    #[test]
    fn test_insert_on_fresh_symbol() {
        let (mut exchange, sink) = exchange();
        exchange.insert_order("AAPL", Side::Buy, 100, 10, 1);

        let events = sink.take();
        assert_eq!(events.len(), 2);
        assert_eq!(inserted_id(&events[0]), 1);
        assert_eq!(events[1], best_price("AAPL", 100, 10, 0, 0));
        assert_eq!(
            exchange.top_of_book("AAPL"),
            Some(TopOfBook::new(100, 10, 0, 0))
        );
    }

    #[test]
    fn test_best_price_lifecycle() {
        let (mut exchange, sink) = exchange();

        exchange.insert_order("AAPL", Side::Buy, 100, 10, 6);
        let buy_events = sink.take();
        assert_eq!(buy_events[1], best_price("AAPL", 100, 10, 0, 0));

        exchange.insert_order("AAPL", Side::Sell, 90, 5, 7);
        let sell_events = sink.take();
        let sell_id = inserted_id(&sell_events[0]);
        assert_eq!(sell_events[1], best_price("AAPL", 100, 10, 90, 5));

        // Worse ask: rests behind the top, no best-price event.
        exchange.insert_order("AAPL", Side::Sell, 95, 8, 7);
        let worse_events = sink.take();
        assert_eq!(worse_events.len(), 1);
        inserted_id(&worse_events[0]);

        // Deleting the best ask promotes the 95 level.
        exchange.delete_order(sell_id);
        let delete_events = sink.take();
        assert_eq!(
            delete_events,
            vec![
                ExchangeEvent::OrderDeleted {
                    order_id: sell_id,
                    status: DeleteStatus::Ok,
                },
                best_price("AAPL", 100, 10, 95, 8),
            ]
        );
    }

    #[test]
    fn test_better_bid_fires_worse_bid_does_not() {
        let (mut exchange, sink) = exchange();

        exchange.insert_order("AAPL", Side::Buy, 100, 10, 1);
        sink.take();

        exchange.insert_order("AAPL", Side::Buy, 90, 10, 2);
        assert!(best_price_events(&sink.take()).is_empty());

        exchange.insert_order("AAPL", Side::Buy, 110, 3, 3);
        assert_eq!(
            best_price_events(&sink.take()),
            vec![best_price("AAPL", 110, 3, 0, 0)]
        );
    }

    #[test]
    fn test_same_price_level_accumulates_volume() {
        let (mut exchange, sink) = exchange();

        exchange.insert_order("MSFT", Side::Buy, 100, 10, 1);
        exchange.insert_order("MSFT", Side::Buy, 100, 5, 2);
        exchange.insert_order("MSFT", Side::Buy, 100, 7, 3);

        let events = sink.take();
        let ids: Vec<OrderId> = events
            .iter()
            .filter(|e| matches!(e, ExchangeEvent::OrderInserted { .. }))
            .map(inserted_id)
            .collect();
        assert_eq!(
            best_price_events(&events),
            vec![
                best_price("MSFT", 100, 10, 0, 0),
                best_price("MSFT", 100, 15, 0, 0),
                best_price("MSFT", 100, 22, 0, 0),
            ]
        );

        // Delete the middle order: volume drops, price holds.
        exchange.delete_order(ids[1]);
        assert_eq!(
            best_price_events(&sink.take()),
            vec![best_price("MSFT", 100, 17, 0, 0)]
        );

        exchange.delete_order(ids[2]);
        assert_eq!(
            best_price_events(&sink.take()),
            vec![best_price("MSFT", 100, 10, 0, 0)]
        );

        // Already deleted: no state change, no best-price event.
        exchange.delete_order(ids[2]);
        assert_eq!(
            sink.take(),
            vec![ExchangeEvent::OrderDeleted {
                order_id: ids[2],
                status: DeleteStatus::OrderNotFound,
            }]
        );

        // Draining the last order resets the side to the sentinel, and the
        // event is not suppressed.
        exchange.delete_order(ids[0]);
        assert_eq!(
            best_price_events(&sink.take()),
            vec![best_price("MSFT", 0, 0, 0, 0)]
        );
        assert_eq!(exchange.resting_orders(), 0);
    }

    #[test]
    fn test_delete_below_top_is_silent() {
        let (mut exchange, sink) = exchange();

        exchange.insert_order("AAPL", Side::Buy, 110, 10, 1);
        exchange.insert_order("AAPL", Side::Buy, 100, 5, 2);
        let ids: Vec<OrderId> = sink
            .take()
            .iter()
            .filter(|e| matches!(e, ExchangeEvent::OrderInserted { .. }))
            .map(inserted_id)
            .collect();

        exchange.delete_order(ids[1]);
        assert_eq!(
            sink.take(),
            vec![ExchangeEvent::OrderDeleted {
                order_id: ids[1],
                status: DeleteStatus::Ok,
            }]
        );
        assert_eq!(
            exchange.top_of_book("AAPL"),
            Some(TopOfBook::new(110, 10, 0, 0))
        );
    }

    #[test]
    fn test_insert_then_delete_restores_top() {
        let (mut exchange, sink) = exchange();

        exchange.insert_order("AAPL", Side::Buy, 100, 10, 1);
        exchange.insert_order("AAPL", Side::Sell, 120, 4, 1);
        sink.take();
        let before = exchange.top_of_book("AAPL").unwrap();

        exchange.insert_order("AAPL", Side::Buy, 105, 3, 2);
        let id = inserted_id(&sink.take()[0]);
        exchange.delete_order(id);
        sink.take();

        assert_eq!(exchange.top_of_book("AAPL"), Some(before));
    }

    #[test]
    fn test_crossed_sides_do_not_interact() {
        let (mut exchange, sink) = exchange();

        // Bid above ask: the two levels rest independently, nothing matches.
        exchange.insert_order("AAPL", Side::Buy, 100, 10, 1);
        exchange.insert_order("AAPL", Side::Sell, 90, 5, 2);
        sink.take();

        assert_eq!(exchange.resting_orders(), 2);
        assert_eq!(
            exchange.top_of_book("AAPL"),
            Some(TopOfBook::new(100, 10, 90, 5))
        );
    }

    #[test]
    fn test_order_ids_strictly_increase() {
        let (mut exchange, sink) = exchange();

        exchange.insert_order("AAPL", Side::Buy, 100, 10, 1);
        let first = inserted_id(&sink.take()[0]);

        exchange.delete_order(first);
        sink.take();

        exchange.insert_order("GOOG", Side::Sell, 200, 5, 2);
        let second = inserted_id(&sink.take()[0]);
        assert!(second > first);

        // Rejected inserts do not consume ids.
        exchange.insert_order("INVALID", Side::Buy, 100, 10, 3);
        sink.take();
        exchange.insert_order("AAPL", Side::Buy, 100, 10, 4);
        let third = inserted_id(&sink.take()[0]);
        assert_eq!(third, second + 1);
    }

    #[test]
    fn test_symbols_are_independent() {
        let (mut exchange, sink) = exchange();

        exchange.insert_order("AAPL", Side::Buy, 100, 10, 1);
        exchange.insert_order("MSFT", Side::Buy, 200, 20, 2);
        let events = sink.take();

        assert_eq!(
            best_price_events(&events),
            vec![
                best_price("AAPL", 100, 10, 0, 0),
                best_price("MSFT", 200, 20, 0, 0),
            ]
        );
        assert_eq!(
            exchange.top_of_book("AAPL"),
            Some(TopOfBook::new(100, 10, 0, 0))
        );
        assert_eq!(
            exchange.top_of_book("MSFT"),
            Some(TopOfBook::new(200, 20, 0, 0))
        );
        assert_eq!(exchange.top_of_book("GOOG"), None);
    }

    #[test]
    fn test_multi_level_lifecycle() {
        let (mut exchange, sink) = exchange();

        exchange.insert_order("MSFT", Side::Buy, 100, 10, 1);
        exchange.insert_order("MSFT", Side::Buy, 110, 15, 2);
        exchange.insert_order("MSFT", Side::Sell, 90, 10, 3);
        exchange.insert_order("MSFT", Side::Sell, 100, 10, 4);
        exchange.insert_order("MSFT", Side::Buy, 100, 15, 5);
        exchange.insert_order("MSFT", Side::Sell, 90, 5, 6);

        let events = sink.take();
        let ids: Vec<OrderId> = events
            .iter()
            .filter(|e| matches!(e, ExchangeEvent::OrderInserted { .. }))
            .map(inserted_id)
            .collect();
        assert_eq!(
            best_price_events(&events),
            vec![
                best_price("MSFT", 100, 10, 0, 0),
                best_price("MSFT", 110, 15, 0, 0),
                best_price("MSFT", 110, 15, 90, 10),
                best_price("MSFT", 110, 15, 90, 15),
            ]
        );

        // Below-top bid: silent.
        exchange.delete_order(ids[0]);
        assert!(best_price_events(&sink.take()).is_empty());

        // Top bid gone: next bid level takes over.
        exchange.delete_order(ids[1]);
        assert_eq!(
            best_price_events(&sink.take()),
            vec![best_price("MSFT", 100, 15, 90, 15)]
        );

        // Partial drain of the top ask level.
        exchange.delete_order(ids[2]);
        assert_eq!(
            best_price_events(&sink.take()),
            vec![best_price("MSFT", 100, 15, 90, 5)]
        );

        // Last bid out: bid side falls to the sentinel.
        exchange.delete_order(ids[4]);
        assert_eq!(
            best_price_events(&sink.take()),
            vec![best_price("MSFT", 0, 0, 90, 5)]
        );

        // Ask level at 90 empties; 100 becomes best, then everything is gone.
        exchange.delete_order(ids[5]);
        assert_eq!(
            best_price_events(&sink.take()),
            vec![best_price("MSFT", 0, 0, 100, 10)]
        );
        exchange.delete_order(ids[3]);
        assert_eq!(
            best_price_events(&sink.take()),
            vec![best_price("MSFT", 0, 0, 0, 0)]
        );
        assert_eq!(exchange.resting_orders(), 0);
    }

    // Invariants from the data model, checked after every step of arbitrary
    // valid operation sequences.
    fn check_invariants(exchange: &Exchange, symbol: &str) {
        let Some(book) = exchange.book(symbol) else {
            return;
        };
        for side in [Side::Buy, Side::Sell] {
            let side_book = book.side(side);
            for level in side_book.levels() {
                assert!(!level.is_empty(), "empty level left in book");
                let sum: Volume = level
                    .orders()
                    .iter()
                    .map(|id| exchange.order(*id).expect("order in level but not registry").volume)
                    .sum();
                assert_eq!(level.total_volume(), sum, "level total out of sync");
            }
            let (best, volume) = side_book.best();
            let top = book.top_of_book();
            let (cached_price, cached_volume) = match side {
                Side::Buy => (top.best_bid_price, top.best_bid_volume),
                Side::Sell => (top.best_ask_price, top.best_ask_volume),
            };
            assert_eq!((cached_price, cached_volume), (best, volume));
        }
    }

    proptest! {
        #[test]
        fn prop_invariants_hold_under_random_flow(
            ops in proptest::collection::vec(
                (any::<bool>(), any::<bool>(), 1u64..20, 1u64..10, any::<u8>()),
                1..80,
            )
        ) {
            let (mut exchange, _sink) = exchange();
            let mut live: Vec<OrderId> = Vec::new();
            let mut next_id: OrderId = 1;

            for (is_insert, is_buy, price, volume, pick) in ops {
                if is_insert || live.is_empty() {
                    let side = if is_buy { Side::Buy } else { Side::Sell };
                    exchange.insert_order("AAPL", side, price, volume, 0);
                    live.push(next_id);
                    next_id += 1;
                } else {
                    // Mostly delete live orders, sometimes a bogus id.
                    let index = pick as usize % (live.len() + 1);
                    if index == live.len() {
                        exchange.delete_order(next_id + 1000);
                    } else {
                        exchange.delete_order(live.swap_remove(index));
                    }
                }
                check_invariants(&exchange, "AAPL");
                prop_assert_eq!(exchange.resting_orders(), live.len());
            }
        }
    }
}
