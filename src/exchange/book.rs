use std::collections::BTreeMap;
use tracing::debug;

use crate::exchange::price_level::PriceLevel;
use crate::exchange::types::{Price, Side, TopOfBook, Volume};

/// One side of a book: price levels ordered by price, with the side deciding
/// which end of the ordering is best (highest bid, lowest ask).
///
/// Both sides share this one implementation; only `best_price` consults the
/// direction. Levels are created lazily and must be removed the moment they
/// empty, so `best_price` can trust that every present level has volume.
#[derive(Debug)]
pub struct BookSide {
    side: Side,
    levels: BTreeMap<Price, PriceLevel>,
}

impl BookSide {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Price of the topmost level, if any.
    pub fn best_price(&self) -> Option<Price> {
        match self.side {
            Side::Buy => self.levels.keys().next_back().copied(),
            Side::Sell => self.levels.keys().next().copied(),
        }
    }

    /// Topmost (price, total volume), or the `(0, 0)` sentinel when empty.
    pub fn best(&self) -> (Price, Volume) {
        match self.best_price() {
            Some(price) => {
                let volume = self.levels[&price].total_volume();
                (price, volume)
            }
            None => (0, 0),
        }
    }

    /// Level at `price`, created if absent.
    pub fn level_mut(&mut self, price: Price) -> &mut PriceLevel {
        self.levels
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
    }

    pub fn get_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&price)
    }

    pub fn remove_level(&mut self, price: Price) {
        self.levels.remove(&price);
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Levels from best to worst.
    pub fn levels(&self) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match self.side {
            Side::Buy => Box::new(self.levels.values().rev()),
            Side::Sell => Box::new(self.levels.values()),
        }
    }
}

/// Order book for a single symbol: an ask side, a bid side, and the cached
/// top-of-book snapshot the engine compares against after each mutation.
#[derive(Debug)]
pub struct SymbolBook {
    symbol: String,
    bids: BookSide,
    asks: BookSide,
    best: TopOfBook,
}

impl SymbolBook {
    pub fn new(symbol: String) -> Self {
        debug!("creating order book for symbol {}", symbol);
        Self {
            symbol,
            bids: BookSide::new(Side::Buy),
            asks: BookSide::new(Side::Sell),
            best: TopOfBook::default(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// True iff `price` is the topmost price on `side` right now.
    pub fn is_top(&self, side: Side, price: Price) -> bool {
        self.side(side).best_price() == Some(price)
    }

    /// Recompute one side of the cached snapshot from the topmost surviving
    /// level (sentinel if the side emptied). Returns whether the cached value
    /// changed.
    pub fn refresh_best(&mut self, side: Side) -> bool {
        let (price, volume) = self.side(side).best();
        match side {
            Side::Buy => {
                let changed =
                    self.best.best_bid_price != price || self.best.best_bid_volume != volume;
                self.best.best_bid_price = price;
                self.best.best_bid_volume = volume;
                changed
            }
            Side::Sell => {
                let changed =
                    self.best.best_ask_price != price || self.best.best_ask_volume != volume;
                self.best.best_ask_price = price;
                self.best.best_ask_volume = volume;
                changed
            }
        }
    }

    /// The cached snapshot, both sides.
    pub fn top_of_book(&self) -> TopOfBook {
        self.best
    }
}
