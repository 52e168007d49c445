// Limit Order Book
// Price levels per side, each holding a FIFO queue of resting limit orders

use crate::simulation::order::LimitOrder;
use crate::types::{Origin, Price, Side};
use std::collections::{BTreeMap, VecDeque};

/// FIFO queue of resting orders at one exact price (arrival order = time priority)
pub type PriceLevel = VecDeque<LimitOrder>;

/// Aggregated view of a single price level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelSummary {
    pub price: Price,
    pub volume: u64,
    pub orders: usize,
}

/// Complete limit order book for one ticker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBook {
    pub ticker: String,
    /// Bids keyed by price; the best bid is the last key
    pub buy: BTreeMap<Price, PriceLevel>,
    /// Asks keyed by price; the best ask is the first key
    pub sell: BTreeMap<Price, PriceLevel>,
}

impl OrderBook {
    /// Create new empty order book
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            buy: BTreeMap::new(),
            sell: BTreeMap::new(),
        }
    }

    pub fn side(&self, side: Side) -> &BTreeMap<Price, PriceLevel> {
        match side {
            Side::Buy => &self.buy,
            Side::Sell => &self.sell,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut BTreeMap<Price, PriceLevel> {
        match side {
            Side::Buy => &mut self.buy,
            Side::Sell => &mut self.sell,
        }
    }

    /// Append an order at the back of its price level, creating the level if absent
    pub fn enqueue(&mut self, order: LimitOrder) {
        self.side_mut(order.header.side)
            .entry(order.price)
            .or_default()
            .push_back(order);
    }

    /// Highest bid, or `Price::ZERO` when there are no bids
    pub fn best_buy_price(&self) -> Price {
        self.buy.keys().next_back().copied().unwrap_or(Price::ZERO)
    }

    /// Lowest ask, or `Price::INFINITY` when there are no asks
    pub fn best_sell_price(&self) -> Price {
        self.sell.keys().next().copied().unwrap_or(Price::INFINITY)
    }

    pub fn best_price(&self, side: Side) -> Price {
        match side {
            Side::Buy => self.best_buy_price(),
            Side::Sell => self.best_sell_price(),
        }
    }

    /// Best occupied price on a side, `None` when the side is empty
    pub fn best_level(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.buy.keys().next_back().copied(),
            Side::Sell => self.sell.keys().next().copied(),
        }
    }

    /// Lowest resting bid and highest resting ask.
    /// Empty sides report the same sentinels as the best prices.
    pub fn price_range(&self) -> (Price, Price) {
        let worst_buy = self.buy.keys().next().copied().unwrap_or(Price::ZERO);
        let worst_sell = self.sell.keys().next_back().copied().unwrap_or(Price::INFINITY);
        (worst_buy, worst_sell)
    }

    /// Total resting volume at an exact price
    pub fn volume_at(&self, side: Side, price: Price) -> u64 {
        self.side(side)
            .get(&price)
            .map(|level| level.iter().map(|o| o.volume).sum())
            .unwrap_or(0)
    }

    pub fn best_buy_volume(&self) -> u64 {
        self.volume_at(Side::Buy, self.best_buy_price())
    }

    pub fn best_sell_volume(&self) -> u64 {
        self.volume_at(Side::Sell, self.best_sell_price())
    }

    pub fn midprice(&self) -> f64 {
        (self.best_sell_price().as_f64() + self.best_buy_price().as_f64()) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.best_sell_price().as_f64() - self.best_buy_price().as_f64()
    }

    /// Order-flow imbalance at the best prices, in [-1, 1]
    pub fn imbalance(&self) -> f64 {
        let buy = self.best_buy_volume() as f64;
        let sell = self.best_sell_volume() as f64;
        if buy + sell == 0.0 {
            0.0
        } else {
            (buy - sell) / (buy + sell)
        }
    }

    /// Number of price levels per side (buy, sell)
    pub fn depth(&self) -> (usize, usize) {
        (self.buy.len(), self.sell.len())
    }

    pub fn is_empty(&self) -> bool {
        self.buy.is_empty() && self.sell.is_empty()
    }

    /// Aggregated top `n` levels per side, best first
    pub fn top_levels(&self, n: usize) -> (Vec<LevelSummary>, Vec<LevelSummary>) {
        let summarise = |(price, level): (&Price, &PriceLevel)| LevelSummary {
            price: *price,
            volume: level.iter().map(|o| o.volume).sum(),
            orders: level.len(),
        };
        let bids = self.buy.iter().rev().take(n).map(summarise).collect();
        let asks = self.sell.iter().take(n).map(summarise).collect();
        (bids, asks)
    }

    /// All resting orders of one origin, bids best-first then asks best-first
    pub fn resting_orders(&self, origin: Origin) -> Vec<&LimitOrder> {
        self.buy
            .values()
            .rev()
            .chain(self.sell.values())
            .flat_map(|level| level.iter())
            .filter(|order| order.header.origin == origin)
            .collect()
    }

    /// Clear all levels
    pub fn clear(&mut self) {
        self.buy.clear();
        self.sell.clear();
    }

    /// Validate order book integrity
    pub fn validate(&self) -> Result<(), String> {
        if !self.buy.is_empty()
            && !self.sell.is_empty()
            && self.best_buy_price() >= self.best_sell_price()
        {
            return Err(format!(
                "Crossed order book: best buy ({}) >= best sell ({})",
                self.best_buy_price(),
                self.best_sell_price()
            ));
        }

        for side in [Side::Buy, Side::Sell] {
            for (price, level) in self.side(side) {
                if level.is_empty() {
                    return Err(format!("Empty {} level at {}", side, price));
                }
                if !price.is_valid() {
                    return Err(format!("Invalid {} price level {}", side, price));
                }
                if let Some(order) = level.iter().find(|o| o.volume == 0 || o.price != *price) {
                    return Err(format!(
                        "Malformed {} order {:?} in level {}",
                        side, order.header.internal_id, price
                    ));
                }
            }
        }

        Ok(())
    }
}
