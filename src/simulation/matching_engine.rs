// Order Matching Engine
// Owns the live order book and applies price-time priority matching, one order at a time

use crate::simulation::id_bridge::IdBridge;
use crate::simulation::order::{FillRecord, LimitOrder, MarketOrder, Order, OrderHeader};
use crate::simulation::order_book::OrderBook;
use crate::types::{Price, Side};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// What the unfilled part of an incoming order is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggression {
    /// Match while the limit crosses, then rest the remainder
    Limit(Price),
    /// Match until filled or the opposite side is exhausted, drop the remainder
    Market,
}

/// Matching engine with price-time priority over a single order book
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    central_order_book: OrderBook,
    id_bridge: IdBridge,
}

impl MatchingEngine {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            central_order_book: OrderBook::new(ticker),
            id_bridge: IdBridge::new(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.central_order_book.ticker
    }

    pub fn order_book(&self) -> &OrderBook {
        &self.central_order_book
    }

    pub fn id_bridge(&self) -> &IdBridge {
        &self.id_bridge
    }

    pub fn best_buy_price(&self) -> Price {
        self.central_order_book.best_buy_price()
    }

    pub fn best_sell_price(&self) -> Price {
        self.central_order_book.best_sell_price()
    }

    /// Lowest resting buy price and highest resting sell price
    pub fn price_range(&self) -> (Price, Price) {
        self.central_order_book.price_range()
    }

    /// Clear the book and the id namespace
    pub fn reset(&mut self) {
        self.central_order_book.clear();
        self.id_bridge.reset();
    }

    /// Process one order. Returns `None` when nothing matched.
    pub fn process(&mut self, order: Order) -> Option<FillRecord> {
        let fills = match order {
            Order::Limit(limit) => self.process_limit(limit),
            Order::Market(market) => self.process_market(market),
            Order::Cancellation(cancellation) if cancellation.volume == 0 => {
                warn!(
                    "Ignoring zero-volume cancellation at {} (external id {:?})",
                    cancellation.price, cancellation.header.external_id
                );
                FillRecord::new()
            }
            Order::Cancellation(cancellation) => {
                self.remove_resting(
                    "cancellation",
                    &cancellation.header,
                    cancellation.price,
                    Some(cancellation.volume),
                );
                FillRecord::new()
            }
            Order::Deletion(deletion) => {
                self.remove_resting("deletion", &deletion.header, deletion.price, None);
                FillRecord::new()
            }
        };

        if fills.is_empty() {
            None
        } else {
            Some(fills)
        }
    }

    /// Replace the live book with one built straight from snapshot level
    /// orders. A snapshot is already converged, so nothing is matched.
    pub fn seed(&mut self, orders: Vec<LimitOrder>) -> OrderBook {
        let mut book = OrderBook::new(self.ticker().to_string());
        for order in orders {
            if order.volume == 0 || !order.price.is_valid() {
                warn!("Skipping unusable seed level {} x {}", order.price, order.volume);
                continue;
            }
            book.enqueue(self.tracked_limit(order));
        }

        if let Err(reason) = book.validate() {
            warn!("Seeded book failed validation: {}", reason);
        }

        self.central_order_book = book;
        self.central_order_book.clone()
    }

    /// Replace the live book with a caller-provided one. Every resting order
    /// receives a fresh internal id in this engine's namespace.
    pub fn install(&mut self, book: OrderBook) {
        let mut fresh = OrderBook::new(book.ticker.clone());
        for order in book.buy.into_values().chain(book.sell.into_values()).flatten() {
            fresh.enqueue(self.tracked_limit(order));
        }
        self.central_order_book = fresh;
    }

    /// Force the queue at the order's exact price to hold only this order,
    /// discarding whatever rested there before.
    pub fn overwrite_level(&mut self, order: LimitOrder) {
        let side = order.header.side;
        let price = order.price;

        if let Some(previous) = self.central_order_book.side_mut(side).remove(&price) {
            for replaced in previous {
                if let Some(external_id) = replaced.header.external_id {
                    self.id_bridge.forget(external_id);
                }
            }
        }

        if order.volume == 0 || !price.is_valid() {
            return;
        }

        let order = self.tracked_limit(order);
        self.central_order_book
            .side_mut(side)
            .insert(price, VecDeque::from([order]));
    }

    fn tracked_limit(&mut self, order: LimitOrder) -> LimitOrder {
        let internal_id = self.id_bridge.assign(&order.header);
        LimitOrder {
            header: OrderHeader {
                internal_id: Some(internal_id),
                ..order.header
            },
            ..order
        }
    }

    fn process_limit(&mut self, order: LimitOrder) -> FillRecord {
        if order.volume == 0 || !order.price.is_valid() {
            warn!(
                "Ignoring limit order with price {} and volume {}",
                order.price, order.volume
            );
            return FillRecord::new();
        }

        let incoming = self.tracked_limit(order);
        let mut fills = FillRecord::new();
        let remaining = self.match_incoming(
            &incoming.header,
            Aggression::Limit(incoming.price),
            incoming.volume,
            &mut fills,
        );

        if remaining > 0 {
            self.central_order_book.enqueue(LimitOrder {
                volume: remaining,
                ..incoming
            });
        } else if let Some(external_id) = incoming.header.external_id {
            self.id_bridge.forget(external_id);
        }

        fills
    }

    fn process_market(&mut self, order: MarketOrder) -> FillRecord {
        if order.volume == 0 {
            warn!("Ignoring market order with zero volume");
            return FillRecord::new();
        }

        let internal_id = self.id_bridge.assign(&order.header);
        let header = OrderHeader {
            internal_id: Some(internal_id),
            ..order.header
        };

        let mut fills = FillRecord::new();
        let unfilled = self.match_incoming(&header, Aggression::Market, order.volume, &mut fills);
        if unfilled > 0 {
            debug!(
                "Market {} order {} left {} unfilled after exhausting the book",
                header.side, internal_id, unfilled
            );
        }
        if let Some(external_id) = header.external_id {
            self.id_bridge.forget(external_id);
        }
        fills
    }

    /// Walk the opposite side best-first, consuming each queue FIFO.
    /// Returns the incoming volume still unfilled.
    fn match_incoming(
        &mut self,
        taker: &OrderHeader,
        aggression: Aggression,
        mut remaining: u64,
        fills: &mut FillRecord,
    ) -> u64 {
        let opposite = taker.side.opposite();

        while remaining > 0 {
            let Some(best) = self.central_order_book.best_level(opposite) else {
                break;
            };
            if let Aggression::Limit(limit) = aggression {
                let crosses = match taker.side {
                    Side::Buy => limit >= best,
                    Side::Sell => limit <= best,
                };
                if !crosses {
                    break;
                }
            }

            let book_side = self.central_order_book.side_mut(opposite);
            let Some(level) = book_side.get_mut(&best) else {
                break;
            };

            while remaining > 0 {
                let Some(resting) = level.front_mut() else {
                    break;
                };
                let matched = remaining.min(resting.volume);
                resting.volume -= matched;
                remaining -= matched;

                trace!(
                    "Matched {} @ {} (resting {:?}, incoming {:?})",
                    matched,
                    best,
                    resting.header.internal_id,
                    taker.internal_id
                );

                fills.push(Order::Limit(LimitOrder {
                    header: resting.header.clone(),
                    price: best,
                    volume: matched,
                }));
                fills.push(taker_fill(taker, aggression, best, matched));

                if resting.volume == 0 {
                    if let Some(filled) = level.pop_front() {
                        if let Some(external_id) = filled.header.external_id {
                            self.id_bridge.forget(external_id);
                        }
                    }
                }
            }

            if level.is_empty() {
                book_side.remove(&best);
            }
        }

        remaining
    }

    /// Cancellation (`Some(volume)`) or deletion (`None`) of a resting order.
    /// Unresolvable targets are ignored.
    fn remove_resting(
        &mut self,
        kind: &str,
        header: &OrderHeader,
        price: Price,
        volume: Option<u64>,
    ) {
        let Some(target) = self.id_bridge.resolve_header(header) else {
            debug!(
                "Ignoring {} for unknown order (external id {:?})",
                kind, header.external_id
            );
            return;
        };

        let side = header.side;
        let book_side = self.central_order_book.side_mut(side);
        let Some(level) = book_side.get_mut(&price) else {
            debug!("Ignoring {} for order {}: no {} level at {}", kind, target, side, price);
            return;
        };
        let Some(position) = level
            .iter()
            .position(|resting| resting.header.internal_id == Some(target))
        else {
            debug!("Ignoring {} for order {}: not resting at {}", kind, target, price);
            return;
        };

        let remove = match volume {
            Some(cancelled) => {
                let resting = &mut level[position];
                resting.volume = resting.volume.saturating_sub(cancelled);
                resting.volume == 0
            }
            None => true,
        };

        if remove {
            if let Some(removed) = level.remove(position) {
                if let Some(external_id) = removed.header.external_id {
                    self.id_bridge.forget(external_id);
                }
            }
            if level.is_empty() {
                book_side.remove(&price);
            }
        }
    }
}

/// Fill entry for the incoming side of a match
fn taker_fill(taker: &OrderHeader, aggression: Aggression, price: Price, volume: u64) -> Order {
    match aggression {
        Aggression::Limit(_) => Order::Limit(LimitOrder {
            header: taker.clone(),
            price,
            volume,
        }),
        Aggression::Market => Order::Market(MarketOrder {
            header: taker.clone(),
            volume,
            price: Some(price),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::order::{Cancellation, Deletion};
    use crate::types::Origin;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2012, 6, 21, 10, 0, 0).unwrap()
    }

    fn p(units: i64) -> Price {
        Price::from_ticks(units * 10_000)
    }

    fn snapshot_level(side: Side, price: i64, volume: u64) -> LimitOrder {
        LimitOrder::new(OrderHeader::snapshot(ts(), side, "MSFT"), p(price), volume)
    }

    fn external_limit(id: u64, side: Side, price: i64, volume: u64) -> Order {
        LimitOrder::new(OrderHeader::external(ts(), side, "MSFT", id), p(price), volume).into()
    }

    fn internal_limit(side: Side, price: i64, volume: u64) -> Order {
        LimitOrder::new(OrderHeader::internal(ts(), side, "MSFT"), p(price), volume).into()
    }

    fn create_test_engine() -> MatchingEngine {
        let mut engine = MatchingEngine::new("MSFT");
        engine.seed(vec![
            snapshot_level(Side::Buy, 99, 10),
            snapshot_level(Side::Buy, 98, 5),
            snapshot_level(Side::Sell, 101, 10),
            snapshot_level(Side::Sell, 102, 5),
        ]);
        engine
    }

    #[test]
    fn test_seed_builds_levels_without_matching() {
        let engine = create_test_engine();
        let book = engine.order_book();

        assert!(book.best_buy_price() < book.best_sell_price());
        assert_eq!(book.volume_at(Side::Buy, p(99)), 10);
        assert_eq!(book.volume_at(Side::Sell, p(102)), 5);
        assert_eq!(engine.id_bridge().last_assigned(), 4);
    }

    #[test]
    fn test_resting_limit_produces_no_fills() {
        let mut engine = create_test_engine();
        let fills = engine.process(internal_limit(Side::Buy, 100, 7));

        assert!(fills.is_none());
        assert_eq!(engine.best_buy_price(), p(100));
        let resting = engine.order_book().resting_orders(Origin::Internal);
        assert_eq!(resting.len(), 1);
        assert_eq!(resting[0].header.internal_id, Some(5));
    }

    #[test]
    fn test_exact_cross_empties_level() {
        let mut engine = create_test_engine();
        let fills = engine
            .process(internal_limit(Side::Buy, 101, 10))
            .expect("should fill");

        assert_eq!(fills.internal.len(), 1);
        assert_eq!(fills.internal[0].volume(), Some(10));
        assert_eq!(fills.external.len(), 1);
        assert_eq!(fills.external[0].volume(), Some(10));
        assert!(!engine.order_book().sell.contains_key(&p(101)));
        assert!(!engine.order_book().buy.contains_key(&p(101)));
        assert_eq!(engine.best_sell_price(), p(102));
    }

    #[test]
    fn test_partial_fill_leaves_remainder_at_front() {
        let mut engine = MatchingEngine::new("MSFT");
        engine.seed(vec![snapshot_level(Side::Sell, 101, 120)]);
        engine.process(external_limit(2, Side::Sell, 101, 30));

        let fills = engine
            .process(internal_limit(Side::Buy, 101, 50))
            .expect("should fill");

        assert_eq!(fills.internal.len(), 1);
        assert_eq!(fills.internal[0].volume(), Some(50));
        let level = &engine.order_book().sell[&p(101)];
        assert_eq!(level[0].volume, 70);
        assert_eq!(level[0].header.internal_id, Some(1));
        assert_eq!(level[1].volume, 30);
    }

    #[test]
    fn test_limit_walks_levels_and_rests_remainder() {
        let mut engine = create_test_engine();
        let fills = engine
            .process(internal_limit(Side::Buy, 102, 20))
            .expect("should fill");

        let prices: Vec<_> = fills.internal.iter().filter_map(Order::price).collect();
        assert_eq!(prices, vec![p(101), p(102)]);
        assert_eq!(fills.internal_volume(), 15);
        assert_eq!(fills.external_volume(), 15);
        assert_eq!(engine.best_buy_price(), p(102));
        assert_eq!(engine.order_book().volume_at(Side::Buy, p(102)), 5);
        assert_eq!(engine.best_sell_price(), Price::INFINITY);
    }

    #[test]
    fn test_match_price_favours_resting_order() {
        let mut engine = create_test_engine();
        let fills = engine
            .process(internal_limit(Side::Sell, 90, 4))
            .expect("should fill");

        assert_eq!(fills.internal[0].price(), Some(p(99)));
        assert_eq!(engine.order_book().volume_at(Side::Buy, p(99)), 6);
    }

    #[test]
    fn test_market_order_drops_excess() {
        let mut engine = create_test_engine();
        let market = MarketOrder::new(OrderHeader::internal(ts(), Side::Buy, "MSFT"), 100);
        let fills = engine.process(market.into()).expect("should fill");

        assert_eq!(fills.internal_volume(), 15);
        assert!(engine.order_book().sell.is_empty());
        assert_eq!(engine.order_book().volume_at(Side::Buy, p(99)), 10);
        assert!(matches!(fills.internal[0], Order::Market(MarketOrder { price: Some(_), .. })));
    }

    #[test]
    fn test_market_order_on_empty_side() {
        let mut engine = MatchingEngine::new("MSFT");
        let market = MarketOrder::new(OrderHeader::internal(ts(), Side::Sell, "MSFT"), 5);
        assert!(engine.process(market.into()).is_none());
        assert!(engine.order_book().is_empty());
    }

    #[test]
    fn test_cancellation_reduces_volume() {
        let mut engine = create_test_engine();
        engine.process(external_limit(7, Side::Buy, 99, 20));

        let cancel = Cancellation::new(OrderHeader::external(ts(), Side::Buy, "MSFT", 7), p(99), 15);
        assert!(engine.process(cancel.into()).is_none());

        let level = &engine.order_book().buy[&p(99)];
        assert_eq!(level.len(), 2);
        assert_eq!(level[1].volume, 5);
        assert_eq!(engine.id_bridge().len(), 1);
    }

    #[test]
    fn test_zero_volume_cancellation_ignored() {
        let mut engine = create_test_engine();
        engine.process(external_limit(7, Side::Buy, 99, 20));
        let before = engine.order_book().clone();

        let cancel = Cancellation::new(OrderHeader::external(ts(), Side::Buy, "MSFT", 7), p(99), 0);
        assert!(engine.process(cancel.into()).is_none());

        assert_eq!(engine.order_book(), &before);
        assert_eq!(engine.id_bridge().len(), 1);
    }

    #[test]
    fn test_deletion_removes_order_and_empty_level() {
        let mut engine = create_test_engine();
        engine.process(external_limit(8, Side::Sell, 105, 3));

        let deletion = Deletion::new(OrderHeader::external(ts(), Side::Sell, "MSFT", 8), p(105), None);
        engine.process(deletion.into());

        assert!(!engine.order_book().sell.contains_key(&p(105)));
        assert!(engine.id_bridge().is_empty());
    }

    #[test]
    fn test_unknown_target_is_noop() {
        let mut engine = create_test_engine();
        let before = engine.order_book().clone();

        let deletion = Deletion::new(OrderHeader::external(ts(), Side::Buy, "MSFT", 404), p(99), None);
        assert!(engine.process(deletion.into()).is_none());
        assert_eq!(engine.order_book(), &before);
    }

    #[test]
    fn test_internal_cancellation_by_own_id() {
        let mut engine = create_test_engine();
        engine.process(internal_limit(Side::Sell, 103, 8));
        let internal_id = engine.order_book().resting_orders(Origin::Internal)[0]
            .header
            .internal_id;

        let mut header = OrderHeader::internal(ts(), Side::Sell, "MSFT");
        header.internal_id = internal_id;
        engine.process(Deletion::new(header, p(103), None).into());

        assert!(engine.order_book().resting_orders(Origin::Internal).is_empty());
    }

    #[test]
    fn test_overwrite_level_replaces_queue() {
        let mut engine = create_test_engine();
        engine.process(external_limit(9, Side::Sell, 102, 4));

        engine.overwrite_level(snapshot_level(Side::Sell, 102, 50));

        let level = &engine.order_book().sell[&p(102)];
        assert_eq!(level.len(), 1);
        assert_eq!(level[0].volume, 50);
        assert!(engine.id_bridge().is_empty());
    }

    #[test]
    fn test_install_retracks_orders() {
        let source = create_test_engine().order_book().clone();
        let mut engine = MatchingEngine::new("MSFT");
        engine.install(source.clone());

        assert_eq!(engine.order_book().depth(), source.depth());
        assert_eq!(engine.id_bridge().last_assigned(), 4);
    }
}
