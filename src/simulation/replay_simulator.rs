// Replay Simulator
// Runs episodes over historical order flow, merging injected orders into the
// replayed book and keeping outer depth in line with historical snapshots

use crate::config::SimulatorConfig;
use crate::error::{ReplayError, ReplayResult};
use crate::simulation::history::{HistoricalFeed, SnapshotStore};
use crate::simulation::matching_engine::MatchingEngine;
use crate::simulation::order::{FillRecord, LimitOrder, Order};
use crate::simulation::order_book::OrderBook;
use crate::types::{Origin, Price, Side};
use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, info, warn};

/// Outermost prices the simulation has explicitly modelled on each side.
///
/// `None` means nothing has been modelled on that side yet. Bounds only ever
/// widen during an episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceBounds {
    min_buy: Option<Price>,
    max_sell: Option<Price>,
}

impl PriceBounds {
    /// Lowest modelled buy price, `Price::ZERO` if none
    pub fn min_buy(&self) -> Price {
        self.min_buy.unwrap_or(Price::ZERO)
    }

    /// Highest modelled sell price, `Price::INFINITY` if none
    pub fn max_sell(&self) -> Price {
        self.max_sell.unwrap_or(Price::INFINITY)
    }

    /// True when a level lies strictly beyond the modelled range
    pub fn is_outside(&self, side: Side, price: Price) -> bool {
        match side {
            Side::Buy => self.min_buy.map_or(true, |bound| price < bound),
            Side::Sell => self.max_sell.map_or(true, |bound| price > bound),
        }
    }

    /// Extend the bounds to cover a (worst buy, worst sell) range.
    /// Empty-side sentinels carry no information and are ignored.
    pub fn widen(&mut self, (worst_buy, worst_sell): (Price, Price)) {
        if worst_buy.is_valid() {
            self.min_buy = Some(self.min_buy.map_or(worst_buy, |bound| bound.min(worst_buy)));
        }
        if worst_sell.is_valid() {
            self.max_sell = Some(self.max_sell.map_or(worst_sell, |bound| bound.max(worst_sell)));
        }
    }
}

/// Counters for the running episode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeStats {
    pub steps: u64,
    pub external_events: u64,
    pub internal_orders: u64,
    pub internal_fills: u64,
    pub external_fills: u64,
    pub resyncs: u64,
    pub levels_overwritten: u64,
}

/// Episode orchestrator over a matching engine and two historical collaborators
pub struct ReplaySimulator<S, F> {
    config: SimulatorConfig,
    exchange: MatchingEngine,
    snapshot_store: S,
    feed: F,
    /// Current simulated time; `None` until the first episode starts
    now_is: Option<DateTime<Utc>>,
    bounds: PriceBounds,
    /// Distance (ticks) between best and worst price per side at episode start
    initial_buy_span: i64,
    initial_sell_span: i64,
    stats: EpisodeStats,
}

impl<S: SnapshotStore, F: HistoricalFeed> ReplaySimulator<S, F> {
    pub fn new(config: SimulatorConfig, snapshot_store: S, feed: F) -> Self {
        Self {
            exchange: MatchingEngine::new(config.ticker.clone()),
            config,
            snapshot_store,
            feed,
            now_is: None,
            bounds: PriceBounds::default(),
            initial_buy_span: 0,
            initial_sell_span: 0,
            stats: EpisodeStats::default(),
        }
    }

    /// Start a new episode at `start_time`.
    ///
    /// Without an explicit `start_book` the book is seeded from the latest
    /// historical snapshot at or before `start_time`.
    pub fn reset_episode(
        &mut self,
        start_time: DateTime<Utc>,
        start_book: Option<OrderBook>,
    ) -> ReplayResult<OrderBook> {
        ensure_whole_second(start_time)?;

        let seed_orders = if start_book.is_none() {
            Some(self.historical_start_orders(start_time)?)
        } else {
            None
        };

        self.exchange.reset();
        if let Some(book) = start_book {
            self.exchange.install(book);
        } else if let Some(orders) = seed_orders {
            self.exchange.seed(orders);
        }

        self.reset_price_bounds();
        self.stats = EpisodeStats::default();
        self.now_is = Some(start_time);

        let book = self.exchange.order_book();
        info!(
            "📖 Episode started for {} at {}: {} buy / {} sell levels, best {} / {}",
            self.config.ticker,
            start_time,
            book.buy.len(),
            book.sell.len(),
            book.best_buy_price(),
            book.best_sell_price()
        );

        Ok(book.clone())
    }

    /// Replay historical events in `(now, until]`, then the injected orders,
    /// and return every fill they produced. A failed resync after matching is
    /// logged and never discards the step's fills.
    pub fn forward_step(
        &mut self,
        until: DateTime<Utc>,
        internal_orders: Vec<Order>,
    ) -> ReplayResult<FillRecord> {
        let now = self.now_is.ok_or(ReplayError::EpisodeNotStarted)?;
        if until <= now {
            return Err(ReplayError::NonMonotonicStep { now, until });
        }
        ensure_whole_second(until)?;

        let external_orders = self.feed.events_in(now, until, &self.config.ticker)?;
        self.stats.external_events += external_orders.len() as u64;
        self.stats.internal_orders += internal_orders.len() as u64;

        let mut filled = FillRecord::new();
        for order in external_orders.into_iter().chain(internal_orders) {
            if let Some(fills) = self.exchange.process(order) {
                filled.extend(fills);
            }
        }

        self.now_is = Some(until);
        self.stats.steps += 1;
        self.stats.internal_fills += filled.internal.len() as u64;
        self.stats.external_fills += filled.external.len() as u64;

        if self.near_exiting_initial_price_range() || self.exiting_worst_price() {
            if let Err(e) = self.update_outer_levels(until) {
                warn!(
                    "Outer level resync at {} failed [{}]: {}",
                    until,
                    e.category(),
                    e
                );
            }
        }

        debug!(
            "Step to {}: {} internal / {} external fills, best {} / {}",
            until,
            filled.internal.len(),
            filled.external.len(),
            self.exchange.best_buy_price(),
            self.exchange.best_sell_price()
        );

        Ok(filled)
    }

    pub fn now(&self) -> Option<DateTime<Utc>> {
        self.now_is
    }

    pub fn is_running(&self) -> bool {
        self.now_is.is_some()
    }

    pub fn order_book(&self) -> &OrderBook {
        self.exchange.order_book()
    }

    pub fn exchange(&self) -> &MatchingEngine {
        &self.exchange
    }

    pub fn price_bounds(&self) -> PriceBounds {
        self.bounds
    }

    /// Buy and sell spans (ticks) recorded at episode start
    pub fn initial_spans(&self) -> (i64, i64) {
        (self.initial_buy_span, self.initial_sell_span)
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }

    /// Injected orders currently resting in the book
    pub fn resting_internal_orders(&self) -> Vec<&LimitOrder> {
        self.exchange.order_book().resting_orders(Origin::Internal)
    }

    fn historical_start_orders(&self, start_time: DateTime<Utc>) -> ReplayResult<Vec<LimitOrder>> {
        let snapshot = self
            .snapshot_store
            .latest_snapshot_at(start_time, &self.config.ticker)?
            .ok_or_else(|| ReplayError::SnapshotMissing {
                ticker: self.config.ticker.clone(),
                at: start_time,
            })?;

        let max_age = self.config.max_snapshot_age();
        if start_time - snapshot.timestamp > max_age {
            return Err(ReplayError::SnapshotStale {
                at: start_time,
                snapshot_time: snapshot.timestamp,
                max_age,
            });
        }

        Ok(snapshot.level_orders(self.config.n_levels, |_, _| true))
    }

    fn reset_price_bounds(&mut self) {
        self.bounds = PriceBounds::default();
        self.bounds.widen(self.exchange.price_range());

        let book = self.exchange.order_book();
        self.initial_buy_span = match (book.best_level(Side::Buy), self.bounds.min_buy) {
            (Some(best), Some(worst)) => best.ticks() - worst.ticks(),
            _ => 0,
        };
        self.initial_sell_span = match (book.best_level(Side::Sell), self.bounds.max_sell) {
            (Some(best), Some(worst)) => worst.ticks() - best.ticks(),
            _ => 0,
        };
    }

    /// Live best prices have moved into the outer `outer_levels / n_levels`
    /// share of the initially modelled span on either side. A side with no
    /// modelled bound is never near its exit.
    fn near_exiting_initial_price_range(&self) -> bool {
        let n = self.config.n_levels as i128;
        let outer = self.config.outer_levels as i128;

        let buy_near = match self.bounds.min_buy {
            Some(min_buy) => {
                let best = self.exchange.best_buy_price().ticks() as i128;
                n * best < n * min_buy.ticks() as i128 + outer * self.initial_buy_span as i128
            }
            None => false,
        };
        let sell_near = match self.bounds.max_sell {
            Some(max_sell) => {
                let best = self.exchange.best_sell_price().ticks() as i128;
                n * best > n * max_sell.ticks() as i128 - outer * self.initial_sell_span as i128
            }
            None => false,
        };

        buy_near || sell_near
    }

    /// The live book rests orders beyond the modelled range
    fn exiting_worst_price(&self) -> bool {
        let book = self.exchange.order_book();
        let buy_beyond = book
            .buy
            .keys()
            .next()
            .is_some_and(|&worst| self.bounds.is_outside(Side::Buy, worst));
        let sell_beyond = book
            .sell
            .keys()
            .next_back()
            .is_some_and(|&worst| self.bounds.is_outside(Side::Sell, worst));
        buy_beyond || sell_beyond
    }

    /// Overwrite levels beyond the modelled range with the latest snapshot's
    /// aggregated volume. Any queue at an overwritten price is discarded.
    fn update_outer_levels(&mut self, at: DateTime<Utc>) -> ReplayResult<()> {
        let Some(snapshot) = self
            .snapshot_store
            .latest_snapshot_at(at, &self.config.ticker)?
        else {
            warn!("No snapshot at or before {}; skipping outer level resync", at);
            return Ok(());
        };

        let bounds = self.bounds;
        let orders = snapshot.level_orders(self.config.n_levels, |side, price| {
            bounds.is_outside(side, price)
        });
        let overwritten = orders.len();
        for order in orders {
            self.exchange.overwrite_level(order);
        }

        self.bounds.widen(snapshot.price_range_within(self.config.n_levels));
        self.bounds.widen(self.exchange.price_range());
        self.stats.resyncs += 1;
        self.stats.levels_overwritten += overwritten as u64;

        if overwritten > 0 {
            info!(
                "🔄 Resynced {} outer levels at {} (bounds now {} / {})",
                overwritten,
                at,
                self.bounds.min_buy(),
                self.bounds.max_sell()
            );
        } else {
            debug!("Resync at {} found no levels outside the modelled range", at);
        }

        Ok(())
    }
}

fn ensure_whole_second(at: DateTime<Utc>) -> ReplayResult<()> {
    if at.nanosecond() != 0 {
        return Err(ReplayError::NonGranularTime(at));
    }
    Ok(())
}
