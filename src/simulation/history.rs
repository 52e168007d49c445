// Historical data collaborators
// Book snapshots and the replayed order feed the simulator reads from

use crate::error::{ReplayError, ReplayResult};
use crate::simulation::order::{LimitOrder, Order, OrderHeader};
use crate::types::{Price, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// Source of historical book snapshots
pub trait SnapshotStore {
    /// Most recent snapshot taken at or before `timestamp`, if any
    fn latest_snapshot_at(
        &self,
        timestamp: DateTime<Utc>,
        ticker: &str,
    ) -> ReplayResult<Option<BookSnapshot>>;
}

/// Source of historically observed order events
pub trait HistoricalFeed {
    /// Events with `start < timestamp <= end`, in feed order
    fn events_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ticker: &str,
    ) -> ReplayResult<Vec<Order>>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for &T {
    fn latest_snapshot_at(
        &self,
        timestamp: DateTime<Utc>,
        ticker: &str,
    ) -> ReplayResult<Option<BookSnapshot>> {
        (**self).latest_snapshot_at(timestamp, ticker)
    }
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Rc<T> {
    fn latest_snapshot_at(
        &self,
        timestamp: DateTime<Utc>,
        ticker: &str,
    ) -> ReplayResult<Option<BookSnapshot>> {
        (**self).latest_snapshot_at(timestamp, ticker)
    }
}

impl<T: HistoricalFeed + ?Sized> HistoricalFeed for &T {
    fn events_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ticker: &str,
    ) -> ReplayResult<Vec<Order>> {
        (**self).events_in(start, end, ticker)
    }
}

impl<T: HistoricalFeed + ?Sized> HistoricalFeed for Rc<T> {
    fn events_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ticker: &str,
    ) -> ReplayResult<Vec<Order>> {
        (**self).events_in(start, end, ticker)
    }
}

/// One displayed level of a snapshot (level 0 is the best price)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLevel {
    pub side: Side,
    pub level: usize,
    pub price: Price,
    pub volume: u64,
}

/// Aggregated book state at one instant, without per-order granularity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub timestamp: DateTime<Utc>,
    pub ticker: String,
    pub levels: Vec<SnapshotLevel>,
}

impl BookSnapshot {
    pub fn new(timestamp: DateTime<Utc>, ticker: impl Into<String>, mut levels: Vec<SnapshotLevel>) -> Self {
        levels.sort_by_key(|l| (l.side == Side::Sell, l.level));
        Self {
            timestamp,
            ticker: ticker.into(),
            levels,
        }
    }

    /// Build from the flat `{side}_price_{level}` / `{side}_volume_{level}`
    /// representation, prices in ticks.
    ///
    /// Levels without a volume field, and placeholder levels with a
    /// non-positive price or zero volume, are skipped. Unrelated keys are
    /// ignored.
    pub fn from_fields(
        timestamp: DateTime<Utc>,
        ticker: impl Into<String>,
        fields: &BTreeMap<String, i64>,
    ) -> Self {
        let mut levels = Vec::new();
        for side in [Side::Buy, Side::Sell] {
            let prefix = format!("{}_price_", side.as_str());
            for (key, &ticks) in fields {
                let Some(level) = key.strip_prefix(&prefix).and_then(|n| n.parse::<usize>().ok())
                else {
                    continue;
                };
                let Some(&volume) = fields.get(&format!("{}_volume_{}", side.as_str(), level)) else {
                    continue;
                };
                let price = Price::from_ticks(ticks);
                if !price.is_valid() || volume <= 0 {
                    continue;
                }
                levels.push(SnapshotLevel {
                    side,
                    level,
                    price,
                    volume: volume as u64,
                });
            }
        }
        Self::new(timestamp, ticker, levels)
    }

    /// Read a level back by its flat field name
    pub fn field(&self, name: &str) -> Option<i64> {
        let (side, rest) = if let Some(rest) = name.strip_prefix("buy_") {
            (Side::Buy, rest)
        } else if let Some(rest) = name.strip_prefix("sell_") {
            (Side::Sell, rest)
        } else {
            return None;
        };

        if let Some(n) = rest.strip_prefix("price_") {
            self.level(side, n.parse().ok()?).map(|l| l.price.ticks())
        } else if let Some(n) = rest.strip_prefix("volume_") {
            self.level(side, n.parse().ok()?).map(|l| l.volume as i64)
        } else {
            None
        }
    }

    pub fn level(&self, side: Side, level: usize) -> Option<&SnapshotLevel> {
        self.levels.iter().find(|l| l.side == side && l.level == level)
    }

    /// Lowest buy price and highest sell price shown, with empty-side sentinels
    pub fn price_range(&self) -> (Price, Price) {
        self.price_range_within(usize::MAX)
    }

    /// Like `price_range`, restricted to the first `n_levels` of each side
    pub fn price_range_within(&self, n_levels: usize) -> (Price, Price) {
        let worst_buy = self
            .levels
            .iter()
            .filter(|l| l.level < n_levels)
            .filter(|l| l.side == Side::Buy)
            .map(|l| l.price)
            .min()
            .unwrap_or(Price::ZERO);
        let worst_sell = self
            .levels
            .iter()
            .filter(|l| l.level < n_levels)
            .filter(|l| l.side == Side::Sell)
            .map(|l| l.price)
            .max()
            .unwrap_or(Price::INFINITY);
        (worst_buy, worst_sell)
    }

    /// One aggregated limit order per level among the first `n_levels` of
    /// each side, keeping only the levels `keep` accepts.
    pub fn level_orders<F>(&self, n_levels: usize, keep: F) -> Vec<LimitOrder>
    where
        F: Fn(Side, Price) -> bool,
    {
        let mut orders = Vec::new();
        for side in [Side::Buy, Side::Sell] {
            for level in 0..n_levels {
                let Some(snapshot_level) = self.level(side, level) else {
                    continue;
                };
                if keep(side, snapshot_level.price) {
                    orders.push(LimitOrder::new(
                        OrderHeader::snapshot(self.timestamp, side, self.ticker.clone()),
                        snapshot_level.price,
                        snapshot_level.volume,
                    ));
                }
            }
        }
        orders
    }
}

/// In-memory historical store serving both snapshots and feed events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalDatabase {
    #[serde(default)]
    snapshots: Vec<BookSnapshot>,
    #[serde(default)]
    events: Vec<Order>,
}

impl HistoricalDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(snapshots: Vec<BookSnapshot>, events: Vec<Order>) -> Self {
        let mut database = Self { snapshots, events };
        database.sort();
        database
    }

    /// Load a JSON dump of snapshots and events
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ReplayResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ReplayError::FileRead(format!("{}: {}", path.as_ref().display(), e))
        })?;
        let database: HistoricalDatabase = serde_json::from_str(&content)?;
        Ok(Self::from_parts(database.snapshots, database.events))
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ReplayResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content).map_err(|e| {
            ReplayError::FileWrite(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    pub fn add_snapshot(&mut self, snapshot: BookSnapshot) {
        let at = self.snapshots.partition_point(|s| s.timestamp <= snapshot.timestamp);
        self.snapshots.insert(at, snapshot);
    }

    /// Append an event; events sharing a timestamp keep insertion order
    pub fn add_event(&mut self, order: Order) {
        let at = self.events.partition_point(|e| e.timestamp() <= order.timestamp());
        self.events.insert(at, order);
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Time span covered by the stored events
    pub fn event_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.events.first()?.timestamp(), self.events.last()?.timestamp()))
    }

    fn sort(&mut self) {
        self.snapshots.sort_by_key(|s| s.timestamp);
        self.events.sort_by_key(|e| e.timestamp());
    }
}

impl SnapshotStore for HistoricalDatabase {
    fn latest_snapshot_at(
        &self,
        timestamp: DateTime<Utc>,
        ticker: &str,
    ) -> ReplayResult<Option<BookSnapshot>> {
        let end = self.snapshots.partition_point(|s| s.timestamp <= timestamp);
        Ok(self.snapshots[..end]
            .iter()
            .rev()
            .find(|s| s.ticker == ticker)
            .cloned())
    }
}

impl HistoricalFeed for HistoricalDatabase {
    fn events_in(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        ticker: &str,
    ) -> ReplayResult<Vec<Order>> {
        let first = self.events.partition_point(|e| e.timestamp() <= start);
        Ok(self.events[first..]
            .iter()
            .take_while(|e| e.timestamp() <= end)
            .filter(|e| e.header().ticker == ticker)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2012, 6, 21, 10, 0, 0).unwrap()
    }

    fn fields() -> BTreeMap<String, i64> {
        BTreeMap::from([
            ("buy_price_0".to_string(), 990_000),
            ("buy_volume_0".to_string(), 10),
            ("buy_price_1".to_string(), 980_000),
            ("buy_volume_1".to_string(), 5),
            ("sell_price_0".to_string(), 1_010_000),
            ("sell_volume_0".to_string(), 10),
            ("sell_price_1".to_string(), 9_999_999_999),
            ("sell_volume_1".to_string(), 0),
            ("sell_price_2".to_string(), 1_030_000),
        ])
    }

    fn event(seconds: i64, id: u64) -> Order {
        LimitOrder::new(
            OrderHeader::external(t0() + Duration::seconds(seconds), Side::Buy, "MSFT", id),
            Price::from_ticks(970_000),
            1,
        )
        .into()
    }

    #[test]
    fn test_from_fields_skips_placeholders() {
        let snapshot = BookSnapshot::from_fields(t0(), "MSFT", &fields());

        assert_eq!(snapshot.levels.len(), 3);
        assert_eq!(snapshot.field("buy_price_1"), Some(980_000));
        assert_eq!(snapshot.field("sell_volume_0"), Some(10));
        assert_eq!(snapshot.field("sell_price_1"), None);
        assert_eq!(snapshot.field("sell_price_2"), None);
        assert_eq!(
            snapshot.price_range(),
            (Price::from_ticks(980_000), Price::from_ticks(1_010_000))
        );
    }

    #[test]
    fn test_level_orders_filter() {
        let snapshot = BookSnapshot::from_fields(t0(), "MSFT", &fields());
        let all = snapshot.level_orders(5, |_, _| true);
        assert_eq!(all.len(), 3);

        let outer = snapshot.level_orders(5, |side, price| {
            side == Side::Buy && price < Price::from_ticks(990_000)
        });
        assert_eq!(outer.len(), 1);
        assert_eq!(outer[0].volume, 5);

        assert_eq!(snapshot.level_orders(1, |_, _| true).len(), 2);
    }

    #[test]
    fn test_price_range_within_level_limit() {
        let snapshot = BookSnapshot::from_fields(t0(), "MSFT", &fields());

        assert_eq!(
            snapshot.price_range_within(1),
            (Price::from_ticks(990_000), Price::from_ticks(1_010_000))
        );
        assert_eq!(snapshot.price_range_within(0), (Price::ZERO, Price::INFINITY));
        assert_eq!(snapshot.price_range_within(5), snapshot.price_range());
    }

    #[test]
    fn test_latest_snapshot_at() {
        let mut db = HistoricalDatabase::new();
        db.add_snapshot(BookSnapshot::new(t0() + Duration::seconds(10), "MSFT", vec![]));
        db.add_snapshot(BookSnapshot::new(t0(), "MSFT", vec![]));

        let found = db.latest_snapshot_at(t0() + Duration::seconds(5), "MSFT").unwrap();
        assert_eq!(found.map(|s| s.timestamp), Some(t0()));
        assert!(db.latest_snapshot_at(t0() - Duration::seconds(1), "MSFT").unwrap().is_none());
        assert!(db.latest_snapshot_at(t0(), "AAPL").unwrap().is_none());
    }

    #[test]
    fn test_events_in_is_left_open_right_closed() {
        let mut db = HistoricalDatabase::new();
        for (seconds, id) in [(0, 1), (1, 2), (1, 3), (2, 4)] {
            db.add_event(event(seconds, id));
        }

        let events = db.events_in(t0(), t0() + Duration::seconds(1), "MSFT").unwrap();
        let ids: Vec<_> = events.iter().filter_map(Order::external_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
