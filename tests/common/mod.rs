// Common test utilities and helpers

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use lob_replay::{
    BookSnapshot, Cancellation, Config, Deletion, HistoricalDatabase, LimitOrder, LoggingConfig,
    MarketOrder, Order, OrderHeader, Price, Side, SimulatorConfig, SnapshotLevel,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::TempDir;

pub const TICKER: &str = "MSFT";

/// Market open of the recorded day used throughout the tests
pub fn open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2012, 6, 21, 9, 30, 0).unwrap()
}

pub fn at(seconds: i64) -> DateTime<Utc> {
    open() + Duration::seconds(seconds)
}

/// Price in whole currency units
pub fn px(units: i64) -> Price {
    Price::from_ticks(units * 10_000)
}

/// Create a test configuration with sensible defaults
pub fn create_test_config() -> Config {
    Config {
        simulator: SimulatorConfig {
            ticker: TICKER.to_string(),
            n_levels: 3,
            outer_levels: 1,
            step_seconds: 1,
            max_snapshot_age_secs: 86_400,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            log_resyncs: true,
        },
    }
}

/// Create a temporary directory for test files
pub fn create_temp_dir(file_name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join(file_name);
    (temp_dir, path)
}

pub fn snapshot(at: DateTime<Utc>, buys: &[(i64, u64)], sells: &[(i64, u64)]) -> BookSnapshot {
    let mut levels = Vec::new();
    for (side, book_side) in [(Side::Buy, buys), (Side::Sell, sells)] {
        for (level, &(price, volume)) in book_side.iter().enumerate() {
            levels.push(SnapshotLevel { side, level, price: px(price), volume });
        }
    }
    BookSnapshot::new(at, TICKER, levels)
}

/// The three-level book used by the end-to-end scenarios
pub fn standard_snapshot(at: DateTime<Utc>) -> BookSnapshot {
    snapshot(at, &[(99, 10), (98, 5), (97, 3)], &[(101, 10), (102, 5), (103, 3)])
}

pub fn standard_database() -> HistoricalDatabase {
    let mut db = HistoricalDatabase::new();
    db.add_snapshot(standard_snapshot(open()));
    db
}

pub fn external_limit(at: DateTime<Utc>, side: Side, id: u64, price: i64, volume: u64) -> Order {
    LimitOrder::new(OrderHeader::external(at, side, TICKER, id), px(price), volume).into()
}

pub fn external_cancel(at: DateTime<Utc>, side: Side, id: u64, price: i64, volume: u64) -> Order {
    Cancellation::new(OrderHeader::external(at, side, TICKER, id), px(price), volume).into()
}

pub fn external_delete(at: DateTime<Utc>, side: Side, id: u64, price: i64) -> Order {
    Deletion::new(OrderHeader::external(at, side, TICKER, id), px(price), None).into()
}

pub fn internal_limit(at: DateTime<Utc>, side: Side, price: i64, volume: u64) -> Order {
    LimitOrder::new(OrderHeader::internal(at, side, TICKER), px(price), volume).into()
}

pub fn internal_market(at: DateTime<Utc>, side: Side, volume: u64) -> Order {
    MarketOrder::new(OrderHeader::internal(at, side, TICKER), volume).into()
}

/// Generate a seeded stream of feed events around a 100.00 midprice.
/// Limits rest around the touch, with occasional aggressive orders and
/// cancellations of previously placed ids.
pub fn generate_feed(seed: u64, seconds: i64, per_second: usize) -> Vec<Order> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut events = Vec::new();
    let mut live: Vec<(u64, Side, i64)> = Vec::new();
    let mut next_id = 1_000;

    for second in 1..=seconds {
        for _ in 0..per_second {
            let ts = at(second);
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            match rng.gen_range(0..10) {
                0..=5 => {
                    let offset = rng.gen_range(1..=6);
                    let price = match side {
                        Side::Buy => 100 - offset,
                        Side::Sell => 100 + offset,
                    };
                    next_id += 1;
                    live.push((next_id, side, price));
                    events.push(external_limit(ts, side, next_id, price, rng.gen_range(1..=20)));
                }
                6 | 7 => {
                    let price = match side {
                        Side::Buy => 104,
                        Side::Sell => 96,
                    };
                    next_id += 1;
                    events.push(external_limit(ts, side, next_id, price, rng.gen_range(1..=15)));
                }
                8 if !live.is_empty() => {
                    let (id, side, price) = live.remove(rng.gen_range(0..live.len()));
                    events.push(external_cancel(ts, side, id, price, rng.gen_range(1..=5)));
                }
                _ if !live.is_empty() => {
                    let (id, side, price) = live.remove(rng.gen_range(0..live.len()));
                    events.push(external_delete(ts, side, id, price));
                }
                _ => {}
            }
        }
    }

    events
}

/// Seeded database: standard opening snapshot, a mid-run snapshot and a generated feed
pub fn generated_database(seed: u64, seconds: i64) -> HistoricalDatabase {
    let mut db = standard_database();
    db.add_snapshot(snapshot(
        at(seconds / 2),
        &[(98, 7), (97, 4), (95, 9)],
        &[(102, 6), (103, 2), (106, 5)],
    ));
    for event in generate_feed(seed, seconds, 4) {
        db.add_event(event);
    }
    db
}
