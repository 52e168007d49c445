// Simulation Module
// Order book replay, matching and episode orchestration over historical data

pub mod order;
pub mod order_book;
pub mod id_bridge;
pub mod matching_engine;
pub mod history;
pub mod replay_simulator;

pub use order::{Cancellation, Deletion, FillRecord, LimitOrder, MarketOrder, Order, OrderHeader};
pub use order_book::{LevelSummary, OrderBook, PriceLevel};
pub use id_bridge::IdBridge;
pub use matching_engine::MatchingEngine;
pub use history::{BookSnapshot, HistoricalDatabase, HistoricalFeed, SnapshotLevel, SnapshotStore};
pub use replay_simulator::{EpisodeStats, PriceBounds, ReplaySimulator};
