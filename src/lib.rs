// Limit Order Book Replay Library
//
// Replays historical order flow into a price-time priority matching engine and
// lets callers inject their own orders alongside it

pub mod types;
pub mod error;       // Unified error handling
pub mod config;
pub mod progress;
pub mod simulation;

// Re-export core types
pub use types::{Origin, Price, Side, TICKS_PER_UNIT};

// Re-export error types
pub use error::{ReplayError, ReplayResult};

// Re-export configuration
pub use config::{Config, ConfigError, LoggingConfig, SimulatorConfig};

// Re-export simulation components
pub use simulation::{
    BookSnapshot, Cancellation, Deletion, EpisodeStats, FillRecord, HistoricalDatabase,
    HistoricalFeed, IdBridge, LimitOrder, MarketOrder, MatchingEngine, Order, OrderBook,
    OrderHeader, PriceBounds, ReplaySimulator, SnapshotLevel, SnapshotStore,
};
