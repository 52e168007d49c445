// Common types used across the replay engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of feed ticks in one currency unit
pub const TICKS_PER_UNIT: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Key prefix used by snapshot field names (`buy_price_0`, `sell_volume_3`, ...)
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an order came from: the historical feed or the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Internal,
    External,
}

impl Origin {
    pub fn is_external(self) -> bool {
        matches!(self, Origin::External)
    }
}

/// Fixed-point price stored as an integer number of feed ticks.
///
/// Both the historical feed and injected orders derive their prices from the
/// same tick scale, so comparisons are exact and no rounding tolerance is used.
/// `Price::ZERO` and `Price::INFINITY` are the best-price sentinels of an empty
/// buy and sell side respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    pub const ZERO: Price = Price(0);
    pub const INFINITY: Price = Price(i64::MAX);

    pub const fn from_ticks(ticks: i64) -> Self {
        Price(ticks)
    }

    pub const fn ticks(self) -> i64 {
        self.0
    }

    pub fn is_infinite(self) -> bool {
        self == Price::INFINITY
    }

    /// True for a price a resting order may carry
    pub fn is_valid(self) -> bool {
        self.0 > 0 && !self.is_infinite()
    }

    /// Currency value (tick / 10 000)
    pub fn as_f64(self) -> f64 {
        if self.is_infinite() {
            f64::INFINITY
        } else {
            self.0 as f64 / TICKS_PER_UNIT as f64
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(f, "{:.4}", self.as_f64())
        }
    }
}
