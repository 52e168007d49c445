// Order model shared by the historical feed, injected orders and the matching engine

use crate::types::{Origin, Price, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields common to every order variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub ticker: String,
    #[serde(default)]
    pub internal_id: Option<u64>,
    #[serde(default)]
    pub external_id: Option<u64>,
    pub origin: Origin,
}

impl OrderHeader {
    /// Header for an order injected by the caller
    pub fn internal(timestamp: DateTime<Utc>, side: Side, ticker: impl Into<String>) -> Self {
        Self {
            timestamp,
            side,
            ticker: ticker.into(),
            internal_id: None,
            external_id: None,
            origin: Origin::Internal,
        }
    }

    /// Header for an order observed on the historical feed
    pub fn external(
        timestamp: DateTime<Utc>,
        side: Side,
        ticker: impl Into<String>,
        external_id: u64,
    ) -> Self {
        Self {
            timestamp,
            side,
            ticker: ticker.into(),
            internal_id: None,
            external_id: Some(external_id),
            origin: Origin::External,
        }
    }

    /// Header for an aggregated level order built from a book snapshot.
    /// Snapshots carry no per-order identity, so there is no external id.
    pub fn snapshot(timestamp: DateTime<Utc>, side: Side, ticker: impl Into<String>) -> Self {
        Self {
            timestamp,
            side,
            ticker: ticker.into(),
            internal_id: None,
            external_id: None,
            origin: Origin::External,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrder {
    #[serde(flatten)]
    pub header: OrderHeader,
    pub price: Price,
    pub volume: u64,
}

impl LimitOrder {
    pub fn new(header: OrderHeader, price: Price, volume: u64) -> Self {
        Self { header, price, volume }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOrder {
    #[serde(flatten)]
    pub header: OrderHeader,
    pub volume: u64,
    /// Execution price; only set on fill record entries
    #[serde(default)]
    pub price: Option<Price>,
}

impl MarketOrder {
    pub fn new(header: OrderHeader, volume: u64) -> Self {
        Self { header, volume, price: None }
    }
}

/// Partial removal of a resting order's volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    #[serde(flatten)]
    pub header: OrderHeader,
    pub price: Price,
    pub volume: u64,
}

impl Cancellation {
    pub fn new(header: OrderHeader, price: Price, volume: u64) -> Self {
        Self { header, price, volume }
    }
}

/// Full removal of a resting order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deletion {
    #[serde(flatten)]
    pub header: OrderHeader,
    pub price: Price,
    /// Unknown for deletions of orders that were part of the initial snapshot
    #[serde(default)]
    pub volume: Option<u64>,
}

impl Deletion {
    pub fn new(header: OrderHeader, price: Price, volume: Option<u64>) -> Self {
        Self { header, price, volume }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Order {
    Limit(LimitOrder),
    Market(MarketOrder),
    Cancellation(Cancellation),
    Deletion(Deletion),
}

impl Order {
    pub fn header(&self) -> &OrderHeader {
        match self {
            Order::Limit(o) => &o.header,
            Order::Market(o) => &o.header,
            Order::Cancellation(o) => &o.header,
            Order::Deletion(o) => &o.header,
        }
    }

    fn header_mut(&mut self) -> &mut OrderHeader {
        match self {
            Order::Limit(o) => &mut o.header,
            Order::Market(o) => &mut o.header,
            Order::Cancellation(o) => &mut o.header,
            Order::Deletion(o) => &mut o.header,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.header().timestamp
    }

    pub fn side(&self) -> Side {
        self.header().side
    }

    pub fn origin(&self) -> Origin {
        self.header().origin
    }

    pub fn internal_id(&self) -> Option<u64> {
        self.header().internal_id
    }

    pub fn external_id(&self) -> Option<u64> {
        self.header().external_id
    }

    pub fn price(&self) -> Option<Price> {
        match self {
            Order::Limit(o) => Some(o.price),
            Order::Market(o) => o.price,
            Order::Cancellation(o) => Some(o.price),
            Order::Deletion(o) => Some(o.price),
        }
    }

    pub fn volume(&self) -> Option<u64> {
        match self {
            Order::Limit(o) => Some(o.volume),
            Order::Market(o) => Some(o.volume),
            Order::Cancellation(o) => Some(o.volume),
            Order::Deletion(o) => o.volume,
        }
    }

    /// Copy of this order carrying the given internal id
    pub fn with_internal_id(&self, internal_id: u64) -> Order {
        let mut order = self.clone();
        order.header_mut().internal_id = Some(internal_id);
        order
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Order::Limit(_) => "limit",
            Order::Market(_) => "market",
            Order::Cancellation(_) => "cancellation",
            Order::Deletion(_) => "deletion",
        }
    }
}

impl From<LimitOrder> for Order {
    fn from(order: LimitOrder) -> Self {
        Order::Limit(order)
    }
}

impl From<MarketOrder> for Order {
    fn from(order: MarketOrder) -> Self {
        Order::Market(order)
    }
}

impl From<Cancellation> for Order {
    fn from(order: Cancellation) -> Self {
        Order::Cancellation(order)
    }
}

impl From<Deletion> for Order {
    fn from(order: Deletion) -> Self {
        Order::Deletion(order)
    }
}

/// Filled or partially filled orders, partitioned by origin.
///
/// Each entry is a copy of the matched order whose volume is the matched
/// quantity and whose price is the execution price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRecord {
    pub internal: Vec<Order>,
    pub external: Vec<Order>,
}

impl FillRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, order: Order) {
        match order.origin() {
            Origin::Internal => self.internal.push(order),
            Origin::External => self.external.push(order),
        }
    }

    /// Append another record, preserving order within each origin
    pub fn extend(&mut self, other: FillRecord) {
        self.internal.extend(other.internal);
        self.external.extend(other.external);
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.external.is_empty()
    }

    pub fn len(&self) -> usize {
        self.internal.len() + self.external.len()
    }

    pub fn internal_volume(&self) -> u64 {
        self.internal.iter().filter_map(Order::volume).sum()
    }

    pub fn external_volume(&self) -> u64 {
        self.external.iter().filter_map(Order::volume).sum()
    }
}
