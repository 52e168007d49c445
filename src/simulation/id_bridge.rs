// Id namespace bridge
// Maps order ids observed on the historical feed onto one sequential internal id space

use crate::simulation::order::{Order, OrderHeader};
use crate::types::Origin;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct IdBridge {
    external_to_internal: HashMap<u64, u64>,
    counter: u64,
}

impl IdBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next internal id (starting at 1) and return a copy of the
    /// order carrying it. External orders with an external id are remembered
    /// so later cancellations can find them.
    pub fn track(&mut self, order: &Order) -> Order {
        let internal_id = self.assign(order.header());
        order.with_internal_id(internal_id)
    }

    /// Id-assignment half of `track` for callers that build the copy themselves
    pub fn assign(&mut self, header: &OrderHeader) -> u64 {
        self.counter += 1;
        if header.origin.is_external() {
            if let Some(external_id) = header.external_id {
                self.external_to_internal.insert(external_id, self.counter);
            }
        }
        self.counter
    }

    /// Internal id an order refers to.
    ///
    /// `None` is a normal outcome: historical cancellations may reference
    /// orders submitted before the replay window started.
    pub fn resolve(&self, order: &Order) -> Option<u64> {
        self.resolve_header(order.header())
    }

    pub fn resolve_header(&self, header: &OrderHeader) -> Option<u64> {
        match header.origin {
            Origin::Internal => header.internal_id,
            Origin::External => header
                .external_id
                .and_then(|id| self.external_to_internal.get(&id).copied()),
        }
    }

    /// Drop a mapping. Absent ids are ignored since feeds send late or
    /// redundant cancellations.
    pub fn forget(&mut self, external_id: u64) {
        self.external_to_internal.remove(&external_id);
    }

    pub fn reset(&mut self) {
        self.external_to_internal.clear();
        self.counter = 0;
    }

    /// Most recently assigned internal id (0 before the first assignment)
    pub fn last_assigned(&self) -> u64 {
        self.counter
    }

    /// Number of tracked external ids
    pub fn len(&self) -> usize {
        self.external_to_internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.external_to_internal.is_empty()
    }
}
