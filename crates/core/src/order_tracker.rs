use crate::error::TrackerError;
use crate::events::Side;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TrackerKey {
    side: Side,
    symbol: String,
}

type OrderStack = Arc<Mutex<Vec<String>>>;

/// Best-effort local ledger of accepted order ids, one LIFO stack per
/// `(side, symbol)`.
///
/// Entries are only pushed after the venue confirmed an order and only popped
/// for explicit cancellation; fills observed elsewhere never trim it.
#[derive(Debug, Default)]
pub struct OrderTracker {
    stacks: RwLock<HashMap<TrackerKey, OrderStack>>,
}

impl OrderTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an accepted order id to the tail of its key's stack.
    pub fn record(&self, side: Side, symbol: &str, order_id: impl Into<String>) {
        let stack = self.stack_for(side, symbol);
        stack.lock().push(order_id.into());
    }

    /// Removes and returns the newest id recorded for the key.
    ///
    /// # Errors
    /// Returns `NoOutstandingOrder` if nothing is recorded for the key.
    pub fn pop_last(&self, side: Side, symbol: &str) -> Result<String, TrackerError> {
        let key = TrackerKey {
            side,
            symbol: symbol.to_string(),
        };
        let stack = self.stacks.read().get(&key).cloned();
        stack
            .as_ref()
            .and_then(|stack| stack.lock().pop())
            .ok_or_else(|| TrackerError::NoOutstandingOrder {
                side,
                symbol: symbol.to_string(),
            })
    }

    /// Number of ids currently recorded for the key.
    #[must_use]
    pub fn outstanding(&self, side: Side, symbol: &str) -> usize {
        let key = TrackerKey {
            side,
            symbol: symbol.to_string(),
        };
        self.stacks
            .read()
            .get(&key)
            .map_or(0, |stack| stack.lock().len())
    }

    fn stack_for(&self, side: Side, symbol: &str) -> OrderStack {
        let key = TrackerKey {
            side,
            symbol: symbol.to_string(),
        };
        if let Some(stack) = self.stacks.read().get(&key) {
            return Arc::clone(stack);
        }
        Arc::clone(self.stacks.write().entry(key).or_default())
    }
}
