//! Single-bar quote snapshot supplied by the rate source.

use crate::domain::Decimal;
use serde::{Deserialize, Serialize};

/// The latest `(open, high, low, close)` for one instrument.
///
/// Market orders fill at `open`; valuation marks at `close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Quote {
    pub fn new(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Self {
        Quote {
            open,
            high,
            low,
            close,
        }
    }

    /// A flat bar where every field equals `price`.
    pub fn flat(price: Decimal) -> Self {
        Quote::new(price, price, price, price)
    }

    /// Fill price for a market order submitted against this bar.
    pub fn fill_price(&self) -> Decimal {
        self.open
    }

    /// Price used to value open positions.
    pub fn mark_price(&self) -> Decimal {
        self.close
    }
}
