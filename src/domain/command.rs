//! Structured commands handed over by the parsing layer.

use crate::domain::{AccountId, Decimal, Instrument};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Buy,
    Sell,
    /// Flatten the whole position at the current close.
    Close,
    Summary,
    Rate,
    /// Borrow against the credit line.
    Debt,
    Repay,
    Rank,
}

/// One inbound command for one account.
///
/// `size` counts lots when `|size| >= 1`, a fraction of available margin when
/// `0 < |size| < 1`, and yen for `debt`/`repay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub account_id: AccountId,
    pub operation: Operation,
    #[serde(default)]
    pub size: Option<Decimal>,
    #[serde(default)]
    pub instrument: Option<Instrument>,
    /// Invert the ranking order.
    #[serde(default)]
    pub worst: bool,
}

impl Command {
    pub fn new(account_id: AccountId, operation: Operation) -> Self {
        Command {
            account_id,
            operation,
            size: None,
            instrument: None,
            worst: false,
        }
    }

    pub fn with_size(mut self, size: Decimal) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_instrument(mut self, instrument: Instrument) -> Self {
        self.instrument = Some(instrument);
        self
    }
}

/// Requested size of a buy/sell once the command has been interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum OrderSize {
    /// Use all available margin.
    AllMargin,
    /// Fraction of available margin, strictly between 0 and 1.
    Proportion(Decimal),
    /// Absolute base units, already multiplied by the lot unit.
    Units(i64),
}
