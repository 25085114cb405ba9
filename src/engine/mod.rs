//! Pure computation engine for the margin ledger. Nothing in here performs I/O.

use crate::domain::Decimal;
use thiserror::Error;

pub mod ids;
pub mod ledger;
pub mod matching;
pub mod position_book;
pub mod ranking;
pub mod summary;

pub use ids::{SequentialTradeIds, TradeIdGenerator, UuidTradeIds};
pub use ledger::{AccountLedger, DebtPolicy, LoanOutcome};
pub use matching::{Execution, MatchingEngine};
pub use position_book::{Netting, PositionBook};
pub use ranking::{RankEntry, RankingService};
pub use summary::{Summary, SummaryCalculator};

/// Margin requirements shared by sizing, netting and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarginParams {
    /// Fraction of notional that must be backed by equity (0.05 = 20x).
    pub margin_ratio: Decimal,
    /// Minimum tradable quantity in base units.
    pub lot_unit: i64,
}

impl MarginParams {
    pub fn new(margin_ratio: Decimal, lot_unit: i64) -> Self {
        Self {
            margin_ratio,
            lot_unit,
        }
    }

    pub fn leverage(&self) -> Decimal {
        Decimal::one() / self.margin_ratio
    }

    /// Truncate a unit count toward zero to whole lots.
    pub fn truncate_to_lots(&self, units: i64) -> i64 {
        (units / self.lot_unit) * self.lot_unit
    }
}

impl Default for MarginParams {
    fn default() -> Self {
        Self {
            margin_ratio: Decimal::one() / Decimal::from_units(20),
            lot_unit: 10_000,
        }
    }
}

/// Rejections the ledger reports back to the caller. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientMargin {
        required: Decimal,
        available: Decimal,
    },
    #[error("Insufficient cash: required {required}, available {available}")]
    InsufficientCash {
        required: Decimal,
        available: Decimal,
    },
    #[error("Debt limit exceeded: requested {requested}, remaining {remaining}")]
    LimitExceeded {
        requested: Decimal,
        remaining: Decimal,
    },
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
}
