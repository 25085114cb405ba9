//! Trade record: one open position leg or one settled closure.

use crate::domain::{AccountId, Decimal, Instrument, TimeMs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeState {
    Open,
    Done,
}

impl TradeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeState::Open => "open",
            TradeState::Done => "done",
        }
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TradeState::Open),
            "done" => Ok(TradeState::Done),
            other => Err(format!("unknown trade state: {}", other)),
        }
    }
}

/// A position leg. Positive size is long, negative is short.
///
/// The sign of `size` never changes after creation. Reductions shrink the
/// magnitude and emit a separate `Done` record for the closed portion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub account_id: AccountId,
    pub instrument: Instrument,
    pub state: TradeState,
    pub size: i64,
    pub entry_price: Decimal,
    pub entry_time: TimeMs,
    pub exit_price: Option<Decimal>,
    pub exit_time: Option<TimeMs>,
    /// Account cash right after the operation that closed this trade.
    pub exit_cash: Option<Decimal>,
}

impl Trade {
    pub fn open(
        trade_id: String,
        account_id: AccountId,
        instrument: Instrument,
        size: i64,
        entry_price: Decimal,
        entry_time: TimeMs,
    ) -> Self {
        Trade {
            trade_id,
            account_id,
            instrument,
            state: TradeState::Open,
            size,
            entry_price,
            entry_time,
            exit_price: None,
            exit_time: None,
            exit_cash: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == TradeState::Open
    }

    pub fn is_long(&self) -> bool {
        self.size > 0
    }

    /// Profit/loss of this trade valued at `price`.
    pub fn pl_at(&self, price: Decimal) -> Decimal {
        Decimal::from_units(self.size) * (price - self.entry_price)
    }

    /// Settle this trade at `price`.
    pub fn close(mut self, price: Decimal, time: TimeMs) -> Self {
        self.state = TradeState::Done;
        self.exit_price = Some(price);
        self.exit_time = Some(time);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn trade(size: i64, entry: &str) -> Trade {
        Trade::open(
            "t1".to_string(),
            AccountId::new("alice"),
            Instrument::new("USD/JPY"),
            size,
            d(entry),
            TimeMs::new(1000),
        )
    }

    #[test]
    fn test_long_and_short_pl() {
        assert_eq!(trade(10_000, "130").pl_at(d("132")), d("20000"));
        assert_eq!(trade(-10_000, "130").pl_at(d("132")), d("-20000"));
    }

    #[test]
    fn test_close_sets_exit_fields() {
        let closed = trade(10_000, "130").close(d("131.5"), TimeMs::new(2000));
        assert_eq!(closed.state, TradeState::Done);
        assert_eq!(closed.exit_price, Some(d("131.5")));
        assert_eq!(closed.exit_time, Some(TimeMs::new(2000)));
        assert_eq!(closed.size, 10_000);
        assert_eq!(closed.pl_at(d("131.5")), d("15000"));
    }

    #[test]
    fn test_trade_state_parse() {
        assert_eq!("open".parse::<TradeState>(), Ok(TradeState::Open));
        assert_eq!("done".parse::<TradeState>(), Ok(TradeState::Done));
        assert!("canceled".parse::<TradeState>().is_err());
    }
}
