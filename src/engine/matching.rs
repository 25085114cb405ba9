//! Market order execution against a single quote.
//!
//! Orders fill at the quote open. Opposite-facing trades are netted FIFO
//! (one directional position per account, no hedging), and whatever size
//! remains opens a new trade only if margin covers all of it.

use crate::domain::{Decimal, OrderSize, Quote, Side, TimeMs, Trade};
use serde::Serialize;
use tracing::debug;

use super::summary::margin_available;
use super::{LedgerError, MarginParams, PositionBook, TradeIdGenerator};

/// What one order (or a close-all) did to the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub fill_price: Decimal,
    /// Signed size the order asked for after sizing, 0 if it sized to nothing.
    pub requested: i64,
    /// Closure records, in the order they were settled.
    pub closed: Vec<Trade>,
    pub opened: Option<Trade>,
    /// Signed residual that was dropped for lack of margin.
    pub dropped: i64,
    /// Realized P&L booked into cash.
    pub realized_pl: Decimal,
}

impl Execution {
    fn empty(fill_price: Decimal) -> Self {
        Self {
            fill_price,
            requested: 0,
            closed: Vec::new(),
            opened: None,
            dropped: 0,
            realized_pl: Decimal::zero(),
        }
    }

    /// True when the book and cash were left untouched.
    pub fn is_noop(&self) -> bool {
        self.closed.is_empty() && self.opened.is_none()
    }

    /// Signed change in net position.
    pub fn filled(&self) -> i64 {
        let closed: i64 = self.closed.iter().map(|t| t.size).sum();
        self.opened.as_ref().map_or(0, |t| t.size) - closed
    }
}

pub struct MatchingEngine<'a> {
    params: &'a MarginParams,
    ids: &'a dyn TradeIdGenerator,
}

impl<'a> MatchingEngine<'a> {
    pub fn new(params: &'a MarginParams, ids: &'a dyn TradeIdGenerator) -> Self {
        Self { params, ids }
    }

    /// Execute a market order, updating `book` and `cash` in place.
    ///
    /// An order that sizes to zero lots is a no-op, not an error.
    pub fn execute(
        &self,
        side: Side,
        size: OrderSize,
        book: &mut PositionBook,
        cash: &mut Decimal,
        quote: &Quote,
        now: TimeMs,
    ) -> Result<Execution, LedgerError> {
        let price = quote.fill_price();
        if !price.is_positive() || !quote.mark_price().is_positive() {
            return Err(LedgerError::InvalidOperand(format!(
                "quote prices must be positive, got open {} close {}",
                quote.open,
                quote.close
            )));
        }

        let units = self.size_units(size, book, *cash, quote)?;
        if units == 0 {
            debug!(account = %book.account_id(), %side, "Order sized to zero lots");
            return Ok(Execution::empty(price));
        }

        let requested = side.sign() * units;
        let netting = book.net_against(requested, price, now, self.ids);
        let realized_pl = netting.realized_pl();
        *cash += realized_pl;

        let mut execution = Execution {
            fill_price: price,
            requested,
            closed: netting.closed,
            opened: None,
            dropped: 0,
            realized_pl,
        };

        let residual = netting.remaining;
        if residual != 0 {
            let notional = Decimal::from_units(residual.abs()) * price;
            let capacity = margin_available(book, *cash, quote.mark_price(), self.params)
                * self.params.leverage();
            if notional > capacity {
                debug!(
                    account = %book.account_id(),
                    residual,
                    %notional,
                    %capacity,
                    "Residual exceeds margin, dropping"
                );
                execution.dropped = residual;
            } else {
                let trade = Trade::open(
                    self.ids.next_id(),
                    book.account_id().clone(),
                    book.instrument().clone(),
                    residual,
                    price,
                    now,
                );
                book.push(trade.clone());
                execution.opened = Some(trade);
            }
        }

        stamp_exit_cash(&mut execution.closed, *cash);
        Ok(execution)
    }

    /// Close every open trade at the quote close.
    pub fn close_all(
        &self,
        book: &mut PositionBook,
        cash: &mut Decimal,
        quote: &Quote,
        now: TimeMs,
    ) -> Execution {
        let price = quote.mark_price();
        let mut closed = book.close_all(price, now);
        let realized_pl: Decimal = closed.iter().map(|t| t.pl_at(price)).sum();
        *cash += realized_pl;
        stamp_exit_cash(&mut closed, *cash);

        Execution {
            fill_price: price,
            requested: -closed.iter().map(|t| t.size).sum::<i64>(),
            closed,
            opened: None,
            dropped: 0,
            realized_pl,
        }
    }

    /// Resolve a requested size into unsigned base units.
    fn size_units(
        &self,
        size: OrderSize,
        book: &PositionBook,
        cash: Decimal,
        quote: &Quote,
    ) -> Result<i64, LedgerError> {
        let proportion = match size {
            OrderSize::Units(units) if units > 0 => return Ok(units),
            OrderSize::Units(units) => {
                return Err(LedgerError::InvalidOperand(format!(
                    "order size must be positive, got {}",
                    units
                )))
            }
            OrderSize::AllMargin => Decimal::one(),
            OrderSize::Proportion(p) if p.is_positive() && p < Decimal::one() => p,
            OrderSize::Proportion(p) => {
                return Err(LedgerError::InvalidOperand(format!(
                    "proportion must be between 0 and 1, got {}",
                    p
                )))
            }
        };

        let available = margin_available(book, cash, quote.mark_price(), self.params)
            * self.params.leverage()
            * proportion;
        let raw_units = (available / quote.fill_price()).floor_units();
        Ok(self.params.truncate_to_lots(raw_units))
    }
}

fn stamp_exit_cash(closed: &mut [Trade], cash: Decimal) {
    for trade in closed {
        trade.exit_cash = Some(cash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, Instrument};
    use crate::engine::SequentialTradeIds;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn empty_book() -> PositionBook {
        PositionBook::new(AccountId::new("alice"), Instrument::new("USD/JPY"))
    }

    #[test]
    fn test_proportional_buy_truncates_to_lots() {
        let params = MarginParams::default();
        let ids = SequentialTradeIds::new("t");
        let engine = MatchingEngine::new(&params, &ids);
        let mut book = empty_book();
        let mut cash = d("1000000");

        let exec = engine
            .execute(
                Side::Buy,
                OrderSize::Proportion(d("0.5")),
                &mut book,
                &mut cash,
                &Quote::flat(d("100")),
                TimeMs::new(1000),
            )
            .unwrap();

        // 1,000,000 * 20 * 0.5 / 100 = 100,000 units = 10 lots
        assert_eq!(exec.requested, 100_000);
        assert_eq!(book.net_size(), 100_000);
        assert_eq!(cash, d("1000000"));
    }

    #[test]
    fn test_fill_uses_open_not_close() {
        let params = MarginParams::default();
        let ids = SequentialTradeIds::new("t");
        let engine = MatchingEngine::new(&params, &ids);
        let mut book = empty_book();
        let mut cash = d("1000000");
        let quote = Quote::new(d("130"), d("131"), d("129"), d("130.5"));

        let exec = engine
            .execute(
                Side::Sell,
                OrderSize::Units(10_000),
                &mut book,
                &mut cash,
                &quote,
                TimeMs::new(1000),
            )
            .unwrap();

        assert_eq!(exec.fill_price, d("130"));
        assert_eq!(exec.opened.unwrap().entry_price, d("130"));
        assert_eq!(book.net_size(), -10_000);
    }

    #[test]
    fn test_tiny_proportion_is_noop() {
        let params = MarginParams::default();
        let ids = SequentialTradeIds::new("t");
        let engine = MatchingEngine::new(&params, &ids);
        let mut book = empty_book();
        let mut cash = d("10000");

        let exec = engine
            .execute(
                Side::Buy,
                OrderSize::Proportion(d("0.1")),
                &mut book,
                &mut cash,
                &Quote::flat(d("130")),
                TimeMs::new(1000),
            )
            .unwrap();

        assert!(exec.is_noop());
        assert_eq!(exec.requested, 0);
        assert!(book.is_flat());
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        let params = MarginParams::default();
        let ids = SequentialTradeIds::new("t");
        let engine = MatchingEngine::new(&params, &ids);
        let mut book = empty_book();
        let mut cash = d("1000000");
        let quote = Quote::flat(d("130"));

        for size in [
            OrderSize::Units(0),
            OrderSize::Units(-10_000),
            OrderSize::Proportion(d("1")),
            OrderSize::Proportion(d("-0.5")),
        ] {
            let err = engine
                .execute(Side::Buy, size, &mut book, &mut cash, &quote, TimeMs::new(0))
                .unwrap_err();
            assert!(matches!(err, LedgerError::InvalidOperand(_)));
        }
    }

    #[test]
    fn test_residual_beyond_margin_dropped() {
        let params = MarginParams::default();
        let ids = SequentialTradeIds::new("t");
        let engine = MatchingEngine::new(&params, &ids);
        let mut book = empty_book();
        let mut cash = d("100000");

        // Capacity is 100,000 * 20 = 2,000,000; 20,000 * 130 = 2,600,000.
        let exec = engine
            .execute(
                Side::Buy,
                OrderSize::Units(20_000),
                &mut book,
                &mut cash,
                &Quote::flat(d("130")),
                TimeMs::new(0),
            )
            .unwrap();

        assert!(exec.is_noop());
        assert_eq!(exec.dropped, 20_000);
        assert!(book.is_flat());
    }

    #[test]
    fn test_flip_closes_then_opens_residual() {
        let params = MarginParams::default();
        let ids = SequentialTradeIds::new("t");
        let engine = MatchingEngine::new(&params, &ids);
        let mut book = empty_book();
        let mut cash = d("1000000");

        engine
            .execute(
                Side::Buy,
                OrderSize::Units(10_000),
                &mut book,
                &mut cash,
                &Quote::flat(d("130")),
                TimeMs::new(1000),
            )
            .unwrap();
        let exec = engine
            .execute(
                Side::Sell,
                OrderSize::Units(30_000),
                &mut book,
                &mut cash,
                &Quote::flat(d("131")),
                TimeMs::new(2000),
            )
            .unwrap();

        assert_eq!(exec.closed.len(), 1);
        assert_eq!(exec.closed[0].exit_cash, Some(d("1010000")));
        assert_eq!(exec.realized_pl, d("10000"));
        assert_eq!(exec.opened.as_ref().map(|t| t.size), Some(-20_000));
        assert_eq!(exec.filled(), -30_000);
        assert_eq!(cash, d("1010000"));
        assert_eq!(book.net_size(), -20_000);
    }

    #[test]
    fn test_close_all_uses_close_price() {
        let params = MarginParams::default();
        let ids = SequentialTradeIds::new("t");
        let engine = MatchingEngine::new(&params, &ids);
        let mut book = empty_book();
        let mut cash = d("1000000");

        engine
            .execute(
                Side::Sell,
                OrderSize::Units(20_000),
                &mut book,
                &mut cash,
                &Quote::flat(d("130")),
                TimeMs::new(1000),
            )
            .unwrap();
        let quote = Quote::new(d("128"), d("129"), d("127"), d("129"));
        let exec = engine.close_all(&mut book, &mut cash, &quote, TimeMs::new(2000));

        assert_eq!(exec.fill_price, d("129"));
        assert_eq!(exec.requested, 20_000);
        assert_eq!(exec.realized_pl, d("20000"));
        assert_eq!(cash, d("1020000"));
        assert!(book.is_flat());
    }

    #[test]
    fn test_invalid_quote_rejected() {
        let params = MarginParams::default();
        let ids = SequentialTradeIds::new("t");
        let engine = MatchingEngine::new(&params, &ids);
        let mut book = empty_book();
        let mut cash = d("1000000");

        let err = engine
            .execute(
                Side::Buy,
                OrderSize::AllMargin,
                &mut book,
                &mut cash,
                &Quote::flat(Decimal::zero()),
                TimeMs::new(0),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidOperand(_)));
    }
}
