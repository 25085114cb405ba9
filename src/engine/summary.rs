use crate::domain::{Account, Decimal, Quote, TimeMs};
use serde::Serialize;

use super::{DebtPolicy, MarginParams, PositionBook};

/// Point-in-time view of an account, valued at the quote close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub cash: Decimal,
    pub equity: Decimal,
    /// Unrealized P&L (equity minus cash).
    pub profit: Decimal,
    pub margin_available: Decimal,
    pub lots_available: i64,
    pub position_size: i64,
    pub position_avg_price: Decimal,
    /// Compounded debt.
    pub debt: Decimal,
    /// Quote close used for valuation.
    pub rate: Decimal,
}

/// `cash` plus unrealized P&L at `mark`.
pub fn equity(book: &PositionBook, cash: Decimal, mark: Decimal) -> Decimal {
    cash + book.unrealized_pl(mark)
}

/// Equity not committed to open positions, floored at zero.
pub fn margin_available(
    book: &PositionBook,
    cash: Decimal,
    mark: Decimal,
    params: &MarginParams,
) -> Decimal {
    let used = book.used_margin(mark, params.margin_ratio);
    (equity(book, cash, mark) - used).max(Decimal::zero())
}

/// Whole lots that `margin_available` could open at `price`.
pub fn lots_available(margin_available: Decimal, price: Decimal, params: &MarginParams) -> i64 {
    if !price.is_positive() {
        return 0;
    }
    let lot = Decimal::from_units(params.lot_unit);
    (margin_available * params.leverage() / price / lot).floor_units()
}

pub struct SummaryCalculator<'a> {
    params: &'a MarginParams,
    policy: &'a DebtPolicy,
}

impl<'a> SummaryCalculator<'a> {
    pub fn new(params: &'a MarginParams, policy: &'a DebtPolicy) -> Self {
        Self { params, policy }
    }

    pub fn summarize(
        &self,
        book: &PositionBook,
        account: &Account,
        quote: &Quote,
        now: TimeMs,
    ) -> Summary {
        let mark = quote.mark_price();
        let equity = equity(book, account.cash, mark);
        let margin_available = margin_available(book, account.cash, mark, self.params);

        Summary {
            cash: account.cash,
            equity,
            profit: equity - account.cash,
            margin_available,
            lots_available: lots_available(margin_available, mark, self.params),
            position_size: book.net_size(),
            position_avg_price: book.avg_entry_price(),
            debt: self.policy.current_debt(account, now),
            rate: mark,
        }
    }

    /// Equity net of compounded debt, the figure accounts are ranked by.
    pub fn net_equity(
        &self,
        book: &PositionBook,
        account: &Account,
        mark: Decimal,
        now: TimeMs,
    ) -> Decimal {
        equity(book, account.cash, mark) - self.policy.current_debt(account, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, Instrument, Trade};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn book_with(size: i64, entry: &str) -> PositionBook {
        let trade = Trade::open(
            "t1".to_string(),
            AccountId::new("alice"),
            Instrument::new("USD/JPY"),
            size,
            d(entry),
            TimeMs::new(1000),
        );
        PositionBook::from_trades(AccountId::new("alice"), Instrument::new("USD/JPY"), vec![trade])
    }

    #[test]
    fn test_flat_summary() {
        let params = MarginParams::default();
        let policy = DebtPolicy::default();
        let account = Account::new(AccountId::new("alice"), d("1000000"));
        let book = PositionBook::new(AccountId::new("alice"), Instrument::new("USD/JPY"));

        let summary = SummaryCalculator::new(&params, &policy).summarize(
            &book,
            &account,
            &Quote::flat(d("130")),
            TimeMs::new(0),
        );

        assert_eq!(summary.equity, d("1000000"));
        assert_eq!(summary.profit, Decimal::zero());
        assert_eq!(summary.margin_available, d("1000000"));
        // 1,000,000 * 20 / 130 = 153,846 units -> 15 lots
        assert_eq!(summary.lots_available, 15);
        assert_eq!(summary.position_size, 0);
        assert_eq!(summary.position_avg_price, Decimal::zero());
        assert_eq!(summary.debt, Decimal::zero());
        assert_eq!(summary.rate, d("130"));
    }

    #[test]
    fn test_open_long_summary() {
        let params = MarginParams::default();
        let policy = DebtPolicy::default();
        let account = Account::new(AccountId::new("alice"), d("1000000"));
        let book = book_with(100_000, "130");

        let summary = SummaryCalculator::new(&params, &policy).summarize(
            &book,
            &account,
            &Quote::flat(d("132")),
            TimeMs::new(0),
        );

        assert_eq!(summary.equity, d("1200000"));
        assert_eq!(summary.profit, d("200000"));
        // used margin = 100,000 * 132 * 0.05 = 660,000
        assert_eq!(summary.margin_available, d("540000"));
        assert_eq!(summary.position_size, 100_000);
        assert_eq!(summary.position_avg_price, d("130"));
    }

    #[test]
    fn test_margin_available_floors_at_zero() {
        let params = MarginParams::default();
        let book = book_with(-150_000, "130");
        // Price spike wipes out equity.
        let available = margin_available(&book, d("1000000"), d("140"), &params);
        assert_eq!(available, Decimal::zero());
    }

    #[test]
    fn test_margin_restored_after_close() {
        let params = MarginParams::default();
        let mut book = book_with(100_000, "130");
        let before = margin_available(&book, d("1000000"), d("130"), &params);
        book.close_all(d("130"), TimeMs::new(2000));
        let after = margin_available(&book, d("1000000"), d("130"), &params);
        assert!(after > before);
        assert_eq!(after, d("1000000"));
    }

    #[test]
    fn test_lots_available_zero_price() {
        let params = MarginParams::default();
        assert_eq!(lots_available(d("1000000"), Decimal::zero(), &params), 0);
    }
}
