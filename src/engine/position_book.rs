use crate::domain::{AccountId, Decimal, Instrument, TimeMs, Trade};

use super::TradeIdGenerator;

/// Result of netting an order against opposite-facing trades.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Netting {
    /// Signed size still to be filled after netting.
    pub remaining: i64,
    /// Closure records produced, oldest trade first.
    pub closed: Vec<Trade>,
}

impl Netting {
    /// Realized P&L of everything closed by this netting.
    pub fn realized_pl(&self) -> Decimal {
        self.closed
            .iter()
            .filter_map(|t| t.exit_price.map(|price| t.pl_at(price)))
            .sum()
    }
}

/// Open trades for one account on one instrument, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionBook {
    account_id: AccountId,
    instrument: Instrument,
    trades: Vec<Trade>,
}

impl PositionBook {
    pub fn new(account_id: AccountId, instrument: Instrument) -> Self {
        Self {
            account_id,
            instrument,
            trades: Vec::new(),
        }
    }

    /// Build a book from stored trades. Closed records are ignored and the rest
    /// are ordered by entry time, keeping the given order for ties.
    pub fn from_trades(account_id: AccountId, instrument: Instrument, trades: Vec<Trade>) -> Self {
        let mut trades: Vec<Trade> = trades.into_iter().filter(Trade::is_open).collect();
        trades.sort_by_key(|t| t.entry_time);
        Self {
            account_id,
            instrument,
            trades,
        }
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn is_flat(&self) -> bool {
        self.net_size() == 0
    }

    /// Sum of open trade sizes: positive = long, negative = short.
    pub fn net_size(&self) -> i64 {
        self.trades.iter().map(|t| t.size).sum()
    }

    /// Size-weighted mean entry price, or 0 when flat.
    pub fn avg_entry_price(&self) -> Decimal {
        let net = self.net_size();
        if net == 0 {
            return Decimal::zero();
        }
        let weighted: Decimal = self
            .trades
            .iter()
            .map(|t| t.entry_price * Decimal::from_units(t.size))
            .sum();
        weighted / Decimal::from_units(net)
    }

    /// Mark-to-market P&L of the open trades at `mark`.
    pub fn unrealized_pl(&self, mark: Decimal) -> Decimal {
        self.trades.iter().map(|t| t.pl_at(mark)).sum()
    }

    /// Margin committed to open trades when valued at `mark`.
    pub fn used_margin(&self, mark: Decimal, margin_ratio: Decimal) -> Decimal {
        self.trades
            .iter()
            .map(|t| Decimal::from_units(t.size.abs()) * mark * margin_ratio)
            .sum()
    }

    /// Append a newly opened trade (it becomes the youngest).
    pub fn push(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    /// Net a signed order size against opposite-facing trades, oldest first.
    ///
    /// A trade no larger than the remaining need is closed outright. A larger
    /// trade keeps its id with a smaller size, and the matched part is split
    /// off as a new closed record.
    pub fn net_against(
        &mut self,
        size: i64,
        price: Decimal,
        time: TimeMs,
        ids: &dyn TradeIdGenerator,
    ) -> Netting {
        let mut need = size;
        let mut closed = Vec::new();
        let mut kept = Vec::with_capacity(self.trades.len());

        for mut trade in std::mem::take(&mut self.trades) {
            if need == 0 || trade.is_long() == (need > 0) {
                kept.push(trade);
                continue;
            }

            if need.abs() >= trade.size.abs() {
                need += trade.size;
                closed.push(trade.close(price, time));
            } else {
                let mut portion = trade.clone();
                portion.trade_id = ids.next_id();
                portion.size = -need;
                closed.push(portion.close(price, time));

                trade.size += need;
                need = 0;
                kept.push(trade);
            }
        }

        self.trades = kept;
        Netting {
            remaining: need,
            closed,
        }
    }

    /// Close every open trade at `price`.
    pub fn close_all(&mut self, price: Decimal, time: TimeMs) -> Vec<Trade> {
        std::mem::take(&mut self.trades)
            .into_iter()
            .map(|t| t.close(price, time))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SequentialTradeIds;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn open(id: &str, size: i64, entry: &str, time: i64) -> Trade {
        Trade::open(
            id.to_string(),
            AccountId::new("alice"),
            Instrument::new("USD/JPY"),
            size,
            d(entry),
            TimeMs::new(time),
        )
    }

    fn book(trades: Vec<Trade>) -> PositionBook {
        PositionBook::from_trades(AccountId::new("alice"), Instrument::new("USD/JPY"), trades)
    }

    #[test]
    fn test_from_trades_orders_by_entry_time_and_drops_closed() {
        let done = open("x", 10_000, "120", 500).close(d("121"), TimeMs::new(600));
        let b = book(vec![
            open("b", 10_000, "131", 2000),
            done,
            open("a", 10_000, "130", 1000),
        ]);
        let ids: Vec<_> = b.trades().iter().map(|t| t.trade_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_avg_entry_price_weighted_and_zero_when_flat() {
        let b = book(vec![
            open("a", 10_000, "130", 1000),
            open("b", 30_000, "134", 2000),
        ]);
        assert_eq!(b.net_size(), 40_000);
        assert_eq!(b.avg_entry_price(), d("133"));

        assert_eq!(book(vec![]).avg_entry_price(), Decimal::zero());
    }

    #[test]
    fn test_unrealized_pl_and_used_margin() {
        let b = book(vec![open("a", -20_000, "130", 1000)]);
        assert_eq!(b.unrealized_pl(d("129")), d("20000"));
        assert_eq!(b.used_margin(d("130"), d("0.05")), d("130000"));
    }

    #[test]
    fn test_net_against_closes_oldest_first_then_reduces() {
        let ids = SequentialTradeIds::new("split");
        let mut b = book(vec![
            open("a", 10_000, "130", 1000),
            open("b", 20_000, "131", 2000),
        ]);

        let netting = b.net_against(-15_000, d("132"), TimeMs::new(3000), &ids);

        assert_eq!(netting.remaining, 0);
        assert_eq!(netting.closed.len(), 2);
        assert_eq!(netting.closed[0].trade_id, "a");
        assert_eq!(netting.closed[0].size, 10_000);
        assert_eq!(netting.closed[1].trade_id, "split-1");
        assert_eq!(netting.closed[1].size, 5_000);
        assert_eq!(netting.closed[1].entry_price, d("131"));
        assert!(netting.closed.iter().all(|t| !t.is_open()));

        // Remaining leg keeps its identity and sign.
        assert_eq!(b.trades().len(), 1);
        assert_eq!(b.trades()[0].trade_id, "b");
        assert_eq!(b.trades()[0].size, 15_000);

        // 10k * 2 + 5k * 1
        assert_eq!(netting.realized_pl(), d("25000"));
    }

    #[test]
    fn test_net_against_leaves_residual_when_order_exceeds_book() {
        let ids = SequentialTradeIds::new("split");
        let mut b = book(vec![open("a", -10_000, "130", 1000)]);

        let netting = b.net_against(30_000, d("129"), TimeMs::new(2000), &ids);

        assert_eq!(netting.remaining, 20_000);
        assert_eq!(netting.closed.len(), 1);
        assert!(b.trades().is_empty());
    }

    #[test]
    fn test_net_against_same_direction_is_untouched() {
        let ids = SequentialTradeIds::new("split");
        let mut b = book(vec![open("a", 10_000, "130", 1000)]);

        let netting = b.net_against(10_000, d("129"), TimeMs::new(2000), &ids);

        assert_eq!(netting.remaining, 10_000);
        assert!(netting.closed.is_empty());
        assert_eq!(b.net_size(), 10_000);
    }

    #[test]
    fn test_netting_conserves_units() {
        let ids = SequentialTradeIds::new("split");
        let mut b = book(vec![
            open("a", 10_000, "130", 1000),
            open("b", 20_000, "131", 2000),
            open("c", 40_000, "132", 3000),
        ]);
        let before = b.net_size();
        let order = -45_000;

        let netting = b.net_against(order, d("133"), TimeMs::new(4000), &ids);
        let closed_units: i64 = netting.closed.iter().map(|t| t.size).sum();

        assert_eq!(b.net_size() + closed_units, before);
        assert_eq!(b.net_size() + netting.remaining, before + order);
    }

    #[test]
    fn test_close_all() {
        let mut b = book(vec![
            open("a", 10_000, "130", 1000),
            open("b", 10_000, "131", 2000),
        ]);
        let closed = b.close_all(d("132"), TimeMs::new(5000));
        assert_eq!(closed.len(), 2);
        assert!(b.is_flat());
        assert!(closed.iter().all(|t| t.exit_price == Some(d("132"))));
    }
}
