use crate::domain::{Account, AccountId, Decimal, Instrument, TimeMs};
use serde::Serialize;
use std::collections::HashMap;

use super::{summary, DebtPolicy, PositionBook};

/// One row of the net-equity leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    /// 1-based position in the returned ordering.
    pub rank: usize,
    pub account_id: AccountId,
    pub equity: Decimal,
    pub debt: Decimal,
    pub net_equity: Decimal,
}

/// Orders accounts by equity minus compounded debt.
pub struct RankingService<'a> {
    policy: &'a DebtPolicy,
}

impl<'a> RankingService<'a> {
    pub fn new(policy: &'a DebtPolicy) -> Self {
        Self { policy }
    }

    /// Rank every `(account, book)` pair, best first, or worst first when
    /// `worst` is set. The worst-first listing is the best-first one reversed,
    /// so tied accounts appear in input order best-first and in reverse input
    /// order worst-first.
    ///
    /// Books are valued at the mark for their instrument. A book whose
    /// instrument has no mark is valued at its own average entry price.
    pub fn rank(
        &self,
        holdings: &[(Account, PositionBook)],
        marks: &HashMap<Instrument, Decimal>,
        now: TimeMs,
        worst: bool,
        limit: usize,
    ) -> Vec<RankEntry> {
        let mut rows: Vec<RankEntry> = holdings
            .iter()
            .map(|(account, book)| {
                let mark = marks
                    .get(book.instrument())
                    .copied()
                    .unwrap_or_else(|| book.avg_entry_price());
                let equity = summary::equity(book, account.cash, mark);
                let debt = self.policy.current_debt(account, now);
                RankEntry {
                    rank: 0,
                    account_id: account.account_id.clone(),
                    equity,
                    debt,
                    net_equity: equity - debt,
                }
            })
            .collect();

        // Stable sort: ties stay in scan order.
        rows.sort_by(|a, b| b.net_equity.cmp(&a.net_equity));
        if worst {
            rows.reverse();
        }
        rows.truncate(limit);
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i + 1;
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Trade;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn flat(id: &str, cash: &str) -> (Account, PositionBook) {
        (
            Account::new(AccountId::new(id), d(cash)),
            PositionBook::new(AccountId::new(id), Instrument::new("USD/JPY")),
        )
    }

    fn ids(rows: &[RankEntry]) -> Vec<&str> {
        rows.iter().map(|r| r.account_id.as_str()).collect()
    }

    #[test]
    fn test_rank_descending_and_worst_reverses() {
        let policy = DebtPolicy::default();
        let service = RankingService::new(&policy);
        let holdings = vec![
            flat("a", "500000"),
            flat("b", "1200000"),
            flat("c", "900000"),
        ];

        let best = service.rank(&holdings, &HashMap::new(), TimeMs::new(0), false, 10);
        assert_eq!(ids(&best), vec!["b", "c", "a"]);
        assert_eq!(best[0].rank, 1);
        assert_eq!(best[0].net_equity, d("1200000"));

        let worst = service.rank(&holdings, &HashMap::new(), TimeMs::new(0), true, 10);
        assert_eq!(ids(&worst), vec!["a", "c", "b"]);
        assert_eq!(worst[0].rank, 1);
    }

    #[test]
    fn test_rank_ties_keep_scan_order() {
        let policy = DebtPolicy::default();
        let service = RankingService::new(&policy);
        let holdings = vec![flat("x", "100"), flat("y", "100"), flat("z", "200")];

        let rows = service.rank(&holdings, &HashMap::new(), TimeMs::new(0), false, 10);
        assert_eq!(ids(&rows), vec!["z", "x", "y"]);

        let rows = service.rank(&holdings, &HashMap::new(), TimeMs::new(0), true, 10);
        assert_eq!(ids(&rows), vec!["y", "x", "z"]);
        assert_eq!(rows[0].rank, 1);

        let rows = service.rank(&holdings, &HashMap::new(), TimeMs::new(0), true, 1);
        assert_eq!(ids(&rows), vec!["y"]);
    }

    #[test]
    fn test_rank_subtracts_debt_and_marks_positions() {
        let policy = DebtPolicy::default();
        let service = RankingService::new(&policy);

        let (mut borrower, borrower_book) = flat("borrower", "1500000");
        borrower.debt = d("1000000");
        borrower.debt_date = Some(TimeMs::new(0));

        let trader_id = AccountId::new("trader");
        let trade = Trade::open(
            "t1".to_string(),
            trader_id.clone(),
            Instrument::new("USD/JPY"),
            100_000,
            d("130"),
            TimeMs::new(0),
        );
        let trader = (
            Account::new(trader_id.clone(), d("1000000")),
            PositionBook::from_trades(trader_id, Instrument::new("USD/JPY"), vec![trade]),
        );

        let marks = HashMap::from([(Instrument::new("USD/JPY"), d("131"))]);
        let rows = service.rank(
            &[(borrower, borrower_book), trader],
            &marks,
            TimeMs::new(0),
            false,
            10,
        );

        assert_eq!(ids(&rows), vec!["trader", "borrower"]);
        assert_eq!(rows[0].equity, d("1100000"));
        assert_eq!(rows[1].debt, d("1000000"));
        assert_eq!(rows[1].net_equity, d("500000"));
    }

    #[test]
    fn test_rank_truncates_to_limit() {
        let policy = DebtPolicy::default();
        let service = RankingService::new(&policy);
        let holdings = vec![flat("a", "1"), flat("b", "2"), flat("c", "3")];

        let rows = service.rank(&holdings, &HashMap::new(), TimeMs::new(0), false, 2);
        assert_eq!(ids(&rows), vec!["c", "b"]);
        assert_eq!(rows[1].rank, 2);
    }
}
