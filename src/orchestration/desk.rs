//! Per-command unit of work: lock the account, load it, compute, persist.

use crate::config::Config;
use crate::datasource::{QuoteError, QuoteSource};
use crate::db::{LedgerStore, StoreError};
use crate::domain::{
    Account, AccountId, AccountUpdate, Clock, Command, Decimal, Instrument, Operation, OrderSize,
    Quote, Side, SystemClock, Trade,
};
use crate::engine::{
    summary, AccountLedger, DebtPolicy, Execution, LedgerError, LoanOutcome, MarginParams,
    MatchingEngine, PositionBook, RankEntry, RankingService, Summary, SummaryCalculator,
    TradeIdGenerator, UuidTradeIds,
};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::AccountLocks;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for DeskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound(id) => {
                DeskError::Ledger(LedgerError::AccountNotFound(id.to_string()))
            }
            StoreError::Database(e) => DeskError::Database(e),
        }
    }
}

/// Trading rules the desk applies to every account.
#[derive(Debug, Clone, PartialEq)]
pub struct DeskSettings {
    pub default_instrument: Instrument,
    /// Cash credited to an account the first time it is seen.
    pub initial_cash: Decimal,
    pub margin: MarginParams,
    pub debt: DebtPolicy,
    pub ranking_size: usize,
}

impl Default for DeskSettings {
    fn default() -> Self {
        Self {
            default_instrument: Instrument::new("USD/JPY"),
            initial_cash: Decimal::from_units(1_000_000),
            margin: MarginParams::default(),
            debt: DebtPolicy::default(),
            ranking_size: 10,
        }
    }
}

impl From<&Config> for DeskSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_instrument: config.default_instrument.clone(),
            initial_cash: config.initial_cash,
            margin: config.margin,
            debt: config.debt_policy.clone(),
            ranking_size: config.ranking_size,
        }
    }
}

/// Result of a buy, sell or close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOutcome {
    pub price: Decimal,
    pub before_summary: Summary,
    pub after_summary: Summary,
    pub execution: Execution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "result")]
pub enum CommandOutcome {
    Order(OrderOutcome),
    Summary(Summary),
    Rate { instrument: Instrument, quote: Quote },
    Loan(LoanOutcome),
    Repayment(LoanOutcome),
    Ranking(Vec<RankEntry>),
}

/// How a buy or sell should be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderRequest {
    Market(Side, OrderSize),
    /// No size given: flatten an opposing position, otherwise use all margin.
    Unsized(Side),
}

impl OrderRequest {
    /// Interpret a command size for `side`.
    ///
    /// Magnitudes of at least 1 count whole lots, smaller ones a fraction of
    /// available margin. A negative size trades the other side.
    pub fn from_command(
        side: Side,
        size: Option<Decimal>,
        margin: &MarginParams,
    ) -> Result<Self, LedgerError> {
        let Some(size) = size else {
            return Ok(OrderRequest::Unsized(side));
        };
        if size.is_zero() {
            return Err(LedgerError::InvalidOperand(
                "order size must not be zero".to_string(),
            ));
        }

        let side = if size.is_negative() { side.opposite() } else { side };
        let magnitude = size.abs();
        if magnitude < Decimal::one() {
            return Ok(OrderRequest::Market(side, OrderSize::Proportion(magnitude)));
        }

        let units = magnitude
            .trunc()
            .floor_units()
            .checked_mul(margin.lot_unit)
            .ok_or_else(|| LedgerError::InvalidOperand(format!("order size {} too large", size)))?;
        Ok(OrderRequest::Market(side, OrderSize::Units(units)))
    }
}

enum Intent {
    Order(OrderRequest),
    CloseAll,
}

/// Serves commands against the ledger store.
#[derive(Clone)]
pub struct TradingDesk {
    store: Arc<dyn LedgerStore>,
    quotes: Arc<dyn QuoteSource>,
    settings: Arc<DeskSettings>,
    ids: Arc<dyn TradeIdGenerator>,
    clock: Arc<dyn Clock>,
    locks: AccountLocks,
}

impl TradingDesk {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        quotes: Arc<dyn QuoteSource>,
        settings: DeskSettings,
    ) -> Self {
        Self {
            store,
            quotes,
            settings: Arc::new(settings),
            ids: Arc::new(UuidTradeIds),
            clock: Arc::new(SystemClock),
            locks: AccountLocks::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_trade_ids(mut self, ids: Arc<dyn TradeIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn settings(&self) -> &DeskSettings {
        &self.settings
    }

    /// Dispatch one structured command.
    pub async fn execute(&self, command: Command) -> Result<CommandOutcome, DeskError> {
        let Command {
            account_id,
            operation,
            size,
            instrument,
            worst,
        } = command;
        info!(account = %account_id, ?operation, size = ?size, "Executing command");

        let outcome = match operation {
            Operation::Buy | Operation::Sell => {
                let side = if operation == Operation::Buy {
                    Side::Buy
                } else {
                    Side::Sell
                };
                let request = OrderRequest::from_command(side, size, &self.settings.margin)?;
                CommandOutcome::Order(self.place_order(&account_id, request, instrument).await?)
            }
            Operation::Close => {
                CommandOutcome::Order(self.close_position(&account_id, instrument).await?)
            }
            Operation::Summary => {
                CommandOutcome::Summary(self.summary(&account_id, instrument).await?)
            }
            Operation::Rate => {
                let instrument =
                    instrument.unwrap_or_else(|| self.settings.default_instrument.clone());
                let quote = self.rate(&instrument).await?;
                CommandOutcome::Rate { instrument, quote }
            }
            Operation::Debt => {
                let size = size.ok_or_else(|| {
                    LedgerError::InvalidOperand("loan size is required".to_string())
                })?;
                CommandOutcome::Loan(self.request_debt(&account_id, size).await?)
            }
            Operation::Repay => CommandOutcome::Repayment(self.repay_debt(&account_id, size).await?),
            Operation::Rank => CommandOutcome::Ranking(self.ranking(worst, None).await?),
        };

        info!(account = %account_id, ?operation, "Command complete");
        Ok(outcome)
    }

    pub async fn buy(
        &self,
        account_id: &AccountId,
        size: Option<OrderSize>,
        instrument: Option<Instrument>,
    ) -> Result<OrderOutcome, DeskError> {
        let request = match size {
            Some(size) => OrderRequest::Market(Side::Buy, size),
            None => OrderRequest::Unsized(Side::Buy),
        };
        self.place_order(account_id, request, instrument).await
    }

    pub async fn sell(
        &self,
        account_id: &AccountId,
        size: Option<OrderSize>,
        instrument: Option<Instrument>,
    ) -> Result<OrderOutcome, DeskError> {
        let request = match size {
            Some(size) => OrderRequest::Market(Side::Sell, size),
            None => OrderRequest::Unsized(Side::Sell),
        };
        self.place_order(account_id, request, instrument).await
    }

    pub async fn place_order(
        &self,
        account_id: &AccountId,
        request: OrderRequest,
        instrument: Option<Instrument>,
    ) -> Result<OrderOutcome, DeskError> {
        self.run_order(account_id, Intent::Order(request), instrument)
            .await
    }

    /// Close the whole position at the current close.
    pub async fn close_position(
        &self,
        account_id: &AccountId,
        instrument: Option<Instrument>,
    ) -> Result<OrderOutcome, DeskError> {
        self.run_order(account_id, Intent::CloseAll, instrument).await
    }

    async fn run_order(
        &self,
        account_id: &AccountId,
        intent: Intent,
        instrument: Option<Instrument>,
    ) -> Result<OrderOutcome, DeskError> {
        let _guard = self.locks.acquire(account_id).await;
        let now = self.clock.now();

        let mut account = self
            .store
            .get_or_create_account(account_id, self.settings.initial_cash)
            .await?;
        let trades = self.store.list_open_trades(account_id).await?;
        let instrument = self.resolve_instrument(instrument, &trades)?;
        let quote = self.quotes.current_quote(&instrument).await?;
        let mut book = PositionBook::from_trades(account_id.clone(), instrument, trades);

        let calculator = SummaryCalculator::new(&self.settings.margin, &self.settings.debt);
        let before_summary = calculator.summarize(&book, &account, &quote, now);

        let engine = MatchingEngine::new(&self.settings.margin, self.ids.as_ref());
        let mut cash = account.cash;
        let execution = match intent {
            Intent::CloseAll => engine.close_all(&mut book, &mut cash, &quote, now),
            Intent::Order(OrderRequest::Unsized(side)) if opposes(side, book.net_size()) => {
                engine.close_all(&mut book, &mut cash, &quote, now)
            }
            Intent::Order(OrderRequest::Unsized(side)) => engine.execute(
                side,
                OrderSize::AllMargin,
                &mut book,
                &mut cash,
                &quote,
                now,
            )?,
            Intent::Order(OrderRequest::Market(side, size)) => {
                engine.execute(side, size, &mut book, &mut cash, &quote, now)?
            }
        };

        if execution.is_noop() {
            debug!(account = %account_id, "Order left the book unchanged");
        } else {
            // Saving every open trade also persists partially reduced legs.
            let changed: Vec<Trade> = execution
                .closed
                .iter()
                .chain(book.trades())
                .cloned()
                .collect();
            AccountLedger::new(&mut account, &self.settings.debt).settle_cash(cash);
            self.store
                .commit(account_id, &AccountUpdate::cash(account.cash), &changed)
                .await?;
            info!(
                account = %account_id,
                filled = execution.filled(),
                price = %execution.fill_price,
                realized_pl = %execution.realized_pl,
                cash = %cash,
                "Order executed"
            );
        }

        let after_summary = calculator.summarize(&book, &account, &quote, now);
        Ok(OrderOutcome {
            price: execution.fill_price,
            before_summary,
            after_summary,
            execution,
        })
    }

    /// Current summary, creating the account on first use.
    pub async fn summary(
        &self,
        account_id: &AccountId,
        instrument: Option<Instrument>,
    ) -> Result<Summary, DeskError> {
        let _guard = self.locks.acquire(account_id).await;
        let account = self
            .store
            .get_or_create_account(account_id, self.settings.initial_cash)
            .await?;
        self.summarize(account, instrument).await
    }

    /// Current summary of an existing account. Never creates one.
    pub async fn account_summary(
        &self,
        account_id: &AccountId,
        instrument: Option<Instrument>,
    ) -> Result<Summary, DeskError> {
        let _guard = self.locks.acquire(account_id).await;
        let account = self.store.get_account(account_id).await?;
        self.summarize(account, instrument).await
    }

    async fn summarize(
        &self,
        account: Account,
        instrument: Option<Instrument>,
    ) -> Result<Summary, DeskError> {
        let now = self.clock.now();
        let trades = self.store.list_open_trades(&account.account_id).await?;
        let instrument = self.resolve_instrument(instrument, &trades)?;
        let quote = self.quotes.current_quote(&instrument).await?;
        let book = PositionBook::from_trades(account.account_id.clone(), instrument, trades);
        Ok(SummaryCalculator::new(&self.settings.margin, &self.settings.debt)
            .summarize(&book, &account, &quote, now))
    }

    /// Full trade history of an existing account.
    pub async fn trade_history(&self, account_id: &AccountId) -> Result<Vec<Trade>, DeskError> {
        self.store.get_account(account_id).await?;
        Ok(self.store.list_trades(account_id).await?)
    }

    /// Whether the backing store answers.
    pub async fn store_ready(&self) -> Result<(), DeskError> {
        Ok(self.store.ping().await?)
    }

    pub async fn rate(&self, instrument: &Instrument) -> Result<Quote, DeskError> {
        Ok(self.quotes.current_quote(instrument).await?)
    }

    /// Borrow `size` against this month's allowance.
    pub async fn request_debt(
        &self,
        account_id: &AccountId,
        size: Decimal,
    ) -> Result<LoanOutcome, DeskError> {
        require_positive(size, "loan")?;
        let _guard = self.locks.acquire(account_id).await;
        let now = self.clock.now();

        let mut account = self
            .store
            .get_or_create_account(account_id, self.settings.initial_cash)
            .await?;
        let outcome = AccountLedger::new(&mut account, &self.settings.debt).apply_loan(size, now)?;

        self.store
            .commit(account_id, &AccountUpdate::from_account(&account), &[])
            .await?;
        info!(
            account = %account_id,
            size = %outcome.size,
            debt = %outcome.debt,
            month_limit = %outcome.month_limit,
            "Loan granted"
        );
        Ok(outcome)
    }

    /// Repay `size`, or as much as cash and margin allow when `None`.
    pub async fn repay_debt(
        &self,
        account_id: &AccountId,
        size: Option<Decimal>,
    ) -> Result<LoanOutcome, DeskError> {
        if let Some(size) = size {
            require_positive(size, "repayment")?;
        }
        let _guard = self.locks.acquire(account_id).await;
        let now = self.clock.now();

        let mut account = self
            .store
            .get_or_create_account(account_id, self.settings.initial_cash)
            .await?;
        let trades = self.store.list_open_trades(account_id).await?;
        let margin_available = if trades.is_empty() {
            account.cash.max(Decimal::zero())
        } else {
            let instrument = self.resolve_instrument(None, &trades)?;
            let quote = self.quotes.current_quote(&instrument).await?;
            let book = PositionBook::from_trades(account_id.clone(), instrument, trades);
            summary::margin_available(&book, account.cash, quote.mark_price(), &self.settings.margin)
        };

        let outcome = AccountLedger::new(&mut account, &self.settings.debt).apply_repayment(
            size,
            margin_available,
            now,
        )?;

        if outcome.size.is_zero() {
            debug!(account = %account_id, "Nothing to repay");
            return Ok(outcome);
        }
        self.store
            .commit(account_id, &AccountUpdate::from_account(&account), &[])
            .await?;
        info!(
            account = %account_id,
            size = %outcome.size,
            debt = %outcome.debt,
            "Debt repaid"
        );
        Ok(outcome)
    }

    /// Leaderboard by net equity. Reads a snapshot without taking account locks.
    pub async fn ranking(
        &self,
        worst: bool,
        limit: Option<usize>,
    ) -> Result<Vec<RankEntry>, DeskError> {
        let now = self.clock.now();
        let accounts = self.store.list_accounts().await?;
        let mut open_by_account: HashMap<AccountId, Vec<Trade>> = HashMap::new();
        for trade in self.store.list_all_open_trades().await? {
            open_by_account
                .entry(trade.account_id.clone())
                .or_default()
                .push(trade);
        }

        let instruments: BTreeSet<Instrument> = open_by_account
            .values()
            .flatten()
            .map(|t| t.instrument.clone())
            .collect();
        let quotes = try_join_all(
            instruments
                .iter()
                .map(|instrument| self.quotes.current_quote(instrument)),
        )
        .await?;
        let marks: HashMap<Instrument, Decimal> = instruments
            .into_iter()
            .zip(quotes.iter().map(Quote::mark_price))
            .collect();

        let holdings: Vec<(Account, PositionBook)> = accounts
            .into_iter()
            .map(|account| {
                let trades = open_by_account
                    .remove(&account.account_id)
                    .unwrap_or_default();
                let instrument = trades
                    .first()
                    .map(|t| t.instrument.clone())
                    .unwrap_or_else(|| self.settings.default_instrument.clone());
                let book = PositionBook::from_trades(account.account_id.clone(), instrument, trades);
                (account, book)
            })
            .collect();

        let limit = limit.unwrap_or(self.settings.ranking_size);
        Ok(RankingService::new(&self.settings.debt).rank(&holdings, &marks, now, worst, limit))
    }

    /// The instrument a command acts on. An account holds one instrument at a time.
    fn resolve_instrument(
        &self,
        requested: Option<Instrument>,
        open_trades: &[Trade],
    ) -> Result<Instrument, LedgerError> {
        let held = open_trades.first().map(|t| &t.instrument);
        match (requested, held) {
            (Some(requested), Some(held)) if &requested != held => {
                Err(LedgerError::InvalidOperand(format!(
                    "account holds {}, cannot trade {}",
                    held, requested
                )))
            }
            (Some(requested), _) => Ok(requested),
            (None, Some(held)) => Ok(held.clone()),
            (None, None) => Ok(self.settings.default_instrument.clone()),
        }
    }
}

/// Reject non-positive loan and repayment sizes before any store access.
fn require_positive(size: Decimal, what: &str) -> Result<(), LedgerError> {
    if size.is_positive() {
        Ok(())
    } else {
        Err(LedgerError::InvalidOperand(format!(
            "{} size must be positive",
            what
        )))
    }
}

/// True when an unsized order on `side` faces the existing position.
fn opposes(side: Side, net_size: i64) -> bool {
    match side {
        Side::Buy => net_size < 0,
        Side::Sell => net_size > 0,
    }
}
