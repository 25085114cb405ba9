pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{MockQuoteSource, QuoteError, QuoteSource, YahooQuoteSource};
pub use db::{init_db, LedgerStore, Repository, StoreError};
pub use domain::{
    Account, AccountId, Command, Decimal, Instrument, Operation, OrderSize, Quote, Side, TimeMs,
    Trade, TradeState,
};
pub use engine::{LedgerError, Summary};
pub use error::AppError;
pub use orchestration::{CommandOutcome, DeskError, DeskSettings, TradingDesk};
