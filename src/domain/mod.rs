//! Domain types for the margin trading ledger.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, AccountId, Instrument, Side, Clock
//! - Account, Trade, Quote and Command records

pub mod account;
pub mod command;
pub mod decimal;
pub mod primitives;
pub mod quote;
pub mod trade;

pub use account::{Account, AccountUpdate};
pub use command::{Command, Operation, OrderSize};
pub use decimal::Decimal;
pub use primitives::{AccountId, Clock, Instrument, ManualClock, Side, SystemClock, TimeMs};
pub use quote::Quote;
pub use trade::{Trade, TradeState};
