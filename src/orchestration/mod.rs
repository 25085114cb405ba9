//! Command orchestration: serialises work per account and wires the engine
//! to persistence and quotes.

pub mod desk;
pub mod locks;

pub use desk::{
    CommandOutcome, DeskError, DeskSettings, OrderOutcome, OrderRequest, TradingDesk,
};
pub use locks::{AccountGuard, AccountLocks};
