//! Account record: settled cash plus the borrowing state.

use crate::domain::{AccountId, Decimal, TimeMs};
use serde::{Deserialize, Serialize};

/// One trading account.
///
/// `cash` excludes unrealized P&L. `debt` is the principal as of `debt_date`;
/// the compounded figure is derived by `engine::AccountLedger`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    pub cash: Decimal,
    pub debt: Decimal,
    /// Principal borrowed during the calendar month of `debt_date`.
    pub month_debt: Decimal,
    /// Last loan or repayment; `None` if the account never borrowed.
    pub debt_date: Option<TimeMs>,
}

impl Account {
    /// A fresh account with the given starting cash and no debt.
    pub fn new(account_id: AccountId, cash: Decimal) -> Self {
        Account {
            account_id,
            cash,
            debt: Decimal::zero(),
            month_debt: Decimal::zero(),
            debt_date: None,
        }
    }
}

/// Field-level account mutation. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountUpdate {
    pub cash: Option<Decimal>,
    pub debt: Option<Decimal>,
    pub month_debt: Option<Decimal>,
    pub debt_date: Option<TimeMs>,
}

impl AccountUpdate {
    pub fn cash(cash: Decimal) -> Self {
        AccountUpdate {
            cash: Some(cash),
            ..Default::default()
        }
    }

    /// Every mutable field taken from `account`.
    pub fn from_account(account: &Account) -> Self {
        AccountUpdate {
            cash: Some(account.cash),
            debt: Some(account.debt),
            month_debt: Some(account.month_debt),
            debt_date: account.debt_date,
        }
    }
}
