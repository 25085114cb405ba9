//! Cash and credit-line bookkeeping for a single account.
//!
//! Debt compounds once per civil day in a fixed UTC offset. Day counts compare
//! calendar dates in that offset, so a loan taken at 23:59 has accrued one day
//! at 00:00.

use crate::domain::{Account, AccountId, Decimal, TimeMs};
use chrono::{Datelike, FixedOffset, Offset, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use super::LedgerError;

/// Interest and borrowing limits for the credit line.
#[derive(Debug, Clone, PartialEq)]
pub struct DebtPolicy {
    /// Interest added per elapsed civil day (0.01 = 1%).
    pub daily_rate: Decimal,
    /// Monthly borrowing cap for accounts without an override.
    pub default_limit: Decimal,
    /// Per-account monthly caps.
    pub limit_overrides: HashMap<String, Decimal>,
    /// Offset that defines civil days and months.
    pub utc_offset: FixedOffset,
}

impl Default for DebtPolicy {
    fn default() -> Self {
        Self {
            daily_rate: Decimal::one() / Decimal::from_units(100),
            default_limit: Decimal::from_units(1_000_000),
            limit_overrides: HashMap::new(),
            utc_offset: FixedOffset::east_opt(9 * 3600).unwrap_or(Utc.fix()),
        }
    }
}

impl DebtPolicy {
    pub fn limit_for(&self, account_id: &AccountId) -> Decimal {
        self.limit_overrides
            .get(account_id.as_str())
            .copied()
            .unwrap_or(self.default_limit)
    }

    /// Whole civil days from `since` to `now`; 0 if `since` is in the future.
    pub fn elapsed_days(&self, since: TimeMs, now: TimeMs) -> i64 {
        let since = since.to_datetime().with_timezone(&self.utc_offset);
        let now = now.to_datetime().with_timezone(&self.utc_offset);
        if since > now {
            return 0;
        }
        (now.date_naive() - since.date_naive()).num_days()
    }

    /// True when both instants fall in the same civil year and month.
    pub fn same_month(&self, a: TimeMs, b: TimeMs) -> bool {
        let a = a.to_datetime().with_timezone(&self.utc_offset);
        let b = b.to_datetime().with_timezone(&self.utc_offset);
        a.year() == b.year() && a.month() == b.month()
    }

    /// Principal compounded for every civil day since the last debt mutation.
    pub fn current_debt(&self, account: &Account, now: TimeMs) -> Decimal {
        let Some(debt_date) = account.debt_date else {
            return Decimal::zero();
        };
        let days = self.elapsed_days(debt_date, now);
        let factor = Decimal::one() + self.daily_rate;
        account
            .debt
            .checked_compound(factor, days)
            .unwrap_or_else(|| {
                warn!(
                    account = %account.account_id,
                    debt = %account.debt,
                    days,
                    "Compounded debt overflowed, saturating"
                );
                Decimal::max_value()
            })
    }

    /// Amount borrowed in the current civil month.
    pub fn this_month_debt(&self, account: &Account, now: TimeMs) -> Decimal {
        match account.debt_date {
            Some(debt_date) if self.same_month(debt_date, now) => account.month_debt,
            _ => Decimal::zero(),
        }
    }

    /// Remaining borrowing allowance for this month.
    pub fn debt_limit(&self, account: &Account, now: TimeMs) -> Decimal {
        let remaining = self.limit_for(&account.account_id) - self.this_month_debt(account, now);
        remaining.max(Decimal::zero())
    }
}

/// Confirmation returned for loans and repayments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanOutcome {
    pub cash: Decimal,
    pub debt: Decimal,
    pub size: Decimal,
    /// Borrowing allowance left this month after the operation.
    pub month_limit: Decimal,
}

/// Mutating view over one account's cash and debt.
pub struct AccountLedger<'a> {
    account: &'a mut Account,
    policy: &'a DebtPolicy,
}

impl<'a> AccountLedger<'a> {
    pub fn new(account: &'a mut Account, policy: &'a DebtPolicy) -> Self {
        Self { account, policy }
    }

    pub fn cash(&self) -> Decimal {
        self.account.cash
    }

    pub fn current_debt(&self, now: TimeMs) -> Decimal {
        self.policy.current_debt(self.account, now)
    }

    pub fn debt_limit(&self, now: TimeMs) -> Decimal {
        self.policy.debt_limit(self.account, now)
    }

    /// Replace settled cash after trades realize P&L.
    pub fn settle_cash(&mut self, new_cash: Decimal) {
        self.account.cash = new_cash;
    }

    /// Borrow `size`. The compounded debt becomes the new principal.
    pub fn apply_loan(&mut self, size: Decimal, now: TimeMs) -> Result<LoanOutcome, LedgerError> {
        if !size.is_positive() {
            return Err(LedgerError::InvalidOperand(
                "loan size must be positive".to_string(),
            ));
        }
        let remaining = self.debt_limit(now);
        if size > remaining {
            return Err(LedgerError::LimitExceeded {
                requested: size,
                remaining,
            });
        }

        let current = self.current_debt(now);
        let this_month = self.policy.this_month_debt(self.account, now);

        self.account.cash += size;
        self.account.debt = current + size;
        self.account.month_debt = this_month + size;
        self.account.debt_date = Some(now);

        Ok(self.outcome(size, now))
    }

    /// Repay `size`, or as much as cash and margin allow when `size` is `None`.
    ///
    /// Payments above the compounded debt are capped at it. A resolved size of 0
    /// reports nothing repaid and leaves the account untouched.
    pub fn apply_repayment(
        &mut self,
        size: Option<Decimal>,
        margin_available: Decimal,
        now: TimeMs,
    ) -> Result<LoanOutcome, LedgerError> {
        let current = self.current_debt(now);
        let size = match size {
            Some(s) if !s.is_positive() => {
                return Err(LedgerError::InvalidOperand(
                    "repayment size must be positive".to_string(),
                ))
            }
            Some(s) => s.min(current),
            None => current
                .min(self.account.cash)
                .min(margin_available)
                .max(Decimal::zero()),
        };

        if size.is_zero() {
            return Ok(self.outcome(size, now));
        }
        if size > margin_available {
            return Err(LedgerError::InsufficientMargin {
                required: size,
                available: margin_available,
            });
        }
        if size > self.account.cash {
            return Err(LedgerError::InsufficientCash {
                required: size,
                available: self.account.cash,
            });
        }

        let this_month = self.policy.this_month_debt(self.account, now);

        self.account.cash -= size;
        self.account.debt = current - size;
        self.account.month_debt = if self.account.debt.is_zero() {
            Decimal::zero()
        } else {
            (this_month - size).max(Decimal::zero())
        };
        self.account.debt_date = Some(now);

        Ok(self.outcome(size, now))
    }

    fn outcome(&self, size: Decimal, now: TimeMs) -> LoanOutcome {
        LoanOutcome {
            cash: self.account.cash,
            debt: self.current_debt(now),
            size,
            month_limit: self.debt_limit(now),
        }
    }
}
