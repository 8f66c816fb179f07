use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Currency, Money};
use crate::errors::{CreditError, Result};
use crate::types::{AccountStatus, AccountType, CustomerId};

/// a purpose-typed customer sub-account with one balance per currency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub customer_id: CustomerId,
    pub account_type: AccountType,
    pub status: AccountStatus,
    pub opened_at: DateTime<Utc>,
    balances: HashMap<Currency, Money>,
    /// calendar days on which at least one deposit landed, per currency-agnostic day
    deposit_days: BTreeSet<NaiveDate>,
}

impl Account {
    fn new(customer_id: CustomerId, account_type: AccountType, opened_at: DateTime<Utc>) -> Self {
        let balances = Currency::ALL
            .iter()
            .map(|c| (*c, Money::ZERO))
            .collect();
        Self {
            customer_id,
            account_type,
            status: AccountStatus::Active,
            opened_at,
            balances,
            deposit_days: BTreeSet::new(),
        }
    }

    pub fn balance(&self, currency: Currency) -> Money {
        self.balances.get(&currency).copied().unwrap_or(Money::ZERO)
    }
}

/// per-customer, per-type, per-currency account ledger
///
/// balances never go negative: a debit that would violate this fails
/// before any side effect is applied.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Ledger {
    accounts: HashMap<(CustomerId, AccountType), Account>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// open the six sub-accounts for a customer at onboarding; idempotent
    pub fn open_customer_accounts(&mut self, customer_id: &str, now: DateTime<Utc>) {
        for account_type in AccountType::ALL {
            self.accounts
                .entry((customer_id.to_string(), account_type))
                .or_insert_with(|| Account::new(customer_id.to_string(), account_type, now));
        }
    }

    /// open a single account if absent (used when disbursement targets a
    /// customer whose credit account was never provisioned)
    pub fn ensure_account(
        &mut self,
        customer_id: &str,
        account_type: AccountType,
        now: DateTime<Utc>,
    ) {
        self.accounts
            .entry((customer_id.to_string(), account_type))
            .or_insert_with(|| Account::new(customer_id.to_string(), account_type, now));
    }

    pub fn account(&self, customer_id: &str, account_type: AccountType) -> Result<&Account> {
        self.accounts
            .get(&(customer_id.to_string(), account_type))
            .ok_or_else(|| CreditError::AccountNotFound {
                customer_id: customer_id.to_string(),
                account_type,
            })
    }

    fn account_mut(&mut self, customer_id: &str, account_type: AccountType) -> Result<&mut Account> {
        self.accounts
            .get_mut(&(customer_id.to_string(), account_type))
            .ok_or_else(|| CreditError::AccountNotFound {
                customer_id: customer_id.to_string(),
                account_type,
            })
    }

    pub fn balance(
        &self,
        customer_id: &str,
        account_type: AccountType,
        currency: Currency,
    ) -> Result<Money> {
        Ok(self.account(customer_id, account_type)?.balance(currency))
    }

    /// check that an account exists and accepts postings, without touching it
    pub fn require_active(&self, customer_id: &str, account_type: AccountType) -> Result<()> {
        let account = self.account(customer_id, account_type)?;
        if account.status != AccountStatus::Active {
            return Err(CreditError::AccountInactive {
                customer_id: customer_id.to_string(),
                account_type,
            });
        }
        Ok(())
    }

    /// credit an account; records the deposit day for streak queries
    pub fn credit(
        &mut self,
        customer_id: &str,
        account_type: AccountType,
        currency: Currency,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !amount.is_positive() {
            return Err(CreditError::InvalidPaymentAmount { amount });
        }
        let account = self.account_mut(customer_id, account_type)?;
        if account.status != AccountStatus::Active {
            return Err(CreditError::AccountInactive {
                customer_id: customer_id.to_string(),
                account_type,
            });
        }
        let balance = account.balances.entry(currency).or_insert(Money::ZERO);
        *balance += amount;
        account.deposit_days.insert(now.date_naive());
        Ok(())
    }

    /// debit an account; fails before mutation if the balance is insufficient
    pub fn debit(
        &mut self,
        customer_id: &str,
        account_type: AccountType,
        currency: Currency,
        amount: Money,
    ) -> Result<()> {
        if !amount.is_positive() {
            return Err(CreditError::InvalidPaymentAmount { amount });
        }
        let account = self.account_mut(customer_id, account_type)?;
        if account.status != AccountStatus::Active {
            return Err(CreditError::AccountInactive {
                customer_id: customer_id.to_string(),
                account_type,
            });
        }
        let balance = account.balances.entry(currency).or_insert(Money::ZERO);
        if *balance < amount {
            let available = *balance;
            return Err(CreditError::InsufficientBalance {
                account_type,
                available,
                requested: amount,
            });
        }
        *balance -= amount;
        Ok(())
    }

    /// debit up to `amount`, bounded by the current balance; returns the
    /// amount actually taken (used by the settlement cascade)
    pub fn debit_up_to(
        &mut self,
        customer_id: &str,
        account_type: AccountType,
        currency: Currency,
        amount: Money,
    ) -> Result<Money> {
        let available = self.balance(customer_id, account_type, currency)?;
        let taken = amount.min(available);
        if taken.is_positive() {
            self.debit(customer_id, account_type, currency, taken)?;
        }
        Ok(taken)
    }

    /// move funds between two accounts of the same customer as one unit;
    /// the balance check and debit happen before the credit is applied
    pub fn transfer(
        &mut self,
        customer_id: &str,
        from: AccountType,
        to: AccountType,
        currency: Currency,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<()> {
        // both sides must exist and be active before any mutation
        self.account(customer_id, to)?;
        self.debit(customer_id, from, currency, amount)?;
        self.credit(customer_id, to, currency, amount, now)?;
        Ok(())
    }

    /// accounts are never deleted, only deactivated
    pub fn deactivate(&mut self, customer_id: &str, account_type: AccountType) -> Result<()> {
        self.account_mut(customer_id, account_type)?.status = AccountStatus::Inactive;
        Ok(())
    }

    /// trailing run of consecutive calendar days with a deposit on the
    /// given account, ending today or yesterday
    pub fn consecutive_deposit_days(
        &self,
        customer_id: &str,
        account_type: AccountType,
        as_of: NaiveDate,
    ) -> u32 {
        let Ok(account) = self.account(customer_id, account_type) else {
            return 0;
        };
        let mut day = if account.deposit_days.contains(&as_of) {
            as_of
        } else {
            as_of - Duration::days(1)
        };
        let mut run = 0;
        while account.deposit_days.contains(&day) {
            run += 1;
            day -= Duration::days(1);
        }
        run
    }

    /// trailing run of consecutive iso weeks with at least one deposit,
    /// ending this week or last week
    pub fn consecutive_deposit_weeks(
        &self,
        customer_id: &str,
        account_type: AccountType,
        as_of: NaiveDate,
    ) -> u32 {
        let Ok(account) = self.account(customer_id, account_type) else {
            return 0;
        };
        let weeks: BTreeSet<(i32, u32)> = account
            .deposit_days
            .iter()
            .map(|d| (d.iso_week().year(), d.iso_week().week()))
            .collect();

        let mut cursor = as_of;
        let current = (cursor.iso_week().year(), cursor.iso_week().week());
        if !weeks.contains(&current) {
            cursor -= Duration::weeks(1);
        }
        let mut run = 0;
        while weeks.contains(&(cursor.iso_week().year(), cursor.iso_week().week())) {
            run += 1;
            cursor -= Duration::weeks(1);
        }
        run
    }
}
