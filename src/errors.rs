use thiserror::Error;

use crate::decimal::{Currency, Money};
use crate::types::{AccountType, CreditId, CreditStatus, CustomerId};

#[derive(Error, Debug)]
pub enum CreditError {
    #[error("insufficient balance on {account_type:?}: available {available}, requested {requested}")]
    InsufficientBalance {
        account_type: AccountType,
        available: Money,
        requested: Money,
    },

    #[error("account not found: {customer_id} {account_type:?}")]
    AccountNotFound {
        customer_id: CustomerId,
        account_type: AccountType,
    },

    #[error("account inactive: {customer_id} {account_type:?}")]
    AccountInactive {
        customer_id: CustomerId,
        account_type: AccountType,
    },

    #[error("credit not found: {credit_id}")]
    CreditNotFound { credit_id: CreditId },

    #[error("invalid transition: {current:?} -> {requested:?}")]
    InvalidTransition {
        current: CreditStatus,
        requested: CreditStatus,
    },

    #[error("customer not eligible: {reasons:?}")]
    NotEligible { reasons: Vec<String> },

    #[error("no fee table entry for amount {amount}")]
    FeeNotTabulated { amount: Money },

    #[error("no interest rate entry for amount {amount} over {duration_months} months")]
    RateNotTabulated {
        amount: Money,
        duration_months: u32,
    },

    #[error("sponsor {sponsor_id} has insufficient free capacity: available {available}, required {required}")]
    SponsorCapacityExceeded {
        sponsor_id: CustomerId,
        available: Money,
        required: Money,
    },

    #[error("sponsor {sponsor_id} already carries {active} active guarantees (ceiling {ceiling})")]
    SponsorCeilingReached {
        sponsor_id: CustomerId,
        active: usize,
        ceiling: usize,
    },

    #[error("guarantee not found for credit {credit_id}")]
    GuaranteeNotFound { credit_id: CreditId },

    #[error("no active detention for credit {credit_id}")]
    DetentionNotFound { credit_id: CreditId },

    #[error("savings group not found: {group_id}")]
    GroupNotFound { group_id: uuid::Uuid },

    #[error("customer {customer_id} has no eligibility profile")]
    ProfileNotFound { customer_id: CustomerId },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount { amount: Money },

    #[error("currency mismatch: credit is {expected}, payment is {provided}")]
    CurrencyMismatch {
        expected: Currency,
        provided: Currency,
    },
}

pub type Result<T> = std::result::Result<T, CreditError>;
