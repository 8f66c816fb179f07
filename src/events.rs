use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Currency, Money, Rate};
use crate::types::{CreditId, CreditStatus, CustomerId, ProductKind};

/// all events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // lifecycle events
    CreditRequested {
        credit_id: CreditId,
        customer_id: CustomerId,
        product: ProductKind,
        amount: Money,
        currency: Currency,
        timestamp: DateTime<Utc>,
    },
    DocumentsReviewed {
        credit_id: CreditId,
        reviewer_id: String,
        approved: bool,
        timestamp: DateTime<Utc>,
    },
    CautionCollected {
        credit_id: CreditId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    CreditApproved {
        credit_id: CreditId,
        approved_amount: Money,
        interest_rate: Rate,
        timestamp: DateTime<Utc>,
    },
    CreditDisbursed {
        credit_id: CreditId,
        net_amount: Money,
        processing_fee: Money,
        maturity_date: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    CreditCompleted {
        credit_id: CreditId,
        total_paid: Money,
        timestamp: DateTime<Utc>,
    },
    CreditCancelled {
        credit_id: CreditId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    CreditDefaulted {
        credit_id: CreditId,
        outstanding: Money,
        timestamp: DateTime<Utc>,
    },

    // repayment events
    RepaymentRecorded {
        credit_id: CreditId,
        amount: Money,
        on_time: bool,
        days_late: u32,
        remaining_balance: Money,
        timestamp: DateTime<Utc>,
    },

    // settlement events
    CascadeSettled {
        credit_id: CreditId,
        from_mandatory_savings: Money,
        from_caution: Money,
        shortfall: Money,
        timestamp: DateTime<Utc>,
    },
    LateInterestApplied {
        credit_id: CreditId,
        amount: Money,
        rate: Rate,
        timestamp: DateTime<Utc>,
    },
    PenaltyPosted {
        credit_id: CreditId,
        customer_id: CustomerId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    DetentionOpened {
        credit_id: CreditId,
        customer_id: CustomerId,
        outstanding_principal: Money,
        timestamp: DateTime<Utc>,
    },
    DetentionReleased {
        credit_id: CreditId,
        released_by: String,
        timestamp: DateTime<Utc>,
    },

    // sponsor events
    GuaranteeLocked {
        credit_id: CreditId,
        sponsor_id: CustomerId,
        locked_amount: Money,
        timestamp: DateTime<Utc>,
    },
    GuaranteeReleased {
        credit_id: CreditId,
        sponsor_id: CustomerId,
        timestamp: DateTime<Utc>,
    },
    SponsorLiabilityTriggered {
        credit_id: CreditId,
        sponsor_id: CustomerId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },

    // renewal events
    CreditRenewed {
        old_credit_id: CreditId,
        new_credit_id: CreditId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    RenewalBlocked {
        credit_id: CreditId,
        customer_id: CustomerId,
        reasons: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    // administrative events
    CustomerBlacklisted {
        customer_id: CustomerId,
        reason: String,
        actor_id: String,
        timestamp: DateTime<Utc>,
    },
    CustomerWhitelisted {
        customer_id: CustomerId,
        actor_id: String,
        new_limit: Option<Money>,
        timestamp: DateTime<Utc>,
    },

    // status change events
    StatusChanged {
        credit_id: CreditId,
        old_status: CreditStatus,
        new_status: CreditStatus,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
