use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Currency, Money, Rate};
use crate::errors::{CreditError, Result};
use crate::types::{CreditId, CustomerId, GuaranteeId};

/// a guarantor's locked collateral against one sponsored credit
///
/// the lock is an accounting hold: the sponsor's ledger balance is untouched
/// until liability triggers, but the hold reduces the capacity available to
/// further sponsorships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorGuarantee {
    pub id: GuaranteeId,
    pub sponsor_id: CustomerId,
    pub credit_id: CreditId,
    pub guarantee_rate: Rate,
    pub locked_amount: Money,
    pub currency: Currency,
    pub active: bool,
    pub liability_triggered: bool,
    /// cumulative amount absorbed by the guarantor
    pub sponsor_paid: Money,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

/// tracks guarantees per sponsored credit and enforces capacity rules
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SponsorLedger {
    guarantees: HashMap<CreditId, SponsorGuarantee>,
}

impl SponsorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// count of concurrently sponsored credits for a guarantor
    pub fn active_count(&self, sponsor_id: &str) -> usize {
        self.guarantees
            .values()
            .filter(|g| g.active && g.sponsor_id == sponsor_id)
            .count()
    }

    /// sum of active locks held against a guarantor in a currency
    pub fn locked_total(&self, sponsor_id: &str, currency: Currency) -> Money {
        self.guarantees
            .values()
            .filter(|g| g.active && g.sponsor_id == sponsor_id && g.currency == currency)
            .map(|g| g.locked_amount)
            .sum()
    }

    /// capacity left for new locks given the sponsor's mandatory-savings balance
    pub fn free_capacity(&self, sponsor_id: &str, savings_balance: Money, currency: Currency) -> Money {
        (savings_balance - self.locked_total(sponsor_id, currency)).max(Money::ZERO)
    }

    /// record a lock; asserts the sponsor can cover all active locks plus
    /// the new one and is below the concurrent-sponsorship ceiling
    #[allow(clippy::too_many_arguments)]
    pub fn lock_guarantee(
        &mut self,
        sponsor_id: &str,
        credit_id: CreditId,
        guarantee_rate: Rate,
        sponsored_amount: Money,
        currency: Currency,
        savings_balance: Money,
        ceiling: usize,
        now: DateTime<Utc>,
    ) -> Result<&SponsorGuarantee> {
        let active = self.active_count(sponsor_id);
        if active >= ceiling {
            return Err(CreditError::SponsorCeilingReached {
                sponsor_id: sponsor_id.to_string(),
                active,
                ceiling,
            });
        }

        let locked_amount = sponsored_amount.apply_rate(guarantee_rate);
        let available = self.free_capacity(sponsor_id, savings_balance, currency);
        if available < locked_amount {
            return Err(CreditError::SponsorCapacityExceeded {
                sponsor_id: sponsor_id.to_string(),
                available,
                required: locked_amount,
            });
        }

        let guarantee = SponsorGuarantee {
            id: Uuid::new_v4(),
            sponsor_id: sponsor_id.to_string(),
            credit_id,
            guarantee_rate,
            locked_amount,
            currency,
            active: true,
            liability_triggered: false,
            sponsor_paid: Money::ZERO,
            created_at: now,
            released_at: None,
        };
        Ok(self.guarantees.entry(credit_id).or_insert(guarantee))
    }

    pub fn guarantee(&self, credit_id: CreditId) -> Option<&SponsorGuarantee> {
        self.guarantees.get(&credit_id)
    }

    pub fn active_guarantee(&self, credit_id: CreditId) -> Option<&SponsorGuarantee> {
        self.guarantees.get(&credit_id).filter(|g| g.active)
    }

    /// record the amount a guarantor absorbed when a sponsored credit fell short
    pub fn trigger_liability(&mut self, credit_id: CreditId, amount: Money) -> Result<&SponsorGuarantee> {
        let guarantee = self
            .guarantees
            .get_mut(&credit_id)
            .filter(|g| g.active)
            .ok_or(CreditError::GuaranteeNotFound { credit_id })?;
        guarantee.liability_triggered = true;
        guarantee.sponsor_paid += amount;
        Ok(guarantee)
    }

    /// free the locked capacity on successful completion of the sponsored credit
    pub fn release(&mut self, credit_id: CreditId, now: DateTime<Utc>) -> Result<&SponsorGuarantee> {
        let guarantee = self
            .guarantees
            .get_mut(&credit_id)
            .filter(|g| g.active)
            .ok_or(CreditError::GuaranteeNotFound { credit_id })?;
        guarantee.active = false;
        guarantee.released_at = Some(now);
        Ok(guarantee)
    }
}
