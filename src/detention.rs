use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{CreditError, Result};
use crate::types::{CreditId, CustomerId};

/// outstanding snapshot captured when a detention opens, before any
/// late-interest surcharge is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingSnapshot {
    pub principal: Money,
    pub interest: Money,
    pub penalty: Money,
}

/// temporary restriction placed on a customer after an uncovered
/// delinquency; distinct from a terminal default
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualDetention {
    pub id: Uuid,
    pub customer_id: CustomerId,
    pub credit_id: CreditId,
    pub blocked_reason: String,
    pub outstanding: OutstandingSnapshot,
    pub active: bool,
    pub release_conditions: String,
    pub opened_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
    pub released_by: Option<String>,
}

/// at most one active detention per (customer, credit) pair
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DetentionRegistry {
    detentions: HashMap<CreditId, VirtualDetention>,
}

impl DetentionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// open a detention for an uncovered shortfall; re-opening an already
    /// active record leaves it untouched
    pub fn open(
        &mut self,
        customer_id: &str,
        credit_id: CreditId,
        reason: &str,
        outstanding: OutstandingSnapshot,
        now: DateTime<Utc>,
    ) -> &VirtualDetention {
        self.detentions
            .entry(credit_id)
            .and_modify(|d| {
                if !d.active {
                    d.active = true;
                    d.blocked_reason = reason.to_string();
                    d.outstanding = outstanding;
                    d.opened_at = now;
                    d.released_at = None;
                    d.released_by = None;
                }
            })
            .or_insert_with(|| VirtualDetention {
                id: Uuid::new_v4(),
                customer_id: customer_id.to_string(),
                credit_id,
                blocked_reason: reason.to_string(),
                outstanding,
                active: true,
                release_conditions: "full settlement of the outstanding amount or admin override"
                    .to_string(),
                opened_at: now,
                released_at: None,
                released_by: None,
            })
    }

    pub fn active_for_credit(&self, credit_id: CreditId) -> Option<&VirtualDetention> {
        self.detentions.get(&credit_id).filter(|d| d.active)
    }

    /// whether the customer carries any active detention
    pub fn customer_detained(&self, customer_id: &str) -> bool {
        self.detentions
            .values()
            .any(|d| d.active && d.customer_id == customer_id)
    }

    /// close on full settlement or admin override
    pub fn release(
        &mut self,
        credit_id: CreditId,
        released_by: &str,
        now: DateTime<Utc>,
    ) -> Result<&VirtualDetention> {
        let detention = self
            .detentions
            .get_mut(&credit_id)
            .filter(|d| d.active)
            .ok_or(CreditError::DetentionNotFound { credit_id })?;
        detention.active = false;
        detention.released_at = Some(now);
        detention.released_by = Some(released_by.to_string());
        Ok(detention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn snapshot(principal: i64) -> OutstandingSnapshot {
        OutstandingSnapshot {
            principal: Money::from_major(principal),
            interest: Money::ZERO,
            penalty: Money::ZERO,
        }
    }

    #[test]
    fn test_single_active_record_per_credit() {
        let mut registry = DetentionRegistry::new();
        let credit_id = Uuid::new_v4();

        let first = registry.open("CUST-1", credit_id, "unpaid maturity", snapshot(50), now()).id;
        // second open while active changes nothing
        let second = registry.open("CUST-1", credit_id, "other reason", snapshot(99), now()).id;
        assert_eq!(first, second);
        assert_eq!(
            registry.active_for_credit(credit_id).unwrap().outstanding.principal,
            Money::from_major(50)
        );
    }

    #[test]
    fn test_release_and_reopen() {
        let mut registry = DetentionRegistry::new();
        let credit_id = Uuid::new_v4();

        registry.open("CUST-1", credit_id, "unpaid maturity", snapshot(50), now());
        assert!(registry.customer_detained("CUST-1"));

        registry.release(credit_id, "admin-7", now()).unwrap();
        assert!(!registry.customer_detained("CUST-1"));
        assert!(registry.active_for_credit(credit_id).is_none());

        // a later delinquency may re-open with a fresh snapshot
        registry.open("CUST-1", credit_id, "unpaid again", snapshot(30), now());
        assert_eq!(
            registry.active_for_credit(credit_id).unwrap().outstanding.principal,
            Money::from_major(30)
        );
    }

    #[test]
    fn test_release_without_active_fails() {
        let mut registry = DetentionRegistry::new();
        let err = registry.release(Uuid::new_v4(), "admin-7", now()).unwrap_err();
        assert!(matches!(err, CreditError::DetentionNotFound { .. }));
    }
}
