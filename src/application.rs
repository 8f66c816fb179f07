use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Currency, Money, Rate};
use crate::errors::{CreditError, Result};
use crate::types::{CreditId, CreditStatus, CustomerId, ProductKind};

/// one record per payment event against a credit; append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repayment {
    pub id: Uuid,
    pub credit_id: CreditId,
    pub amount: Money,
    pub currency: Currency,
    /// auto-debited by the settlement cascade from mandatory savings
    pub from_mandatory_savings: bool,
    /// auto-debited by the settlement cascade from the caution account
    pub from_caution: bool,
    pub on_time: bool,
    pub days_late: u32,
    pub recorded_at: DateTime<Utc>,
}

/// the central credit aggregate
///
/// invariant once disbursed:
/// `remaining_balance = approved + total_interest + late_interest − total_paid ≥ 0`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditApplication {
    pub id: CreditId,
    pub customer_id: CustomerId,
    pub product: ProductKind,
    pub currency: Currency,

    pub requested_amount: Money,
    pub approved_amount: Money,
    pub disbursed_amount: Money,
    pub processing_fee: Money,
    pub interest_rate: Rate,
    pub caution_rate: Rate,
    pub caution_amount: Money,
    pub duration_months: u32,

    pub status: CreditStatus,
    pub total_interest: Money,
    pub late_interest: Money,
    pub total_paid: Money,
    pub remaining_balance: Money,

    /// short-overdraft credits are renewed automatically after full repayment
    pub renewable: bool,
    pub renewal_of: Option<CreditId>,
    /// guarantor for the sponsor-guaranteed product
    pub sponsor_id: Option<CustomerId>,

    pub requested_at: DateTime<Utc>,
    pub documents_submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub maturity_date: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub last_status_change: DateTime<Utc>,

    pub repayments: Vec<Repayment>,
}

impl CreditApplication {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        customer_id: CustomerId,
        product: ProductKind,
        currency: Currency,
        requested_amount: Money,
        processing_fee: Money,
        interest_rate: Rate,
        caution_rate: Rate,
        duration_months: u32,
        initial_status: CreditStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            product,
            currency,
            requested_amount,
            approved_amount: requested_amount,
            disbursed_amount: Money::ZERO,
            processing_fee,
            interest_rate,
            caution_rate,
            caution_amount: requested_amount.apply_rate(caution_rate),
            duration_months,
            status: initial_status,
            total_interest: Money::ZERO,
            late_interest: Money::ZERO,
            total_paid: Money::ZERO,
            remaining_balance: Money::ZERO,
            renewable: product == ProductKind::ShortOverdraft,
            renewal_of: None,
            sponsor_id: None,
            requested_at: now,
            documents_submitted_at: None,
            reviewed_at: None,
            approved_at: None,
            disbursed_at: None,
            maturity_date: None,
            closed_at: None,
            last_status_change: now,
            repayments: Vec::new(),
        }
    }

    /// validated lifecycle transition; rejected before any mutation
    pub fn transition_to(&mut self, next: CreditStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CreditError::InvalidTransition {
                current: self.status,
                requested: next,
            });
        }
        self.status = next;
        self.last_status_change = now;
        match next {
            CreditStatus::DocumentsSubmitted => self.documents_submitted_at = Some(now),
            CreditStatus::AdminReview => self.reviewed_at = Some(now),
            CreditStatus::Approved => self.approved_at = Some(now),
            CreditStatus::Disbursed => self.disbursed_at = Some(now),
            CreditStatus::Completed | CreditStatus::Cancelled | CreditStatus::Defaulted => {
                self.closed_at = Some(now)
            }
            _ => {}
        }
        Ok(())
    }

    /// mark funds released and open the repayment balance
    pub fn record_disbursement(
        &mut self,
        net_amount: Money,
        total_interest: Money,
        maturity: DateTime<Utc>,
    ) {
        self.disbursed_amount = net_amount;
        self.total_interest = total_interest;
        self.maturity_date = Some(maturity);
        self.remaining_balance = self.approved_amount + total_interest;
    }

    /// apply a collection (manual repayment or cascade) against the balance
    pub fn apply_collection(&mut self, repayment: Repayment) {
        self.total_paid += repayment.amount;
        self.remaining_balance = (self.remaining_balance - repayment.amount).max(Money::ZERO);
        self.repayments.push(repayment);
    }

    /// surcharge applied by the penalty engine on an uncovered shortfall
    pub fn apply_late_interest(&mut self, amount: Money) {
        self.late_interest += amount;
        self.remaining_balance += amount;
    }

    pub fn is_fully_repaid(&self) -> bool {
        self.remaining_balance.is_zero()
    }

    /// whether the credit is due for the settlement cascade
    pub fn is_pending_settlement(&self, now: DateTime<Utc>) -> bool {
        self.status == CreditStatus::Disbursed
            && self.remaining_balance.is_positive()
            && self.maturity_date.map(|m| now >= m).unwrap_or(false)
    }

    /// days past maturity, zero when not yet mature
    pub fn days_late(&self, now: DateTime<Utc>) -> u32 {
        match self.maturity_date {
            Some(maturity) if now > maturity => (now - maturity).num_days().max(0) as u32,
            _ => 0,
        }
    }

    /// punctuality counters over the repayment log
    pub fn punctuality(&self) -> (u32, u32) {
        let on_time = self.repayments.iter().filter(|r| r.on_time).count() as u32;
        let late = self.repayments.len() as u32 - on_time;
        (on_time, late)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn test_application(status: CreditStatus) -> CreditApplication {
        let mut app = CreditApplication::new(
            "CUST-1".to_string(),
            ProductKind::IndividualTerm,
            Currency::Cdf,
            Money::from_major(500),
            Money::from_major(10),
            Rate::from_percentage(5),
            Rate::from_percentage(10),
            6,
            CreditStatus::EligibilityCheck,
            now(),
        );
        app.status = status;
        app
    }

    #[test]
    fn test_caution_amount_derived() {
        let app = test_application(CreditStatus::EligibilityCheck);
        assert_eq!(app.caution_amount, Money::from_major(50));
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut app = test_application(CreditStatus::DocumentsPending);
        let err = app.transition_to(CreditStatus::Disbursed, now()).unwrap_err();
        assert!(matches!(err, CreditError::InvalidTransition { .. }));
        assert_eq!(app.status, CreditStatus::DocumentsPending);
    }

    #[test]
    fn test_disbursement_opens_balance() {
        let mut app = test_application(CreditStatus::Approved);
        app.transition_to(CreditStatus::Disbursed, now()).unwrap();
        app.record_disbursement(
            Money::from_major(490),
            Money::from_major(25),
            now() + chrono::Duration::days(180),
        );
        assert_eq!(app.remaining_balance, Money::from_major(525));
        assert_eq!(app.disbursed_at, Some(now()));
    }

    #[test]
    fn test_balance_invariant_under_collections() {
        let mut app = test_application(CreditStatus::Disbursed);
        app.record_disbursement(Money::from_major(490), Money::from_major(25), now());
        app.apply_late_interest(Money::from_major(10));

        let repayment = Repayment {
            id: Uuid::new_v4(),
            credit_id: app.id,
            amount: Money::from_major(200),
            currency: Currency::Cdf,
            from_mandatory_savings: false,
            from_caution: false,
            on_time: true,
            days_late: 0,
            recorded_at: now(),
        };
        app.apply_collection(repayment);

        // remaining = approved + interest + late − paid
        let expected =
            app.approved_amount + app.total_interest + app.late_interest - app.total_paid;
        assert_eq!(app.remaining_balance, expected);
        assert_eq!(app.remaining_balance, Money::from_major(335));
    }

    #[test]
    fn test_pending_settlement_window() {
        let mut app = test_application(CreditStatus::Disbursed);
        app.record_disbursement(
            Money::from_major(490),
            Money::ZERO,
            now() + chrono::Duration::days(1),
        );
        assert!(!app.is_pending_settlement(now()));
        assert!(app.is_pending_settlement(now() + chrono::Duration::days(1)));
        assert_eq!(app.days_late(now() + chrono::Duration::days(3)), 2);
    }
}
