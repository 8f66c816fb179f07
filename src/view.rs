/// serialization support for reporting credits to upstream systems
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::CreditApplication;
use crate::decimal::{Currency, Money, Rate};
use crate::detention::VirtualDetention;
use crate::sponsor::SponsorGuarantee;
use crate::types::{CreditId, CreditStatus, CustomerId, ProductKind};

/// serializable view of one credit's state
#[derive(Debug, Serialize, Deserialize)]
pub struct CreditView {
    pub id: CreditId,
    pub customer_id: CustomerId,
    pub product: ProductKind,
    pub currency: Currency,
    pub status: CreditStatus,
    pub requested_at: DateTime<Utc>,
    pub maturity_date: Option<DateTime<Utc>>,
    pub financial: FinancialView,
    pub repayments: RepaymentView,
    pub guarantee: Option<GuaranteeView>,
    pub detention: Option<DetentionView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinancialView {
    pub requested_amount: Money,
    pub approved_amount: Money,
    pub disbursed_amount: Money,
    pub processing_fee: Money,
    pub caution_amount: Money,
    pub interest_rate: Rate,
    pub total_interest: Money,
    pub late_interest: Money,
    pub remaining_balance: Money,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RepaymentView {
    pub total_paid: Money,
    pub payment_count: u32,
    pub on_time_count: u32,
    pub late_count: u32,
    pub last_payment_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GuaranteeView {
    pub sponsor_id: CustomerId,
    pub locked_amount: Money,
    pub liability_triggered: bool,
    pub sponsor_paid: Money,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetentionView {
    pub blocked_reason: String,
    pub outstanding_principal: Money,
    pub opened_at: DateTime<Utc>,
}

impl CreditView {
    pub fn from_parts(
        app: &CreditApplication,
        guarantee: Option<&SponsorGuarantee>,
        detention: Option<&VirtualDetention>,
    ) -> Self {
        let (on_time_count, late_count) = app.punctuality();
        CreditView {
            id: app.id,
            customer_id: app.customer_id.clone(),
            product: app.product,
            currency: app.currency,
            status: app.status,
            requested_at: app.requested_at,
            maturity_date: app.maturity_date,
            financial: FinancialView {
                requested_amount: app.requested_amount,
                approved_amount: app.approved_amount,
                disbursed_amount: app.disbursed_amount,
                processing_fee: app.processing_fee,
                caution_amount: app.caution_amount,
                interest_rate: app.interest_rate,
                total_interest: app.total_interest,
                late_interest: app.late_interest,
                remaining_balance: app.remaining_balance,
            },
            repayments: RepaymentView {
                total_paid: app.total_paid,
                payment_count: app.repayments.len() as u32,
                on_time_count,
                late_count,
                last_payment_at: app.repayments.last().map(|r| r.recorded_at),
            },
            guarantee: guarantee.map(|g| GuaranteeView {
                sponsor_id: g.sponsor_id.clone(),
                locked_amount: g.locked_amount,
                liability_triggered: g.liability_triggered,
                sponsor_paid: g.sponsor_paid,
            }),
            detention: detention.map(|d| DetentionView {
                blocked_reason: d.blocked_reason.clone(),
                outstanding_principal: d.outstanding.principal,
                opened_at: d.opened_at,
            }),
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_view_round_trips_through_json() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let app = CreditApplication::new(
            "CUST-1".to_string(),
            ProductKind::ShortOverdraft,
            Currency::Cdf,
            Money::from_major(100),
            Money::from_major(5),
            Rate::ZERO,
            Rate::ZERO,
            0,
            CreditStatus::EligibilityCheck,
            now,
        );
        let view = CreditView::from_parts(&app, None, None);
        let json = view.to_json_pretty().unwrap();
        assert!(json.contains("\"ShortOverdraft\""));

        let parsed: CreditView = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, app.id);
        assert_eq!(parsed.financial.requested_amount, Money::from_major(100));
        assert_eq!(parsed.repayments.payment_count, 0);
    }
}
