use crate::decimal::{Money, Rate};
use crate::errors::{CreditError, Result};
use crate::types::ProductKind;

use super::{
    check_bounds, check_no_recent_default, check_not_detained, check_savings_fraction,
    check_service_gate, check_streak, EligibilityReport, EligibilitySnapshot, MaturityOffset,
    ProductRules, ProductTerms, StreakRequirement,
};

/// short daily overdraft: one-day maturity, fee-only pricing, auto-renewable
pub struct ShortOverdraft;

impl ProductRules for ShortOverdraft {
    fn kind(&self) -> ProductKind {
        ProductKind::ShortOverdraft
    }

    fn terms(&self) -> ProductTerms {
        ProductTerms {
            kind: ProductKind::ShortOverdraft,
            min_amount: Money::from_major(10),
            max_amount: Money::from_major(1000),
            savings_fraction: Some(Rate::from_percentage(50)),
            deposit_streak: StreakRequirement::Days(25),
            caution_rate: Rate::ZERO,
            late_interest_rate: Rate::from_percentage(5),
            maturity: MaturityOffset::Days(1),
            requires_documents: false,
            renewable: true,
        }
    }

    fn processing_fee(&self, amount: Money) -> Result<Money> {
        let fee = if amount <= Money::from_major(100) {
            5
        } else if amount <= Money::from_major(300) {
            10
        } else if amount <= Money::from_major(600) {
            20
        } else if amount <= Money::from_major(1000) {
            30
        } else {
            return Err(CreditError::FeeNotTabulated { amount });
        };
        Ok(Money::from_major(fee))
    }

    /// the overdraft is priced entirely through its fee
    fn interest_rate(&self, _amount: Money, _duration_months: u32) -> Result<Rate> {
        Ok(Rate::ZERO)
    }

    fn check(&self, snapshot: &EligibilitySnapshot) -> EligibilityReport {
        let terms = self.terms();
        let mut report = EligibilityReport::eligible();
        check_service_gate(&mut report, snapshot);
        check_bounds(&mut report, snapshot, &terms);
        check_savings_fraction(&mut report, snapshot, &terms);
        check_streak(&mut report, snapshot, &terms);
        check_no_recent_default(&mut report, snapshot);
        check_not_detained(&mut report, snapshot);
        report
    }
}
