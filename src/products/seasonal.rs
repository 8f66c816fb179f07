use crate::decimal::{Money, Rate};
use crate::errors::{CreditError, Result};
use crate::types::ProductKind;

use super::{
    check_bounds, check_no_recent_default, check_not_detained, check_savings_fraction,
    check_service_gate, EligibilityReport, EligibilitySnapshot, MaturityOffset, ProductRules,
    ProductTerms, StreakRequirement,
};

/// minimum completed programmed-savings cycles before a seasonal credit
const MIN_SAVINGS_CYCLES: u32 = 2;
/// minimum account age in days
const MIN_ACCOUNT_AGE_DAYS: i64 = 180;

/// seasonal agricultural loan: fixed 3-month maturity, gated on a
/// programmed-savings track record rather than a deposit streak
pub struct Seasonal;

impl ProductRules for Seasonal {
    fn kind(&self) -> ProductKind {
        ProductKind::Seasonal
    }

    fn terms(&self) -> ProductTerms {
        ProductTerms {
            kind: ProductKind::Seasonal,
            min_amount: Money::from_major(200),
            max_amount: Money::from_major(4000),
            savings_fraction: Some(Rate::from_percentage(25)),
            deposit_streak: StreakRequirement::None,
            caution_rate: Rate::from_percentage(10),
            late_interest_rate: Rate::from_percentage(8),
            maturity: MaturityOffset::Months(3),
            requires_documents: true,
            renewable: false,
        }
    }

    fn processing_fee(&self, amount: Money) -> Result<Money> {
        let fee = if amount < Money::from_major(200) {
            return Err(CreditError::FeeNotTabulated { amount });
        } else if amount <= Money::from_major(1000) {
            15
        } else if amount <= Money::from_major(4000) {
            30
        } else {
            return Err(CreditError::FeeNotTabulated { amount });
        };
        Ok(Money::from_major(fee))
    }

    /// one flat seasonal rate over the fixed 3-month term
    fn interest_rate(&self, amount: Money, duration_months: u32) -> Result<Rate> {
        if amount < Money::from_major(200) || amount > Money::from_major(4000) {
            return Err(CreditError::RateNotTabulated { amount, duration_months });
        }
        Ok(Rate::from_percentage(8))
    }

    fn check(&self, snapshot: &EligibilitySnapshot) -> EligibilityReport {
        let terms = self.terms();
        let mut report = EligibilityReport::eligible();
        check_service_gate(&mut report, snapshot);
        check_bounds(&mut report, snapshot, &terms);
        check_savings_fraction(&mut report, snapshot, &terms);
        check_no_recent_default(&mut report, snapshot);
        check_not_detained(&mut report, snapshot);

        if snapshot.programmed_cycles_completed < MIN_SAVINGS_CYCLES {
            report.fail(format!(
                "{} completed programmed-savings cycles below required {}",
                snapshot.programmed_cycles_completed, MIN_SAVINGS_CYCLES
            ));
        }
        if snapshot.account_age_days < MIN_ACCOUNT_AGE_DAYS {
            report.fail(format!(
                "account age {} days below required {}",
                snapshot.account_age_days, MIN_ACCOUNT_AGE_DAYS
            ));
        }
        report
    }
}
