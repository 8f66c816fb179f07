use crate::decimal::{Money, Rate};
use crate::errors::{CreditError, Result};
use crate::types::ProductKind;

use super::{
    check_bounds, check_no_recent_default, check_not_detained, check_savings_fraction,
    check_service_gate, check_streak, EligibilityReport, EligibilitySnapshot, MaturityOffset,
    ProductRules, ProductTerms, StreakRequirement,
};

/// medium-term individual loan with document review and a 10% caution
pub struct IndividualTerm;

impl ProductRules for IndividualTerm {
    fn kind(&self) -> ProductKind {
        ProductKind::IndividualTerm
    }

    fn terms(&self) -> ProductTerms {
        ProductTerms {
            kind: ProductKind::IndividualTerm,
            min_amount: Money::from_major(100),
            max_amount: Money::from_major(5000),
            savings_fraction: Some(Rate::from_percentage(30)),
            deposit_streak: StreakRequirement::Weeks(8),
            caution_rate: Rate::from_percentage(10),
            late_interest_rate: Rate::from_percentage(10),
            maturity: MaturityOffset::RequestedMonths,
            requires_documents: true,
            renewable: false,
        }
    }

    fn processing_fee(&self, amount: Money) -> Result<Money> {
        let fee = if amount < Money::from_major(100) {
            return Err(CreditError::FeeNotTabulated { amount });
        } else if amount <= Money::from_major(1000) {
            25
        } else if amount <= Money::from_major(3000) {
            50
        } else if amount <= Money::from_major(5000) {
            100
        } else {
            return Err(CreditError::FeeNotTabulated { amount });
        };
        Ok(Money::from_major(fee))
    }

    /// flat rate for the whole term, tiered by (amount band, duration band)
    fn interest_rate(&self, amount: Money, duration_months: u32) -> Result<Rate> {
        let band = if amount <= Money::from_major(1000) {
            0
        } else if amount <= Money::from_major(3000) {
            1
        } else if amount <= Money::from_major(5000) {
            2
        } else {
            return Err(CreditError::RateNotTabulated { amount, duration_months });
        };

        let pct = match (duration_months, band) {
            (1..=3, 0) => 5,
            (1..=3, 1) => 6,
            (1..=3, 2) => 7,
            (4..=6, 0) => 8,
            (4..=6, 1) => 9,
            (4..=6, 2) => 10,
            (7..=12, 0) => 12,
            (7..=12, 1) => 13,
            (7..=12, 2) => 15,
            _ => return Err(CreditError::RateNotTabulated { amount, duration_months }),
        };
        Ok(Rate::from_percentage(pct))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::test_support::passing_snapshot;

    #[test]
    fn test_rate_table_exact_lookup() {
        let product = IndividualTerm;
        assert_eq!(
            product.interest_rate(Money::from_major(500), 3).unwrap(),
            Rate::from_percentage(5)
        );
        assert_eq!(
            product.interest_rate(Money::from_major(2000), 6).unwrap(),
            Rate::from_percentage(9)
        );
        assert_eq!(
            product.interest_rate(Money::from_major(5000), 12).unwrap(),
            Rate::from_percentage(15)
        );
        // duration outside every band is an error, not an interpolation
        assert!(product.interest_rate(Money::from_major(500), 24).is_err());
        assert!(product.interest_rate(Money::from_major(500), 0).is_err());
    }

    #[test]
    fn test_fee_bands() {
        let product = IndividualTerm;
        assert_eq!(product.processing_fee(Money::from_major(800)).unwrap(), Money::from_major(25));
        assert_eq!(product.processing_fee(Money::from_major(2500)).unwrap(), Money::from_major(50));
        assert_eq!(product.processing_fee(Money::from_major(4000)).unwrap(), Money::from_major(100));
        assert!(product.processing_fee(Money::from_major(50)).is_err());
    }

    #[test]
    fn test_savings_fraction_enforced() {
        let mut snapshot = passing_snapshot(Money::from_major(1000));
        snapshot.mandatory_savings_balance = Money::from_major(200); // below 30%

        let report = IndividualTerm.check(&snapshot);
        assert!(!report.eligible);
        assert!(report.reasons[0].contains("mandatory savings"));
    }

    #[test]
    fn test_weekly_streak_enforced() {
        let mut snapshot = passing_snapshot(Money::from_major(1000));
        snapshot.deposit_week_streak = 5;

        let report = IndividualTerm.check(&snapshot);
        assert!(!report.eligible);
        assert!(report.reasons[0].contains("weeks"));
    }
}
