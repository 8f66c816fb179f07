use crate::decimal::{Money, Rate};
use crate::errors::{CreditError, Result};
use crate::types::ProductKind;

use super::{
    check_bounds, check_no_recent_default, check_not_detained, check_service_gate, check_streak,
    EligibilityReport, EligibilitySnapshot, MaturityOffset, ProductRules, ProductTerms,
    StreakRequirement,
};

/// loan against pooled group savings; the credit ceiling is a fixed share
/// of the pool rather than a per-customer savings fraction
pub struct GroupSavings;

impl ProductRules for GroupSavings {
    fn kind(&self) -> ProductKind {
        ProductKind::GroupSavings
    }

    fn terms(&self) -> ProductTerms {
        ProductTerms {
            kind: ProductKind::GroupSavings,
            min_amount: Money::from_major(50),
            max_amount: Money::from_major(10000),
            savings_fraction: None,
            deposit_streak: StreakRequirement::Weeks(4),
            caution_rate: Rate::ZERO,
            late_interest_rate: Rate::from_percentage(8),
            maturity: MaturityOffset::RequestedMonths,
            requires_documents: false,
            renewable: false,
        }
    }

    fn processing_fee(&self, amount: Money) -> Result<Money> {
        let fee = if amount < Money::from_major(50) {
            return Err(CreditError::FeeNotTabulated { amount });
        } else if amount <= Money::from_major(500) {
            5
        } else if amount <= Money::from_major(2000) {
            15
        } else if amount <= Money::from_major(10000) {
            25
        } else {
            return Err(CreditError::FeeNotTabulated { amount });
        };
        Ok(Money::from_major(fee))
    }

    fn interest_rate(&self, amount: Money, duration_months: u32) -> Result<Rate> {
        if amount < Money::from_major(50) || amount > Money::from_major(10000) {
            return Err(CreditError::RateNotTabulated { amount, duration_months });
        }
        let pct = match duration_months {
            1..=6 => 6,
            7..=12 => 9,
            _ => return Err(CreditError::RateNotTabulated { amount, duration_months }),
        };
        Ok(Rate::from_percentage(pct))
    }

    fn check(&self, snapshot: &EligibilitySnapshot) -> EligibilityReport {
        let terms = self.terms();
        let mut report = EligibilityReport::eligible();
        check_service_gate(&mut report, snapshot);
        check_bounds(&mut report, snapshot, &terms);
        check_streak(&mut report, snapshot, &terms);
        check_no_recent_default(&mut report, snapshot);
        check_not_detained(&mut report, snapshot);

        match &snapshot.group {
            None => report.fail("customer is not a member of a savings group"),
            Some(group) => {
                if !group.is_member {
                    report.fail("customer is not a member of the named group");
                }
                let ceiling = group.pooled_savings.apply_rate(group.pool_ceiling);
                if snapshot.amount > ceiling {
                    report.fail(format!(
                        "amount {} exceeds group ceiling {} ({} of pooled savings {})",
                        snapshot.amount, ceiling, group.pool_ceiling, group.pooled_savings
                    ));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::test_support::passing_snapshot;
    use crate::products::GroupSnapshot;

    fn snapshot_with_group(amount: Money, pooled: Money, member: bool) -> super::super::EligibilitySnapshot {
        let mut snapshot = passing_snapshot(amount);
        snapshot.group = Some(GroupSnapshot {
            is_member: member,
            pooled_savings: pooled,
            pool_ceiling: Rate::from_percentage(80),
        });
        snapshot
    }

    #[test]
    fn test_requires_group_membership() {
        let snapshot = passing_snapshot(Money::from_major(200));
        let report = GroupSavings.check(&snapshot);
        assert!(!report.eligible);
        assert!(report.reasons[0].contains("savings group"));
    }

    #[test]
    fn test_pool_ceiling() {
        // pool 1000, ceiling 80% = 800
        let snapshot = snapshot_with_group(Money::from_major(900), Money::from_major(1000), true);
        let report = GroupSavings.check(&snapshot);
        assert!(!report.eligible);
        assert!(report.reasons[0].contains("group ceiling"));

        let snapshot = snapshot_with_group(Money::from_major(800), Money::from_major(1000), true);
        let report = GroupSavings.check(&snapshot);
        assert!(report.eligible, "{:?}", report.reasons);
    }

    #[test]
    fn test_non_member_rejected() {
        let snapshot = snapshot_with_group(Money::from_major(200), Money::from_major(1000), false);
        let report = GroupSavings.check(&snapshot);
        assert!(!report.eligible);
    }

    #[test]
    fn test_rate_by_duration() {
        let product = GroupSavings;
        assert_eq!(
            product.interest_rate(Money::from_major(500), 6).unwrap(),
            Rate::from_percentage(6)
        );
        assert_eq!(
            product.interest_rate(Money::from_major(500), 12).unwrap(),
            Rate::from_percentage(9)
        );
        assert!(product.interest_rate(Money::from_major(500), 24).is_err());
    }
}
