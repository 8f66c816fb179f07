use crate::decimal::{Money, Rate};
use crate::errors::{CreditError, Result};
use crate::types::ProductKind;

use super::{
    check_bounds, check_no_recent_default, check_not_detained, check_savings_fraction,
    check_service_gate, check_streak, EligibilityReport, EligibilitySnapshot, MaturityOffset,
    ProductRules, ProductTerms, StreakRequirement,
};

/// loan backed by a third-party guarantor locking a fixed share of the amount
pub struct SponsorGuaranteed;

impl ProductRules for SponsorGuaranteed {
    fn kind(&self) -> ProductKind {
        ProductKind::SponsorGuaranteed
    }

    fn terms(&self) -> ProductTerms {
        ProductTerms {
            kind: ProductKind::SponsorGuaranteed,
            min_amount: Money::from_major(100),
            max_amount: Money::from_major(3000),
            savings_fraction: Some(Rate::from_percentage(20)),
            deposit_streak: StreakRequirement::Weeks(4),
            caution_rate: Rate::from_percentage(5),
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
            20
        } else if amount <= Money::from_major(3000) {
            40
        } else {
            return Err(CreditError::FeeNotTabulated { amount });
        };
        Ok(Money::from_major(fee))
    }

    fn interest_rate(&self, amount: Money, duration_months: u32) -> Result<Rate> {
        let band = if amount <= Money::from_major(1500) {
            0
        } else if amount <= Money::from_major(3000) {
            1
        } else {
            return Err(CreditError::RateNotTabulated { amount, duration_months });
        };

        let pct = match (duration_months, band) {
            (1..=6, 0) => 6,
            (1..=6, 1) => 7,
            (7..=12, 0) => 10,
            (7..=12, 1) => 11,
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

        match &snapshot.sponsor {
            None => report.fail("no qualified guarantor named"),
            Some(sponsor) => {
                if sponsor.active_guarantees >= sponsor.ceiling {
                    report.fail(format!(
                        "guarantor {} already carries {} active guarantees (ceiling {})",
                        sponsor.sponsor_id, sponsor.active_guarantees, sponsor.ceiling
                    ));
                }
                if sponsor.free_capacity < sponsor.required_lock {
                    report.fail(format!(
                        "guarantor {} free capacity {} below required lock {}",
                        sponsor.sponsor_id, sponsor.free_capacity, sponsor.required_lock
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
    use crate::products::SponsorSnapshot;

    fn snapshot_with_sponsor(amount: Money, free_capacity: Money, active: usize) -> super::super::EligibilitySnapshot {
        let mut snapshot = passing_snapshot(amount);
        snapshot.sponsor = Some(SponsorSnapshot {
            sponsor_id: "SPONSOR-1".to_string(),
            free_capacity,
            required_lock: amount.apply_rate(Rate::from_percentage(40)),
            active_guarantees: active,
            ceiling: 3,
        });
        snapshot
    }

    #[test]
    fn test_requires_guarantor() {
        let snapshot = passing_snapshot(Money::from_major(500));
        let report = SponsorGuaranteed.check(&snapshot);
        assert!(!report.eligible);
        assert!(report.reasons[0].contains("guarantor"));
    }

    #[test]
    fn test_guarantor_capacity_gate() {
        // 500 requested, 40% ratio -> lock 200; sponsor can only cover 150
        let snapshot = snapshot_with_sponsor(Money::from_major(500), Money::from_major(150), 0);
        let report = SponsorGuaranteed.check(&snapshot);
        assert!(!report.eligible);
        assert!(report.reasons[0].contains("free capacity"));
    }

    #[test]
    fn test_guarantor_ceiling_gate() {
        let snapshot = snapshot_with_sponsor(Money::from_major(500), Money::from_major(1000), 3);
        let report = SponsorGuaranteed.check(&snapshot);
        assert!(!report.eligible);
        assert!(report.reasons[0].contains("ceiling"));
    }

    #[test]
    fn test_eligible_with_capable_sponsor() {
        let snapshot = snapshot_with_sponsor(Money::from_major(500), Money::from_major(1000), 1);
        let report = SponsorGuaranteed.check(&snapshot);
        assert!(report.eligible, "{:?}", report.reasons);
    }

    #[test]
    fn test_rate_table() {
        let product = SponsorGuaranteed;
        assert_eq!(
            product.interest_rate(Money::from_major(500), 6).unwrap(),
            Rate::from_percentage(6)
        );
        assert_eq!(
            product.interest_rate(Money::from_major(2000), 12).unwrap(),
            Rate::from_percentage(11)
        );
        assert!(product.interest_rate(Money::from_major(500), 18).is_err());
    }
}
