pub mod group_savings;
pub mod individual_term;
pub mod seasonal;
pub mod short_overdraft;
pub mod sponsor_guaranteed;

use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::eligibility::EligibilityResult;
use crate::errors::Result;
use crate::types::ProductKind;

pub use group_savings::GroupSavings;
pub use individual_term::IndividualTerm;
pub use seasonal::Seasonal;
pub use short_overdraft::ShortOverdraft;
pub use sponsor_guaranteed::SponsorGuaranteed;

/// accumulated eligibility outcome; reasons never short-circuit so the
/// client sees every unmet condition at once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EligibilityReport {
    pub eligible: bool,
    pub reasons: Vec<String>,
}

impl EligibilityReport {
    pub fn eligible() -> Self {
        Self {
            eligible: true,
            reasons: Vec::new(),
        }
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.eligible = false;
        self.reasons.push(reason.into());
    }
}

/// minimum run of deposits in the mandatory-savings account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreakRequirement {
    None,
    Days(u32),
    Weeks(u32),
}

/// maturity offset applied at disbursement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaturityOffset {
    /// fixed number of days (short overdraft: 1)
    Days(i64),
    /// the requested duration in months
    RequestedMonths,
    /// fixed number of months (seasonal: 3)
    Months(u32),
}

/// product constants shared by the generic approve/disburse/collect flow
#[derive(Debug, Clone, Copy)]
pub struct ProductTerms {
    pub kind: ProductKind,
    pub min_amount: Money,
    pub max_amount: Money,
    /// required mandatory-savings balance as a fraction of the request
    pub savings_fraction: Option<Rate>,
    pub deposit_streak: StreakRequirement,
    pub caution_rate: Rate,
    /// surcharge on the remaining balance after an uncovered cascade
    pub late_interest_rate: Rate,
    pub maturity: MaturityOffset,
    pub requires_documents: bool,
    pub renewable: bool,
}

/// sponsor-side facts for the sponsor-guaranteed eligibility check
#[derive(Debug, Clone)]
pub struct SponsorSnapshot {
    pub sponsor_id: String,
    pub free_capacity: Money,
    pub required_lock: Money,
    pub active_guarantees: usize,
    pub ceiling: usize,
}

/// group-side facts for the group-savings eligibility check
#[derive(Debug, Clone)]
pub struct GroupSnapshot {
    pub is_member: bool,
    pub pooled_savings: Money,
    pub pool_ceiling: Rate,
}

/// everything a product predicate may inspect, assembled by the engine
#[derive(Debug, Clone)]
pub struct EligibilitySnapshot {
    pub amount: Money,
    pub duration_months: u32,
    pub service: EligibilityResult,
    pub mandatory_savings_balance: Money,
    pub deposit_day_streak: u32,
    pub deposit_week_streak: u32,
    pub recent_default: bool,
    pub detention_active: bool,
    pub programmed_cycles_completed: u32,
    pub account_age_days: i64,
    pub sponsor: Option<SponsorSnapshot>,
    pub group: Option<GroupSnapshot>,
}

/// the per-product rule contract: constants, pricing tables, and the
/// eligibility predicate; approve/disburse/collect mechanics are generic
pub trait ProductRules: Send + Sync {
    fn kind(&self) -> ProductKind;
    fn terms(&self) -> ProductTerms;

    /// tiered flat fee by amount band; exact-match lookup, never interpolated
    fn processing_fee(&self, amount: Money) -> Result<Money>;

    /// flat interest rate by (amount band, duration band); exact-match lookup
    fn interest_rate(&self, amount: Money, duration_months: u32) -> Result<Rate>;

    /// product eligibility predicate; accumulates every unmet condition
    fn check(&self, snapshot: &EligibilitySnapshot) -> EligibilityReport;
}

/// closed dispatch over the five products
pub fn rules_for(kind: ProductKind) -> &'static dyn ProductRules {
    match kind {
        ProductKind::ShortOverdraft => &ShortOverdraft,
        ProductKind::IndividualTerm => &IndividualTerm,
        ProductKind::SponsorGuaranteed => &SponsorGuaranteed,
        ProductKind::Seasonal => &Seasonal,
        ProductKind::GroupSavings => &GroupSavings,
    }
}

/// shared checks used by every product predicate

pub(crate) fn check_service_gate(report: &mut EligibilityReport, snapshot: &EligibilitySnapshot) {
    if !snapshot.service.eligible {
        report.fail(
            snapshot
                .service
                .reason
                .clone()
                .unwrap_or_else(|| "service-level eligibility failed".to_string()),
        );
    }
}

pub(crate) fn check_bounds(
    report: &mut EligibilityReport,
    snapshot: &EligibilitySnapshot,
    terms: &ProductTerms,
) {
    if snapshot.amount < terms.min_amount || snapshot.amount > terms.max_amount {
        report.fail(format!(
            "amount {} outside bounds [{}, {}]",
            snapshot.amount, terms.min_amount, terms.max_amount
        ));
    }
}

pub(crate) fn check_savings_fraction(
    report: &mut EligibilityReport,
    snapshot: &EligibilitySnapshot,
    terms: &ProductTerms,
) {
    if let Some(fraction) = terms.savings_fraction {
        let required = snapshot.amount.apply_rate(fraction);
        if snapshot.mandatory_savings_balance < required {
            report.fail(format!(
                "mandatory savings {} below required {} ({} of request)",
                snapshot.mandatory_savings_balance, required, fraction
            ));
        }
    }
}

pub(crate) fn check_streak(
    report: &mut EligibilityReport,
    snapshot: &EligibilitySnapshot,
    terms: &ProductTerms,
) {
    match terms.deposit_streak {
        StreakRequirement::None => {}
        StreakRequirement::Days(required) => {
            if snapshot.deposit_day_streak < required {
                report.fail(format!(
                    "deposit streak {} days below required {}",
                    snapshot.deposit_day_streak, required
                ));
            }
        }
        StreakRequirement::Weeks(required) => {
            if snapshot.deposit_week_streak < required {
                report.fail(format!(
                    "deposit streak {} weeks below required {}",
                    snapshot.deposit_week_streak, required
                ));
            }
        }
    }
}

pub(crate) fn check_no_recent_default(report: &mut EligibilityReport, snapshot: &EligibilitySnapshot) {
    if snapshot.recent_default {
        report.fail("default recorded within the trailing 6-month window");
    }
}

pub(crate) fn check_not_detained(report: &mut EligibilityReport, snapshot: &EligibilitySnapshot) {
    if snapshot.detention_active {
        report.fail("customer is under an active virtual detention");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::types::Standing;

    /// a snapshot that passes every common gate; tests tighten one knob at a time
    pub fn passing_snapshot(amount: Money) -> EligibilitySnapshot {
        EligibilitySnapshot {
            amount,
            duration_months: 6,
            service: EligibilityResult {
                eligible: true,
                standing: Standing::Neutral,
                score: 60,
                limit: Money::from_major(3000),
                used: Money::ZERO,
                available: Money::from_major(3000),
                reason: None,
            },
            mandatory_savings_balance: amount,
            deposit_day_streak: 30,
            deposit_week_streak: 12,
            recent_default: false,
            detention_active: false,
            programmed_cycles_completed: 3,
            account_age_days: 365,
            sponsor: None,
            group: None,
        }
    }
}
