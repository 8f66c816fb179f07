use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{CreditError, Result};
use crate::types::{CustomerId, Standing};

/// repayment-history counters the score is a pure function of
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentStats {
    pub completed_loans: u32,
    pub defaulted_loans: u32,
    pub on_time_payments: u32,
    pub late_payments: u32,
}

/// creditworthiness score in [0, 100]
///
/// base 50; up to +30 proportional to the completed-loan ratio; up to +20
/// proportional to the on-time ratio among completed-loan payments; −10 per
/// late payment capped at −30; −50 per defaulted loan. Deterministic and
/// idempotent for a given history.
pub fn calculate_score(stats: &RepaymentStats) -> u8 {
    let mut score = Decimal::from(50);

    let total_loans = stats.completed_loans + stats.defaulted_loans;
    if total_loans > 0 {
        let completed_ratio = Decimal::from(stats.completed_loans) / Decimal::from(total_loans);
        score += Decimal::from(30) * completed_ratio;
    }

    let total_payments = stats.on_time_payments + stats.late_payments;
    if total_payments > 0 {
        let on_time_ratio = Decimal::from(stats.on_time_payments) / Decimal::from(total_payments);
        score += Decimal::from(20) * on_time_ratio;
    }

    let late_malus = Decimal::from(stats.late_payments.min(3) * 10);
    score -= late_malus;
    score -= Decimal::from(stats.defaulted_loans) * Decimal::from(50);

    score
        .round()
        .max(Decimal::ZERO)
        .min(Decimal::from(100))
        .to_u8()
        .unwrap_or(0)
}

/// per-customer eligibility profile, created lazily with neutral defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityProfile {
    pub customer_id: CustomerId,
    pub standing: Standing,
    pub score: u8,
    pub credit_limit: Money,
    pub credit_used: Money,
    pub stats: RepaymentStats,
    /// completed programmed-savings cycles (seasonal product prerequisite)
    pub programmed_cycles_completed: u32,
    pub last_default_at: Option<DateTime<Utc>>,
    pub blacklist_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl EligibilityProfile {
    fn neutral(customer_id: CustomerId, config: &EngineConfig, now: DateTime<Utc>) -> Self {
        let stats = RepaymentStats::default();
        let score = calculate_score(&stats);
        Self {
            customer_id,
            standing: Standing::Neutral,
            score,
            credit_limit: config.limit_for_score(score),
            credit_used: Money::ZERO,
            stats,
            programmed_cycles_completed: 0,
            last_default_at: None,
            blacklist_reason: None,
            updated_at: now,
        }
    }

    pub fn available_credit(&self) -> Money {
        (self.credit_limit - self.credit_used).max(Money::ZERO)
    }

    /// whether a default falls inside the trailing lookback window
    pub fn defaulted_within(&self, lookback_days: i64, now: DateTime<Utc>) -> bool {
        self.last_default_at
            .map(|at| now - at <= Duration::days(lookback_days))
            .unwrap_or(false)
    }

    /// recompute score and auto-tier the limit after a statistics update
    fn refresh(&mut self, config: &EngineConfig, now: DateTime<Utc>) {
        if self.standing == Standing::Blacklisted {
            self.score = 0;
            self.credit_limit = Money::ZERO;
        } else {
            self.score = calculate_score(&self.stats);
            self.credit_limit = config.limit_for_score(self.score);
        }
        self.updated_at = now;
    }
}

/// result of a service-level eligibility check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub eligible: bool,
    pub standing: Standing,
    pub score: u8,
    pub limit: Money,
    pub used: Money,
    pub available: Money,
    pub reason: Option<String>,
}

/// eligibility and scoring service
#[derive(Debug, Default)]
pub struct EligibilityService {
    profiles: HashMap<CustomerId, EligibilityProfile>,
}

impl EligibilityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// fetch-or-create with neutral defaults
    pub fn profile_mut(
        &mut self,
        customer_id: &str,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> &mut EligibilityProfile {
        self.profiles
            .entry(customer_id.to_string())
            .or_insert_with(|| EligibilityProfile::neutral(customer_id.to_string(), config, now))
    }

    pub fn profile(&self, customer_id: &str) -> Result<&EligibilityProfile> {
        self.profiles
            .get(customer_id)
            .ok_or_else(|| CreditError::ProfileNotFound {
                customer_id: customer_id.to_string(),
            })
    }

    /// service-level gate: fails closed on blacklist, then available credit,
    /// then minimum score; does not mutate any state beyond lazy creation
    pub fn check(
        &mut self,
        customer_id: &str,
        amount: Money,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> EligibilityResult {
        let minimum_score = config.minimum_score;
        let profile = self.profile_mut(customer_id, config, now);

        let mut result = EligibilityResult {
            eligible: true,
            standing: profile.standing,
            score: profile.score,
            limit: profile.credit_limit,
            used: profile.credit_used,
            available: profile.available_credit(),
            reason: None,
        };

        if profile.standing == Standing::Blacklisted {
            result.eligible = false;
            result.reason = Some("customer is blacklisted".to_string());
        } else if amount > result.available {
            result.eligible = false;
            result.reason = Some(format!(
                "amount {} exceeds available credit {}",
                amount, result.available
            ));
        } else if profile.score < minimum_score {
            result.eligible = false;
            result.reason = Some(format!("score below minimum {}", minimum_score));
        }

        result
    }

    /// administrative override; zeroes score and available credit immediately
    pub fn blacklist(
        &mut self,
        customer_id: &str,
        reason: &str,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) {
        let profile = self.profile_mut(customer_id, config, now);
        profile.standing = Standing::Blacklisted;
        profile.blacklist_reason = Some(reason.to_string());
        profile.refresh(config, now);
    }

    /// administrative override; clears blacklist markers and optionally
    /// raises the limit above the auto-tier
    pub fn whitelist(
        &mut self,
        customer_id: &str,
        new_limit: Option<Money>,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) {
        let profile = self.profile_mut(customer_id, config, now);
        profile.standing = Standing::Whitelisted;
        profile.blacklist_reason = None;
        profile.refresh(config, now);
        if let Some(limit) = new_limit {
            profile.credit_limit = profile.credit_limit.max(limit);
        }
    }

    /// record a completed loan and its payment punctuality counters
    pub fn record_completion(
        &mut self,
        customer_id: &str,
        on_time_payments: u32,
        late_payments: u32,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) {
        let profile = self.profile_mut(customer_id, config, now);
        profile.stats.completed_loans += 1;
        profile.stats.on_time_payments += on_time_payments;
        profile.stats.late_payments += late_payments;
        profile.refresh(config, now);
    }

    /// record a default
    pub fn record_default(
        &mut self,
        customer_id: &str,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) {
        let profile = self.profile_mut(customer_id, config, now);
        profile.stats.defaulted_loans += 1;
        profile.last_default_at = Some(now);
        profile.refresh(config, now);
    }

    /// adjust the in-use portion of the customer's limit
    pub fn adjust_used(
        &mut self,
        customer_id: &str,
        delta: Money,
        increase: bool,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) {
        let profile = self.profile_mut(customer_id, config, now);
        if increase {
            profile.credit_used += delta;
        } else {
            profile.credit_used = (profile.credit_used - delta).max(Money::ZERO);
        }
        profile.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_score_neutral_history() {
        assert_eq!(calculate_score(&RepaymentStats::default()), 50);
    }

    #[test]
    fn test_score_perfect_history() {
        let stats = RepaymentStats {
            completed_loans: 5,
            defaulted_loans: 0,
            on_time_payments: 5,
            late_payments: 0,
        };
        assert_eq!(calculate_score(&stats), 100);
    }

    #[test]
    fn test_score_default_dominates() {
        let stats = RepaymentStats {
            completed_loans: 1,
            defaulted_loans: 1,
            on_time_payments: 1,
            late_payments: 0,
        };
        // 50 + 15 + 20 - 50 = 35
        assert_eq!(calculate_score(&stats), 35);
    }

    #[test]
    fn test_score_late_malus_capped() {
        let stats = RepaymentStats {
            completed_loans: 4,
            defaulted_loans: 0,
            on_time_payments: 0,
            late_payments: 8,
        };
        // 50 + 30 + 0 - 30 (capped) = 50
        assert_eq!(calculate_score(&stats), 50);
    }

    #[test]
    fn test_score_bounds() {
        // property: score stays within [0, 100] over a sweep of histories
        for completed in 0..6 {
            for defaulted in 0..6 {
                for late in 0..10 {
                    let stats = RepaymentStats {
                        completed_loans: completed,
                        defaulted_loans: defaulted,
                        on_time_payments: completed,
                        late_payments: late,
                    };
                    let score = calculate_score(&stats);
                    assert!(score <= 100);
                }
            }
        }
    }

    #[test]
    fn test_blacklist_dominates() {
        let config = EngineConfig::default();
        let mut service = EligibilityService::new();
        service.blacklist("CUST-1", "fraud investigation", &config, now());

        let result = service.check("CUST-1", Money::from_major(1), &config, now());
        assert!(!result.eligible);
        assert_eq!(result.standing, Standing::Blacklisted);
        assert_eq!(result.score, 0);
        assert_eq!(result.available, Money::ZERO);
    }

    #[test]
    fn test_whitelist_clears_blacklist() {
        let config = EngineConfig::default();
        let mut service = EligibilityService::new();
        service.blacklist("CUST-1", "suspected fraud", &config, now());
        service.whitelist("CUST-1", Some(Money::from_major(4000)), &config, now());

        let profile = service.profile("CUST-1").unwrap();
        assert_eq!(profile.standing, Standing::Whitelisted);
        assert!(profile.blacklist_reason.is_none());
        assert_eq!(profile.credit_limit, Money::from_major(4000));
    }

    #[test]
    fn test_low_score_reason() {
        let config = EngineConfig::default();
        let mut service = EligibilityService::new();
        // two defaults push the score to zero
        service.record_default("CUST-1", &config, now());
        service.record_default("CUST-1", &config, now());

        let result = service.check("CUST-1", Money::from_major(10), &config, now());
        assert!(!result.eligible);
        assert_eq!(result.reason.as_deref(), Some("score below minimum 30"));
    }

    #[test]
    fn test_limit_retiers_after_completion() {
        let config = EngineConfig::default();
        let mut service = EligibilityService::new();
        for _ in 0..3 {
            service.record_completion("CUST-1", 1, 0, &config, now());
        }
        let profile = service.profile("CUST-1").unwrap();
        assert_eq!(profile.score, 100);
        assert_eq!(profile.credit_limit, Money::from_major(5000));
    }

    #[test]
    fn test_available_credit_tracks_usage() {
        let config = EngineConfig::default();
        let mut service = EligibilityService::new();
        service.profile_mut("CUST-1", &config, now());
        service.adjust_used("CUST-1", Money::from_major(1200), true, &config, now());

        let result = service.check("CUST-1", Money::from_major(500), &config, now());
        assert!(!result.eligible);
        assert!(result.reason.unwrap().contains("exceeds available credit"));
    }
}
