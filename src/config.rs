use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};

/// deployment policy constants for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// minimum creditworthiness score for any product
    pub minimum_score: u8,
    /// credit-limit tiers applied after every statistics update,
    /// highest score first
    pub limit_tiers: Vec<LimitTier>,
    /// limit when no tier matches
    pub base_limit: Money,
    /// maximum concurrently sponsored credits per guarantor
    pub sponsor_ceiling: usize,
    /// fixed ratio of the sponsored amount a guarantor locks
    pub guarantee_ratio: Rate,
    /// trailing window (days) in which a default blocks new credit
    pub default_lookback_days: i64,
    /// group-savings credit ceiling as a share of pooled savings
    pub group_pool_ceiling: Rate,
    /// days before maturity at which the weekly reminder fires
    pub reminder_window_days: i64,
}

/// score threshold mapped to a credit limit
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LimitTier {
    pub min_score: u8,
    pub limit: Money,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            minimum_score: 30,
            limit_tiers: vec![
                LimitTier { min_score: 80, limit: Money::from_major(5000) },
                LimitTier { min_score: 60, limit: Money::from_major(3000) },
                LimitTier { min_score: 40, limit: Money::from_major(1500) },
            ],
            base_limit: Money::from_major(1000),
            sponsor_ceiling: 3,
            guarantee_ratio: Rate::from_percentage(40),
            default_lookback_days: 182,
            group_pool_ceiling: Rate::from_percentage(80),
            reminder_window_days: 7,
        }
    }
}

impl EngineConfig {
    /// limit for a score under the configured tiers
    pub fn limit_for_score(&self, score: u8) -> Money {
        self.limit_tiers
            .iter()
            .find(|tier| score >= tier.min_score)
            .map(|tier| tier.limit)
            .unwrap_or(self.base_limit)
    }
}
