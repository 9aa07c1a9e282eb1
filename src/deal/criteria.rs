//! Deal thresholds and their named presets.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaPreset {
    /// 90% of estimate, 30 minutes left, reserve reached or absent.
    #[default]
    Standard,
    /// Same thresholds, but an unmet reserve does not disqualify.
    IgnoreReserve,
    /// 70% of estimate within two days, reserve required.
    Watchlist,
}

/// Thresholds a snapshot must satisfy to count as a deal.
#[derive(Debug, Clone, PartialEq)]
pub struct DealCriteria {
    /// Maximum price / median estimate, in (0, 1].
    pub price_threshold: Decimal,
    /// Maximum remaining time.
    pub time_threshold: Duration,
    pub require_reserve_met: bool,
}

impl DealCriteria {
    pub fn from_preset(preset: CriteriaPreset) -> Self {
        match preset {
            CriteriaPreset::Standard => Self {
                price_threshold: dec!(0.90),
                time_threshold: Duration::seconds(1800),
                require_reserve_met: true,
            },
            CriteriaPreset::IgnoreReserve => Self {
                require_reserve_met: false,
                ..Self::from_preset(CriteriaPreset::Standard)
            },
            CriteriaPreset::Watchlist => Self {
                price_threshold: dec!(0.70),
                time_threshold: Duration::seconds(172_800),
                require_reserve_met: true,
            },
        }
    }
}

impl Default for DealCriteria {
    fn default() -> Self {
        Self::from_preset(CriteriaPreset::Standard)
    }
}
