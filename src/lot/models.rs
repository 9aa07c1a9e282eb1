use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::lot::time_model;

/// Reserve-price status shown on a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveStatus {
    Reached,
    NotReached,
    NoReserve,
}

impl ReserveStatus {
    /// Normalise a reserve label, either the stored English form or the site's French text.
    ///
    /// Any other non-empty text counts as reached, as the site shows no
    /// explicit banner in that case.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }

        let lower = label.to_lowercase();
        if lower.contains("not reached") || lower.contains("non atteint") {
            Some(Self::NotReached)
        } else if lower.contains("no reserve") || lower.contains("sans prix de réserve") {
            Some(Self::NoReserve)
        } else {
            Some(Self::Reached)
        }
    }

    /// Reached or no reserve at all.
    pub fn is_met(self) -> bool {
        !matches!(self, Self::NotReached)
    }
}

impl std::fmt::Display for ReserveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reached => write!(f, "Reserve price reached"),
            Self::NotReached => write!(f, "Reserve price not reached"),
            Self::NoReserve => write!(f, "No reserve price"),
        }
    }
}

/// One snapshot of a listing. Identity is the url; a refresh produces a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub url: String,
    pub title: String,
    /// Current bid. `None` when not yet bid on or unreadable.
    pub price: Option<Decimal>,
    pub estimate_low: Option<Decimal>,
    pub estimate_high: Option<Decimal>,
    pub reserve: Option<ReserveStatus>,
    /// Countdown text exactly as captured. `None` when the page showed none.
    pub duration: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl ItemRecord {
    /// Numeric listing id from a `/l/<id>-<slug>` url segment.
    pub fn lot_id(&self) -> Option<&str> {
        self.url
            .split('/')
            .filter_map(|segment| segment.split_once('-').map(|(id, _)| id))
            .find(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
    }

    pub fn median_estimate(&self) -> Option<Decimal> {
        match (self.estimate_low, self.estimate_high) {
            (Some(low), Some(high)) => Some((low + high) / Decimal::from(2)),
            _ => None,
        }
    }

    /// Current bid over the median estimate.
    pub fn price_ratio(&self) -> Option<Decimal> {
        let price = self.price?;
        let median = self.median_estimate()?;
        if median <= Decimal::ZERO {
            return None;
        }
        price.checked_div(median)
    }

    /// Countdown left at `now`, measured from this snapshot's own capture time.
    ///
    /// `None` when there is no countdown or it does not parse.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.duration
            .as_deref()
            .and_then(|d| time_model::remaining_time(self.captured_at, d, now))
    }

    /// Whether price, reserve or estimate differ from an earlier snapshot.
    pub fn differs_materially(&self, earlier: &ItemRecord) -> bool {
        self.price != earlier.price
            || self.reserve != earlier.reserve
            || self.estimate_low != earlier.estimate_low
            || self.estimate_high != earlier.estimate_high
    }
}
