//! Deal classification (current bid vs appraisal, time left, reserve).
//!
//! Rejection checks run in a fixed order and the first failing one is
//! reported, so a snapshot failing several checks always gets the same reason.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::deal::criteria::DealCriteria;
use crate::lot::models::{ItemRecord, ReserveStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    NoValidPrice,
    NoValidTime,
    NoEstimatedPrice,
    ReserveNotMet,
    PriceTooHigh,
    AuctionEnded,
    TooMuchTimeRemaining,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NoValidPrice => "no valid price",
            Self::NoValidTime => "no valid time",
            Self::NoEstimatedPrice => "no estimated price",
            Self::ReserveNotMet => "reserve not met",
            Self::PriceTooHigh => "price too high",
            Self::AuctionEnded => "auction ended",
            Self::TooMuchTimeRemaining => "too much time remaining",
        };
        f.write_str(text)
    }
}

/// Outcome of classifying one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted {
        /// Price / median estimate.
        ratio: Decimal,
        remaining: Duration,
    },
    Rejected(RejectionReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn rejection(&self) -> Option<RejectionReason> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}

/// Classify a snapshot against `criteria` at wall-clock time `now`.
pub fn classify(item: &ItemRecord, criteria: &DealCriteria, now: DateTime<Utc>) -> Verdict {
    use RejectionReason::*;

    if item.price.is_none() {
        return Verdict::Rejected(NoValidPrice);
    }
    let Some(remaining) = item.remaining(now) else {
        return Verdict::Rejected(NoValidTime);
    };
    let Some(ratio) = item.price_ratio() else {
        return Verdict::Rejected(NoEstimatedPrice);
    };
    if criteria.require_reserve_met && item.reserve == Some(ReserveStatus::NotReached) {
        return Verdict::Rejected(ReserveNotMet);
    }
    if ratio > criteria.price_threshold {
        return Verdict::Rejected(PriceTooHigh);
    }
    if remaining < Duration::zero() {
        return Verdict::Rejected(AuctionEnded);
    }
    if remaining > criteria.time_threshold {
        return Verdict::Rejected(TooMuchTimeRemaining);
    }

    debug!(
        url = %item.url,
        ratio = %ratio,
        remaining_s = remaining.num_seconds(),
        "Good deal found"
    );
    Verdict::Accepted { ratio, remaining }
}

/// Ranking score: price / median estimate, lower is better; `-1` when not computable.
///
/// Used for ordering only, never for accept/reject.
pub fn score(item: &ItemRecord) -> Decimal {
    item.price_ratio().unwrap_or(Decimal::NEGATIVE_ONE)
}

/// Best deals first; unscorable items go last.
pub fn rank_by_score(items: &mut [ItemRecord]) {
    items.sort_by(|a, b| match (a.price_ratio(), b.price_ratio()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

pub fn filter_good_deals<'a>(
    items: &'a [ItemRecord],
    criteria: &DealCriteria,
    now: DateTime<Utc>,
) -> Vec<&'a ItemRecord> {
    items
        .iter()
        .filter(|item| classify(item, criteria, now).is_accepted())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(price: Option<Decimal>, duration: Option<&str>) -> ItemRecord {
        ItemRecord {
            url: "https://example.com/item/123".to_string(),
            title: "Rolex Submariner".to_string(),
            price,
            estimate_low: Some(dec!(9000)),
            estimate_high: Some(dec!(11000)),
            reserve: Some(ReserveStatus::NoReserve),
            duration: duration.map(str::to_string),
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_accepts_cheap_closing_item() {
        let deal = item(Some(dec!(5000)), Some("20m"));
        let verdict = classify(&deal, &DealCriteria::default(), deal.captured_at);
        match verdict {
            Verdict::Accepted { ratio, remaining } => {
                assert_eq!(ratio, dec!(0.5));
                assert_eq!(remaining, Duration::seconds(1200));
            }
            other => panic!("expected accepted, got {other:?}"),
        }
    }

    #[test]
    fn test_each_rejection_reason() {
        let criteria = DealCriteria::default();
        let now = Utc::now();

        let cases = [
            (item(None, Some("20m")), RejectionReason::NoValidPrice),
            (item(Some(dec!(5000)), None), RejectionReason::NoValidTime),
            (item(Some(dec!(9500)), Some("20m")), RejectionReason::PriceTooHigh),
            (item(Some(dec!(5000)), Some("2h")), RejectionReason::TooMuchTimeRemaining),
        ];
        for (snapshot, expected) in cases {
            assert_eq!(
                classify(&snapshot, &criteria, snapshot.captured_at.max(now)).rejection(),
                Some(expected)
            );
        }

        let mut no_estimate = item(Some(dec!(5000)), Some("20m"));
        no_estimate.estimate_low = None;
        assert_eq!(
            classify(&no_estimate, &criteria, now).rejection(),
            Some(RejectionReason::NoEstimatedPrice)
        );

        let mut ended = item(Some(dec!(5000)), Some("1m"));
        ended.captured_at = now - Duration::seconds(120);
        assert_eq!(
            classify(&ended, &criteria, now).rejection(),
            Some(RejectionReason::AuctionEnded)
        );
    }

    #[test]
    fn test_reserve_check_respects_flag() {
        let mut snapshot = item(Some(dec!(5000)), Some("20m"));
        snapshot.reserve = Some(ReserveStatus::NotReached);
        let now = snapshot.captured_at;

        assert_eq!(
            classify(&snapshot, &DealCriteria::default(), now).rejection(),
            Some(RejectionReason::ReserveNotMet)
        );

        let loose = DealCriteria {
            require_reserve_met: false,
            ..DealCriteria::default()
        };
        assert!(classify(&snapshot, &loose, now).is_accepted());
    }

    #[test]
    fn test_absent_reserve_is_not_a_rejection() {
        let mut snapshot = item(Some(dec!(5000)), Some("20m"));
        snapshot.reserve = None;
        assert!(classify(&snapshot, &DealCriteria::default(), snapshot.captured_at).is_accepted());
    }

    #[test]
    fn test_first_failing_check_wins() {
        // Missing price, missing time, missing estimate, unmet reserve all at once.
        let mut snapshot = item(None, None);
        snapshot.estimate_low = None;
        snapshot.reserve = Some(ReserveStatus::NotReached);
        assert_eq!(
            classify(&snapshot, &DealCriteria::default(), Utc::now()).rejection(),
            Some(RejectionReason::NoValidPrice)
        );

        // Too expensive and already ended: price is checked first.
        let mut snapshot = item(Some(dec!(9500)), Some("1m"));
        snapshot.captured_at = Utc::now() - Duration::hours(1);
        assert_eq!(
            classify(&snapshot, &DealCriteria::default(), Utc::now()).rejection(),
            Some(RejectionReason::PriceTooHigh)
        );
    }

    #[test]
    fn test_score_and_ranking() {
        let mut items = vec![
            item(Some(dec!(9000)), Some("30m")),
            item(None, Some("30m")),
            item(Some(dec!(5000)), Some("30m")),
        ];
        assert_eq!(score(&items[1]), Decimal::NEGATIVE_ONE);
        assert!(score(&items[2]) < score(&items[0]));

        rank_by_score(&mut items);
        assert_eq!(items[0].price, Some(dec!(5000)));
        assert_eq!(items[1].price, Some(dec!(9000)));
        assert_eq!(items[2].price, None);
    }

    #[test]
    fn test_filter_good_deals() {
        let items = vec![
            item(Some(dec!(5000)), Some("20m")),
            item(Some(dec!(9500)), Some("20m")),
        ];
        let now = items[0].captured_at;
        let deals = filter_good_deals(&items, &DealCriteria::default(), now);
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].price, Some(dec!(5000)));
    }
}
