//! Per-listing alert state machine.
//!
//! Decides, for each fresh snapshot of a listing, whether to emit a new-deal,
//! updated or closing-soon alert. All memory lives in [`AlertMemory`], keyed by
//! url, and is owned by the machine for the whole process lifetime.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::deal::classifier::{RejectionReason, Verdict};
use crate::lot::models::ItemRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    NewDeal,
    Updated,
    ClosingSoon,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewDeal => write!(f, "NEW_DEAL"),
            Self::Updated => write!(f, "UPDATED"),
            Self::ClosingSoon => write!(f, "CLOSING_SOON"),
        }
    }
}

/// An alert decided by the state machine, ready for the notifier.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub id: Uuid,
    pub kind: AlertKind,
    pub item: ItemRecord,
    /// Countdown at evaluation time, recomputed from the snapshot's capture time.
    pub remaining: Duration,
}

/// Where a listing stands in the alert lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingState {
    Unseen,
    Sent,
    ClosingNotified,
    Ended,
}

/// What has already been alerted on. Lost on restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertMemory {
    /// Last snapshot sent per url, for change detection.
    sent: HashMap<String, ItemRecord>,
    closing_notified: HashSet<String>,
}

impl AlertMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alert state of a url, ignoring time.
    pub fn state_of(&self, url: &str) -> ListingState {
        if self.closing_notified.contains(url) {
            ListingState::ClosingNotified
        } else if self.sent.contains_key(url) {
            ListingState::Sent
        } else {
            ListingState::Unseen
        }
    }

    pub fn last_sent(&self, url: &str) -> Option<&ItemRecord> {
        self.sent.get(url)
    }

    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    pub fn closing_count(&self) -> usize {
        self.closing_notified.len()
    }
}

pub struct AlertStateMachine {
    memory: AlertMemory,
    closing_threshold: Duration,
}

impl AlertStateMachine {
    pub fn new(closing_threshold: Duration) -> Self {
        Self::with_memory(AlertMemory::new(), closing_threshold)
    }

    pub fn with_memory(memory: AlertMemory, closing_threshold: Duration) -> Self {
        Self {
            memory,
            closing_threshold,
        }
    }

    pub fn memory(&self) -> &AlertMemory {
        &self.memory
    }

    pub fn into_memory(self) -> AlertMemory {
        self.memory
    }

    /// State of this snapshot's listing at `now`.
    pub fn state(&self, item: &ItemRecord, now: DateTime<Utc>) -> ListingState {
        match item.remaining(now) {
            Some(remaining) if remaining < Duration::zero() => ListingState::Ended,
            _ => self.memory.state_of(&item.url),
        }
    }

    /// Evaluate a fresh snapshot and its verdict.
    ///
    /// Returns the alerts to send in emission order: a new-deal or update
    /// alert first, then closing soon if the listing is inside the closing
    /// window for the first time. A rejected listing that was never sent
    /// stays silent, even inside the window.
    pub fn evaluate(
        &mut self,
        item: &ItemRecord,
        verdict: &Verdict,
        now: DateTime<Utc>,
    ) -> Vec<AlertEvent> {
        let mut events = Vec::new();
        let Some(remaining) = item.remaining(now) else {
            return events;
        };

        match self.state(item, now) {
            ListingState::Ended | ListingState::ClosingNotified => return events,
            ListingState::Unseen => {
                if !verdict.is_accepted() {
                    return events;
                }
                self.memory.sent.insert(item.url.clone(), item.clone());
                info!(url = %item.url, remaining_s = remaining.num_seconds(), "New deal");
                events.push(self.emit(AlertKind::NewDeal, item, remaining));
            }
            ListingState::Sent => {
                let changed = self
                    .memory
                    .sent
                    .get(&item.url)
                    .is_some_and(|last| item.differs_materially(last));

                if changed && still_a_deal(verdict) {
                    self.memory.sent.insert(item.url.clone(), item.clone());
                    info!(url = %item.url, price = ?item.price, "Deal updated");
                    events.push(self.emit(AlertKind::Updated, item, remaining));
                } else {
                    debug!(url = %item.url, changed, "No update for sent deal");
                }
            }
        }

        if remaining > Duration::zero() && remaining <= self.closing_threshold {
            self.memory.closing_notified.insert(item.url.clone());
            info!(url = %item.url, remaining_s = remaining.num_seconds(), "Deal closing soon");
            events.push(self.emit(AlertKind::ClosingSoon, item, remaining));
        }

        events
    }

    fn emit(&self, kind: AlertKind, item: &ItemRecord, remaining: Duration) -> AlertEvent {
        AlertEvent {
            id: Uuid::new_v4(),
            kind,
            item: item.clone(),
            remaining,
        }
    }
}

/// An already-sent deal stays alertable when only its countdown disqualifies it.
fn still_a_deal(verdict: &Verdict) -> bool {
    match verdict {
        Verdict::Accepted { .. } => true,
        Verdict::Rejected(reason) => *reason == RejectionReason::TooMuchTimeRemaining,
    }
}
