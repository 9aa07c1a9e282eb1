use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::db::journal::{AlertRecord, CycleRecord, Journal};
use crate::deal::alert_state::{AlertEvent, AlertMemory, AlertStateMachine};
use crate::deal::classifier::classify;
use crate::deal::criteria::DealCriteria;
use crate::error::{NotifyError, StoreError};
use crate::lot::models::ItemRecord;
use crate::monitoring::alerts::Notifier;
use crate::source::{fetch_with_retry, FetchOutcome, ListingSource, RetryPolicy};
use crate::store::ItemStore;

/// Which stored snapshots get a fresh fetch during the refresh pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshPolicy {
    /// Refresh listings with less than this much time left.
    pub horizon: Duration,
    /// Only refresh listings whose price already passes the deal threshold.
    pub price_candidates_only: bool,
    /// Drop listings that ended longer ago than this, without fetching.
    pub purge_after_close: Duration,
}

/// Named refresh horizons, selectable from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPreset {
    /// Everything closing within a day.
    #[default]
    Daily,
    /// Only listings inside the last half hour.
    NearClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    Skip,
    Refresh,
    Purge,
}

impl RefreshPolicy {
    pub fn from_preset(preset: RefreshPreset) -> Self {
        match preset {
            RefreshPreset::Daily => Self {
                horizon: Duration::seconds(86_400),
                price_candidates_only: false,
                purge_after_close: Duration::seconds(3600),
            },
            RefreshPreset::NearClose => Self {
                horizon: Duration::seconds(1800),
                ..Self::from_preset(RefreshPreset::Daily)
            },
        }
    }

    pub fn decide(&self, item: &ItemRecord, criteria: &DealCriteria, now: DateTime<Utc>) -> RefreshDecision {
        let Some(remaining) = item.remaining(now) else {
            return RefreshDecision::Skip;
        };

        if remaining < -self.purge_after_close {
            return RefreshDecision::Purge;
        }
        if remaining >= self.horizon {
            return RefreshDecision::Skip;
        }
        if self.price_candidates_only
            && !item
                .price_ratio()
                .is_some_and(|ratio| ratio <= criteria.price_threshold)
        {
            return RefreshDecision::Skip;
        }
        RefreshDecision::Refresh
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::from_preset(RefreshPreset::Daily)
    }
}

/// What one poll cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub cycle: u64,
    pub items_loaded: usize,
    /// Emitted alerts, in emission order.
    pub events: Vec<AlertEvent>,
    pub notify_failures: usize,
    pub refreshed: usize,
    pub removed: usize,
    pub saved: bool,
    pub duration: std::time::Duration,
}

/// Most urgent first; listings without a countdown last.
pub fn sort_by_urgency(items: &mut [ItemRecord], now: DateTime<Utc>) {
    items.sort_by_key(|item| {
        let remaining = item.remaining(now);
        (remaining.is_none(), remaining)
    });
}

/// Owns the alert memory and runs poll cycles against the store.
pub struct Poller {
    store: Arc<dyn ItemStore>,
    source: Arc<dyn ListingSource>,
    notifier: Arc<dyn Notifier>,
    criteria: DealCriteria,
    alerts: AlertStateMachine,
    refresh: RefreshPolicy,
    retry: RetryPolicy,
    journal: Option<Journal>,
    cycle_number: u64,
}

impl Poller {
    pub fn new(
        store: Arc<dyn ItemStore>,
        source: Arc<dyn ListingSource>,
        notifier: Arc<dyn Notifier>,
        criteria: DealCriteria,
        closing_threshold: Duration,
    ) -> Self {
        Self {
            store,
            source,
            notifier,
            criteria,
            alerts: AlertStateMachine::new(closing_threshold),
            refresh: RefreshPolicy::default(),
            retry: RetryPolicy::default(),
            journal: None,
            cycle_number: 1,
        }
    }

    pub fn with_refresh_policy(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Record cycles and alerts, resuming the cycle counter from the journal.
    pub async fn with_journal(mut self, journal: Journal) -> Result<Self> {
        self.cycle_number = match journal.get_latest_cycle().await? {
            Some(cycle) => cycle.cycle_number as u64 + 1,
            None => 1,
        };
        self.journal = Some(journal);
        Ok(self)
    }

    pub fn cycle_number(&self) -> u64 {
        self.cycle_number
    }

    pub fn memory(&self) -> &AlertMemory {
        self.alerts.memory()
    }

    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    pub fn journal(&self) -> Option<&Journal> {
        self.journal.as_ref()
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, StoreError> {
        self.run_cycle_at(Utc::now()).await
    }

    /// One cycle with `now` fixed for classification and refresh decisions.
    ///
    /// A load or save failure aborts the cycle. Alerts already sent stay sent.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<CycleReport, StoreError> {
        let start = Instant::now();
        let cycle = self.cycle_number;
        info!(cycle, store = self.store.name(), "Starting poll cycle");

        let mut items = self.store.load_all().await.map_err(|e| {
            error!(cycle, error = %e, "Failed to load items, aborting cycle");
            e
        })?;
        sort_by_urgency(&mut items, now);

        let mut report = CycleReport {
            cycle,
            items_loaded: items.len(),
            ..CycleReport::default()
        };

        // 1. Classify and alert, most urgent first
        for item in &items {
            let verdict = classify(item, &self.criteria, now);
            for event in self.alerts.evaluate(item, &verdict, now) {
                self.dispatch(event, &mut report).await;
            }
        }

        // 2. Refresh pass, same order
        let mut kept = Vec::with_capacity(items.len());
        let mut changed = false;
        for item in items {
            match self.refresh.decide(&item, &self.criteria, now) {
                RefreshDecision::Skip => kept.push(item),
                RefreshDecision::Purge => {
                    debug!(url = %item.url, "Purging long-closed listing");
                    report.removed += 1;
                    changed = true;
                }
                RefreshDecision::Refresh => {
                    match fetch_with_retry(self.source.as_ref(), &item.url, &self.retry).await {
                        FetchOutcome::Found(fresh) => {
                            report.refreshed += 1;
                            changed = true;
                            kept.push(fresh);
                        }
                        FetchOutcome::NotFound => {
                            info!(url = %item.url, "Listing gone, removing from store");
                            report.removed += 1;
                            changed = true;
                        }
                    }
                }
            }
        }

        // 3. Write back once
        if changed {
            self.store.save_all(&kept).await.map_err(|e| {
                error!(cycle, error = %e, "Failed to save items");
                e
            })?;
            report.saved = true;
        }

        report.duration = start.elapsed();
        self.log_cycle(&report).await;
        self.cycle_number += 1;

        Ok(report)
    }

    async fn dispatch(&self, event: AlertEvent, report: &mut CycleReport) {
        let delivery = self.notifier.send(&event).await;
        match &delivery {
            Ok(()) => {}
            Err(NotifyError::Disabled) => {
                debug!(kind = %event.kind, url = %event.item.url, "Notifier disabled, alert not delivered");
            }
            Err(e) => {
                warn!(kind = %event.kind, url = %event.item.url, error = %e, "Failed to deliver alert");
                report.notify_failures += 1;
            }
        }

        if let Some(ref journal) = self.journal {
            let record = AlertRecord::from_event(report.cycle as i64, &event, &delivery);
            if let Err(e) = journal.insert_alert(&record).await {
                warn!(error = %e, "Failed to journal alert");
            }
        }

        report.events.push(event);
    }

    async fn log_cycle(&self, report: &CycleReport) {
        if let Some(ref journal) = self.journal {
            let record = CycleRecord {
                id: None,
                cycle_number: report.cycle as i64,
                items_loaded: report.items_loaded as i64,
                events_emitted: report.events.len() as i64,
                notify_failures: report.notify_failures as i64,
                refreshed: report.refreshed as i64,
                removed: report.removed as i64,
                saved: report.saved,
                duration_ms: Some(report.duration.as_millis() as i64),
                created_at: None,
            };
            if let Err(e) = journal.insert_cycle(&record).await {
                warn!(error = %e, "Failed to journal cycle");
            }
        }

        info!(
            cycle = report.cycle,
            duration_ms = report.duration.as_millis() as u64,
            items = report.items_loaded,
            alerts = report.events.len(),
            notify_failures = report.notify_failures,
            refreshed = report.refreshed,
            removed = report.removed,
            saved = report.saved,
            deals_tracked = self.alerts.memory().sent_count(),
            "Cycle complete"
        );
    }
}
