//! When to start the next poll cycle.
//!
//! The decision is a pure function of elapsed time and the store's
//! "changed since last check" signal.

use std::time::{Duration, Instant, SystemTime};

use anyhow::Result;
use tracing::{debug, error, info};

use crate::agent::poll_cycle::Poller;

/// Floor for how often the store's modification time is re-checked.
const MIN_CHECK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulePolicy {
    /// Minimum time between cycle starts.
    pub min_interval: Duration,
    /// Run a cycle after this long even if the store did not change.
    pub max_idle: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextWake {
    RunNow,
    WaitFor(Duration),
}

impl SchedulePolicy {
    /// `since_last` is the time since the previous cycle started, `None` before the first.
    pub fn next_wake(&self, since_last: Option<Duration>, store_changed: bool) -> NextWake {
        let Some(elapsed) = since_last else {
            return NextWake::RunNow;
        };

        if elapsed < self.min_interval {
            return NextWake::WaitFor(self.min_interval - elapsed);
        }
        if store_changed || elapsed >= self.max_idle {
            return NextWake::RunNow;
        }

        let check_period = self.min_interval.max(MIN_CHECK_PERIOD);
        NextWake::WaitFor(check_period.min(self.max_idle - elapsed))
    }
}

/// Run poll cycles until Ctrl-C.
///
/// A store failure aborts only the current cycle; the next attempt starts
/// after `store_retry_delay`.
pub async fn run_forever(
    poller: &mut Poller,
    policy: &SchedulePolicy,
    store_retry_delay: Duration,
) -> Result<()> {
    let store = poller.store().clone();
    let mut last_start: Option<Instant> = None;
    let mut seen_modified: Option<SystemTime> = None;

    loop {
        let modified = store.last_modified().await;
        let changed = modified != seen_modified;

        if let NextWake::WaitFor(delay) = policy.next_wake(last_start.map(|t| t.elapsed()), changed) {
            debug!(delay_ms = delay.as_millis() as u64, "Waiting for next cycle");
            if !sleep_unless_interrupted(delay).await {
                break;
            }
            continue;
        }

        last_start = Some(Instant::now());
        seen_modified = modified;

        if let Err(e) = poller.run_cycle().await {
            error!(
                error = %e,
                retry_in_ms = store_retry_delay.as_millis() as u64,
                "Poll cycle aborted, store unavailable"
            );
            if !sleep_unless_interrupted(store_retry_delay).await {
                break;
            }
            last_start = None;
        }
    }

    info!(cycles_run = poller.cycle_number().saturating_sub(1), "Shutdown requested, poller stopped");
    Ok(())
}

/// Returns false when interrupted.
async fn sleep_unless_interrupted(delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = tokio::signal::ctrl_c() => false,
    }
}
