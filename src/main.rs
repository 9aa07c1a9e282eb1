use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use lot_sentinel::agent::poll_cycle::Poller;
use lot_sentinel::agent::schedule;
use lot_sentinel::config::{AppConfig, Secrets};
use lot_sentinel::db::journal::Journal;
use lot_sentinel::deal::classifier::{classify, filter_good_deals, rank_by_score, score, Verdict};
use lot_sentinel::lot::time_model::format_duration;
use lot_sentinel::monitoring::alerts::{Notifier, TelegramNotifier};
use lot_sentinel::monitoring::logger;
use lot_sentinel::source::http::HttpListingSource;
use lot_sentinel::store::json_store::JsonItemStore;
use lot_sentinel::store::ItemStore;

/// CLI arguments for lot-sentinel.
#[derive(Parser, Debug)]
#[command(name = "lot-sentinel")]
#[command(about = "Watches auction listings and alerts on underpriced lots closing soon")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the item store and send alerts (default)
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Print stored listings ranked by price against estimate
    Report {
        /// Maximum number of listings to print
        #[arg(short, long, default_value_t = 25)]
        limit: usize,

        /// Only listings that currently qualify as deals
        #[arg(long)]
        deals_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, secrets) = AppConfig::load(&args.config)?;

    logger::init_logging(&config.monitoring)?;

    match args.command.unwrap_or(Command::Run { once: false }) {
        Command::Run { once } => run(config, secrets, once).await,
        Command::Report { limit, deals_only } => report(&config, limit, deals_only).await,
    }
}

async fn run(config: AppConfig, secrets: Secrets, once: bool) -> Result<()> {
    let criteria = config.deal_criteria();
    info!(
        store = %config.store.path,
        price_threshold = %criteria.price_threshold,
        time_threshold_s = criteria.time_threshold.num_seconds(),
        require_reserve_met = criteria.require_reserve_met,
        "lot-sentinel starting"
    );

    let store: Arc<dyn ItemStore> = Arc::new(JsonItemStore::new(&config.store.path));
    let source = Arc::new(
        HttpListingSource::new(
            &config.listing.base_url,
            Duration::from_secs(config.listing.timeout_seconds),
        )
        .context("Failed to build listing client")?,
    );

    let notifier = Arc::new(TelegramNotifier::new(
        secrets.telegram_bot_token,
        secrets.telegram_chat_ids,
        &config.telegram.api_base_url,
        config.telegram.messages_per_second,
        config.telegram.enabled,
    ));
    if !notifier.is_enabled() {
        warn!("Telegram alerts disabled, events will only be logged");
    }

    let mut poller = Poller::new(
        store,
        source,
        notifier,
        criteria,
        config.closing_threshold(),
    )
    .with_refresh_policy(config.refresh_policy())
    .with_retry_policy(config.retry_policy());

    if config.journal.enabled {
        let journal = Journal::new(&config.journal.path).await?;
        poller = poller.with_journal(journal).await?;
    }

    if once {
        let report = poller.run_cycle().await?;
        println!(
            "cycle {}: {} items, {} alerts, {} refreshed, {} removed",
            report.cycle,
            report.items_loaded,
            report.events.len(),
            report.refreshed,
            report.removed
        );
        return Ok(());
    }

    schedule::run_forever(
        &mut poller,
        &config.schedule_policy(),
        Duration::from_millis(config.agent.store_retry_delay_ms),
    )
    .await
}

/// Console view of the store, best price ratio first.
async fn report(config: &AppConfig, limit: usize, deals_only: bool) -> Result<()> {
    let store = JsonItemStore::new(&config.store.path);
    let mut items = store.load_all().await?;
    rank_by_score(&mut items);

    let criteria = config.deal_criteria();
    let now = Utc::now();
    let listed = if deals_only {
        filter_good_deals(&items, &criteria, now)
    } else {
        items.iter().collect()
    };

    println!("{} listings in {}", items.len(), store.path().display());
    for item in listed.into_iter().take(limit) {
        let remaining = item
            .remaining(now)
            .map_or_else(|| "-".to_string(), |r| format_duration(r.num_seconds()));
        let verdict = match classify(item, &criteria, now) {
            Verdict::Accepted { .. } => "DEAL".to_string(),
            Verdict::Rejected(reason) => reason.to_string(),
        };
        println!(
            "{:>6} | {:>12} | {:<24} | {} | {}",
            score(item).round_dp(3).to_string(),
            remaining,
            verdict,
            item.title,
            item.url
        );
    }

    Ok(())
}
