use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;

use crate::agent::poll_cycle::{RefreshPolicy, RefreshPreset};
use crate::agent::schedule::SchedulePolicy;
use crate::deal::criteria::{CriteriaPreset, DealCriteria};
use crate::lot::time_model::MAX_COUNTDOWN_SECONDS;
use crate::source::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub criteria: CriteriaConfig,
    pub alerts: AlertsConfig,
    pub refresh: RefreshConfig,
    pub listing: ListingConfig,
    pub telegram: TelegramConfig,
    pub store: StoreConfig,
    pub journal: JournalConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub min_cycle_interval_seconds: u64,
    pub max_idle_seconds: u64,
    pub store_retry_delay_ms: u64,
}

/// Preset thresholds, each optionally overridden.
#[derive(Debug, Clone, Deserialize)]
pub struct CriteriaConfig {
    #[serde(default)]
    pub preset: CriteriaPreset,
    pub price_threshold: Option<Decimal>,
    pub time_threshold_seconds: Option<i64>,
    pub require_reserve_met: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    pub closing_threshold_seconds: i64,
}

/// Preset refresh horizon, each field optionally overridden.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    #[serde(default)]
    pub preset: RefreshPreset,
    pub horizon_seconds: Option<i64>,
    pub price_candidates_only: Option<bool>,
    pub purge_after_close_seconds: Option<i64>,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub api_base_url: String,
    pub messages_per_second: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    pub enabled: bool,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

fn default_json() -> bool {
    true
}

/// Secrets loaded exclusively from environment variables.
/// Not serializable, not stored in config files.
pub struct Secrets {
    pub telegram_bot_token: Option<SecretString>,
    pub telegram_chat_ids: Vec<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let telegram_chat_ids = lookup("TELEGRAM_CHAT_IDS")
            .map(|ids| {
                ids.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            telegram_bot_token: lookup("TELEGRAM_BOT_TOKEN")
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            telegram_chat_ids,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, overlaying environment overrides and secrets.
    pub fn load(config_path: &Path) -> Result<(Self, Secrets)> {
        dotenvy::dotenv().ok();

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok((config, Secrets::from_env()))
    }

    /// Environment variables that take precedence over the file.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup("PRICE_PERCENTAGE_THRESHOLD") {
            let threshold = Decimal::from_str(raw.trim())
                .with_context(|| format!("Invalid PRICE_PERCENTAGE_THRESHOLD: {raw}"))?;
            self.criteria.price_threshold = Some(threshold);
        }
        if let Some(raw) = lookup("REMAINING_TIME_THRESHOLD") {
            let seconds = raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("Invalid REMAINING_TIME_THRESHOLD: {raw}"))?;
            self.criteria.time_threshold_seconds = Some(seconds);
        }
        if let Some(path) = lookup("DATA_FILE") {
            self.store.path = path;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.monitoring.log_level = level.to_lowercase();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(seconds) = self.criteria.time_threshold_seconds {
            check_seconds("criteria.time_threshold_seconds", seconds, 0)?;
        }
        check_seconds("alerts.closing_threshold_seconds", self.alerts.closing_threshold_seconds, 1)?;
        if let Some(seconds) = self.refresh.horizon_seconds {
            check_seconds("refresh.horizon_seconds", seconds, 0)?;
        }
        if let Some(seconds) = self.refresh.purge_after_close_seconds {
            check_seconds("refresh.purge_after_close_seconds", seconds, 0)?;
        }

        let criteria = self.deal_criteria();
        if criteria.price_threshold <= Decimal::ZERO || criteria.price_threshold > Decimal::ONE {
            bail!(
                "criteria price threshold must be in (0, 1], got {}",
                criteria.price_threshold
            );
        }
        if self.refresh.max_attempts == 0 {
            bail!("refresh.max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn deal_criteria(&self) -> DealCriteria {
        let preset = DealCriteria::from_preset(self.criteria.preset);
        DealCriteria {
            price_threshold: self.criteria.price_threshold.unwrap_or(preset.price_threshold),
            time_threshold: self
                .criteria
                .time_threshold_seconds
                .map_or(preset.time_threshold, seconds),
            require_reserve_met: self
                .criteria
                .require_reserve_met
                .unwrap_or(preset.require_reserve_met),
        }
    }

    pub fn closing_threshold(&self) -> chrono::Duration {
        seconds(self.alerts.closing_threshold_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.refresh.max_attempts,
            backoff_base: Duration::from_millis(self.refresh.backoff_base_ms),
            backoff_max: Duration::from_millis(self.refresh.backoff_max_ms),
        }
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        let preset = RefreshPolicy::from_preset(self.refresh.preset);
        RefreshPolicy {
            horizon: self.refresh.horizon_seconds.map_or(preset.horizon, seconds),
            price_candidates_only: self
                .refresh
                .price_candidates_only
                .unwrap_or(preset.price_candidates_only),
            purge_after_close: self
                .refresh
                .purge_after_close_seconds
                .map_or(preset.purge_after_close, seconds),
        }
    }

    pub fn schedule_policy(&self) -> SchedulePolicy {
        SchedulePolicy {
            min_interval: Duration::from_secs(self.agent.min_cycle_interval_seconds),
            max_idle: Duration::from_secs(self.agent.max_idle_seconds),
        }
    }
}

fn check_seconds(name: &str, value: i64, min: i64) -> Result<()> {
    if !(min..=MAX_COUNTDOWN_SECONDS).contains(&value) {
        bail!("{name} must be between {min} and {MAX_COUNTDOWN_SECONDS}, got {value}");
    }
    Ok(())
}

/// Clamped to the countdown range; `validate` rejects anything outside it.
fn seconds(value: i64) -> chrono::Duration {
    chrono::Duration::seconds(value.clamp(-MAX_COUNTDOWN_SECONDS, MAX_COUNTDOWN_SECONDS))
}
