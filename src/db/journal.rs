use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use crate::deal::alert_state::AlertEvent;
use crate::error::NotifyError;

/// SQLite history of poll cycles and the alerts they emitted.
pub struct Journal {
    pool: SqlitePool,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CycleRecord {
    pub id: Option<i64>,
    pub cycle_number: i64,
    pub items_loaded: i64,
    pub events_emitted: i64,
    pub notify_failures: i64,
    pub refreshed: i64,
    pub removed: i64,
    pub saved: bool,
    pub duration_ms: Option<i64>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AlertRecord {
    pub id: Option<i64>,
    pub alert_id: String,
    pub cycle_number: i64,
    pub kind: String,
    pub url: String,
    pub title: String,
    pub price: Option<String>,
    pub remaining_seconds: i64,
    pub delivered: bool,
    pub error: Option<String>,
    pub created_at: Option<String>,
}

impl AlertRecord {
    pub fn from_event(
        cycle_number: i64,
        event: &AlertEvent,
        delivery: &Result<(), NotifyError>,
    ) -> Self {
        Self {
            id: None,
            alert_id: event.id.to_string(),
            cycle_number,
            kind: event.kind.to_string(),
            url: event.item.url.clone(),
            title: event.item.title.clone(),
            price: event.item.price.map(|p| p.to_string()),
            remaining_seconds: event.remaining.num_seconds(),
            delivered: delivery.is_ok(),
            error: delivery.as_ref().err().map(|e| e.to_string()),
            created_at: None,
        }
    }
}

impl Journal {
    /// Open or create the journal, creating its parent directory if needed.
    pub async fn new(database_path: &str) -> Result<Self> {
        if database_path != ":memory:" {
            let parent = std::path::Path::new(database_path)
                .parent()
                .filter(|p| !p.as_os_str().is_empty());
            if let Some(parent) = parent {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create journal directory {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))
            .context("Invalid journal path")?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Each connection to :memory: opens its own database.
        let max_connections = if database_path == ":memory:" { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to journal database")?;

        let journal = Self { pool };
        journal.migrate().await?;

        Ok(journal)
    }

    async fn migrate(&self) -> Result<()> {
        let migration_sql = include_str!("../../migrations/001_init.sql");
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to execute migration: {trimmed}"))?;
            }
        }
        Ok(())
    }

    // --- Cycle operations ---

    pub async fn insert_cycle(&self, cycle: &CycleRecord) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO cycles (cycle_number, items_loaded, events_emitted, notify_failures, refreshed, removed, saved, duration_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(cycle.cycle_number)
        .bind(cycle.items_loaded)
        .bind(cycle.events_emitted)
        .bind(cycle.notify_failures)
        .bind(cycle.refreshed)
        .bind(cycle.removed)
        .bind(cycle.saved)
        .bind(cycle.duration_ms)
        .execute(&self.pool)
        .await
        .context("Failed to insert cycle")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_latest_cycle(&self) -> Result<Option<CycleRecord>> {
        let cycle = sqlx::query_as::<_, CycleRecord>(
            "SELECT * FROM cycles ORDER BY cycle_number DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch latest cycle")?;
        Ok(cycle)
    }

    pub async fn get_cycle_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cycles")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count cycles")?;
        Ok(row.0)
    }

    // --- Alert operations ---

    pub async fn insert_alert(&self, alert: &AlertRecord) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO alerts (alert_id, cycle_number, kind, url, title, price, remaining_seconds, delivered, error)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&alert.alert_id)
        .bind(alert.cycle_number)
        .bind(&alert.kind)
        .bind(&alert.url)
        .bind(&alert.title)
        .bind(&alert.price)
        .bind(alert.remaining_seconds)
        .bind(alert.delivered)
        .bind(&alert.error)
        .execute(&self.pool)
        .await
        .context("Failed to insert alert")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn alerts_for_url(&self, url: &str) -> Result<Vec<AlertRecord>> {
        let alerts = sqlx::query_as::<_, AlertRecord>(
            "SELECT * FROM alerts WHERE url = ? ORDER BY id",
        )
        .bind(url)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch alerts for listing")?;
        Ok(alerts)
    }

    pub async fn get_recent_alerts(&self, limit: i64) -> Result<Vec<AlertRecord>> {
        let alerts = sqlx::query_as::<_, AlertRecord>(
            "SELECT * FROM alerts ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent alerts")?;
        Ok(alerts)
    }
}
