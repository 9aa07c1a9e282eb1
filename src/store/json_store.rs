//! JSON file item store (`items.json`), shared with the scraper that fills it.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::lot::models::ItemRecord;
use crate::store::record::StoredItem;
use crate::store::ItemStore;

pub struct JsonItemStore {
    path: PathBuf,
}

impl JsonItemStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.bak")
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ItemStore for JsonItemStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load_all(&self) -> Result<Vec<ItemRecord>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Store file missing, starting with an empty item set");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let stored: Vec<StoredItem> =
            serde_json::from_str(&contents).map_err(|source| StoreError::Decode {
                path: self.path.clone(),
                source,
            })?;

        let items: Vec<ItemRecord> = stored.into_iter().map(StoredItem::into_record).collect();

        debug!(count = items.len(), "Items loaded");
        Ok(items)
    }

    #[instrument(skip(self, items), fields(path = %self.path.display(), count = items.len()))]
    async fn save_all(&self, items: &[ItemRecord]) -> Result<(), StoreError> {
        let stored: Vec<StoredItem> = items.iter().map(StoredItem::from_record).collect();
        let json = serde_json::to_string_pretty(&stored)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(e))?;
        }

        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::copy(&self.path, self.backup_path()).await {
                warn!(error = %e, "Failed to refresh store backup");
            }
        }

        // Readers never observe a partially written file.
        let temp = self.temp_path();
        tokio::fs::write(&temp, json)
            .await
            .map_err(|e| self.write_error(e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.write_error(e))?;

        info!("Items saved");
        Ok(())
    }

    async fn last_modified(&self) -> Option<SystemTime> {
        tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| m.modified())
            .ok()
    }

    fn name(&self) -> &str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lot::models::ReserveStatus;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn temp_store() -> (JsonItemStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("lot-sentinel-{}", Uuid::new_v4()));
        (JsonItemStore::new(dir.join("items.json")), dir)
    }

    fn item(url: &str) -> ItemRecord {
        ItemRecord {
            url: url.to_string(),
            title: "Tudor Black Bay".to_string(),
            price: Some(dec!(1800)),
            estimate_low: Some(dec!(2500)),
            estimate_high: Some(dec!(3000)),
            reserve: Some(ReserveStatus::NoReserve),
            duration: Some("2h 10m".to_string()),
            captured_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let (store, _dir) = temp_store();
        assert!(store.load_all().await.unwrap().is_empty());
        assert!(store.last_modified().await.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_order() {
        let (store, dir) = temp_store();
        let items = vec![item("https://x/l/1-a"), item("https://x/l/2-b")];
        store.save_all(&items).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, items);
        assert!(store.last_modified().await.is_some());

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_second_save_keeps_backup() {
        let (store, dir) = temp_store();
        store.save_all(&[item("https://x/l/1-a")]).await.unwrap();
        store.save_all(&[]).await.unwrap();

        let backup = std::fs::read_to_string(store.backup_path()).unwrap();
        assert!(backup.contains("https://x/l/1-a"));
        assert!(store.load_all().await.unwrap().is_empty());

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let (store, dir) = temp_store();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.path(), "[{\"title\": ").unwrap();

        let result = store.load_all().await;
        assert!(matches!(result, Err(StoreError::Decode { .. })));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_reads_scraper_written_file() {
        let (store, dir) = temp_store();
        std::fs::create_dir_all(&dir).unwrap();
        let raw = r#"[{"title": "Seiko", "price": "No price", "time": "3h 2m",
            "url": "https://x/l/9-seiko", "estimated_price": "400 € - 600 €",
            "pull_time": 1772366400.0, "reserve_price": "Prix de réserve non atteint"}]"#;
        std::fs::write(store.path(), raw).unwrap();

        let items = store.load_all().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price, None);
        assert_eq!(items[0].median_estimate(), Some(dec!(500)));
        assert_eq!(items[0].reserve, Some(ReserveStatus::NotReached));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_record_without_capture_time_survives_save() {
        let (store, dir) = temp_store();
        std::fs::create_dir_all(&dir).unwrap();
        let raw = r#"[
            {"title": "Seiko", "price": "450 €", "time": "3h 2m", "url": "https://x/l/9-seiko",
             "estimated_price": "400 € - 600 €", "pull_time": 1772366400.0, "reserve_price": ""},
            {"title": "Oris", "price": "800 €", "time": "1h", "url": "https://x/l/10-oris",
             "estimated_price": "900 € - 1 100 €", "reserve_price": ""}
        ]"#;
        std::fs::write(store.path(), raw).unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].url, "https://x/l/10-oris");
        assert_eq!(loaded[1].duration, None);

        store.save_all(&loaded).await.unwrap();
        let reloaded = store.load_all().await.unwrap();
        let urls: Vec<_> = reloaded.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x/l/9-seiko", "https://x/l/10-oris"]);
        assert_eq!(reloaded[1].price, Some(dec!(800)));

        std::fs::remove_dir_all(dir).ok();
    }
}
