//! Flat on-disk record layout shared by the item store and the snapshot service.
//!
//! Absent values are written as fixed sentinel strings. They never leave this
//! module: decoding turns them (and any unparseable field) into `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ParseError;
use crate::lot::models::{ItemRecord, ReserveStatus};
use crate::lot::price::{format_amount, parse_amount, parse_estimate};
use crate::lot::time_model::try_parse_duration;

pub const NO_PRICE: &str = "No price";
pub const NO_TIME: &str = "No time";
pub const NO_ESTIMATE: &str = "No estimated price";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub title: String,
    pub price: String,
    pub time: String,
    pub url: String,
    pub estimated_price: String,
    /// Unix seconds of capture.
    #[serde(default)]
    pub pull_time: f64,
    #[serde(default)]
    pub reserve_price: String,
}

impl StoredItem {
    pub fn from_record(item: &ItemRecord) -> Self {
        let estimated_price = match (item.estimate_low, item.estimate_high) {
            (Some(low), Some(high)) => format!("{} - {}", format_amount(low), format_amount(high)),
            _ => NO_ESTIMATE.to_string(),
        };

        Self {
            title: item.title.clone(),
            price: item.price.map_or_else(|| NO_PRICE.to_string(), format_amount),
            time: item.duration.clone().unwrap_or_else(|| NO_TIME.to_string()),
            url: item.url.clone(),
            estimated_price,
            pull_time: item.captured_at.timestamp_millis() as f64 / 1000.0,
            reserve_price: item.reserve.map(|r| r.to_string()).unwrap_or_default(),
        }
    }

    /// Decode using the stored `pull_time` as capture time.
    ///
    /// A record without a usable capture time is kept, with its countdown
    /// treated as absent.
    pub fn into_record(self) -> ItemRecord {
        match timestamp_from_unix(self.pull_time) {
            Ok(captured_at) => self.into_record_at(captured_at),
            Err(e) => {
                warn!(url = %self.url, error = %e, "Unusable capture time, treating countdown as absent");
                let mut item = self.into_record_at(DateTime::UNIX_EPOCH);
                item.duration = None;
                item
            }
        }
    }

    /// Decode with an explicit capture time. Unparseable fields become absent.
    pub fn into_record_at(self, captured_at: DateTime<Utc>) -> ItemRecord {
        let price = optional_field(&self.url, "price", &self.price, NO_PRICE, parse_amount);

        let estimate = optional_field(
            &self.url,
            "estimated_price",
            &self.estimated_price,
            NO_ESTIMATE,
            parse_estimate,
        );

        let duration = optional_field(&self.url, "time", &self.time, NO_TIME, |text| {
            try_parse_duration(text)
                .map(|_| text.trim().to_string())
                .ok_or_else(|| ParseError::Duration(text.to_string()))
        });

        ItemRecord {
            reserve: ReserveStatus::from_label(&self.reserve_price),
            url: self.url,
            title: self.title,
            price,
            estimate_low: estimate.map(|(low, _)| low),
            estimate_high: estimate.map(|(_, high)| high),
            duration,
            captured_at,
        }
    }
}

fn optional_field<T>(
    url: &str,
    field: &'static str,
    raw: &str,
    sentinel: &str,
    parse: impl FnOnce(&str) -> Result<T, ParseError>,
) -> Option<T> {
    let raw = raw.trim();
    if raw.is_empty() || raw == sentinel {
        return None;
    }
    match parse(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(url, field, error = %e, "Unparseable listing field, treating as absent");
            None
        }
    }
}

fn timestamp_from_unix(seconds: f64) -> Result<DateTime<Utc>, ParseError> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ParseError::Timestamp(seconds));
    }
    DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
        .ok_or(ParseError::Timestamp(seconds))
}
