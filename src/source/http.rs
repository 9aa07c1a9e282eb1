//! Snapshot-service client.
//!
//! The browser scraper runs as a separate service that renders a listing page
//! on demand and answers `GET {base}/listing?url=<listing url>` with one flat
//! record in the item-store layout, or 404 once the listing is gone.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::error::FetchError;
use crate::source::{FetchOutcome, ListingSource};
use crate::store::record::StoredItem;

pub struct HttpListingSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpListingSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lot-sentinel/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    #[instrument(skip(self))]
    async fn fetch_listing(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let endpoint = format!("{}/listing?url={}", self.base_url, urlencoding::encode(url));
        let response = self.http.get(&endpoint).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => return Ok(FetchOutcome::NotFound),
            status if !status.is_success() => return Err(FetchError::Status(status.as_u16())),
            _ => {}
        }

        let raw: StoredItem = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        let item = raw.into_record_at(Utc::now());

        // A page without a countdown is a closed listing.
        if item.duration.is_none() {
            debug!(url, "Listing shows no countdown");
            return Ok(FetchOutcome::NotFound);
        }

        Ok(FetchOutcome::Found(item))
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = "https://www.catawiki.com/fr/l/98500195-rolex";

    fn body(time: &str) -> serde_json::Value {
        serde_json::json!({
            "title": "Rolex Datejust",
            "price": "4 100 €",
            "time": time,
            "url": LISTING,
            "estimated_price": "6 000 € - 7 000 €",
            "reserve_price": "Sans prix de réserve"
        })
    }

    async fn source_for(server: &MockServer) -> HttpListingSource {
        HttpListingSource::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_found_snapshot_is_stamped_now() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/listing"))
            .and(query_param("url", LISTING))
            .respond_with(ResponseTemplate::new(200).set_body_json(body("12m 5s")))
            .mount(&server)
            .await;

        let before = Utc::now();
        let outcome = source_for(&server).await.fetch_listing(LISTING).await.unwrap();
        let FetchOutcome::Found(item) = outcome else {
            panic!("expected a snapshot");
        };
        assert_eq!(item.price, Some(dec!(4100)));
        assert_eq!(item.median_estimate(), Some(dec!(6500)));
        assert!(item.captured_at >= before);
    }

    #[tokio::test]
    async fn test_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let outcome = source_for(&server).await.fetch_listing(LISTING).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_missing_countdown_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body("No time")))
            .mount(&server)
            .await;

        let outcome = source_for(&server).await.fetch_listing(LISTING).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_server_error_is_retryable_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let result = source_for(&server).await.fetch_listing(LISTING).await;
        assert!(matches!(result, Err(FetchError::Status(502))));
    }
}
