//! Telegram deal alerts.
//!
//! Renders state-machine events as plain-text messages and delivers them to
//! every configured chat through the Telegram Bot API.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{info, warn};

use crate::deal::alert_state::{AlertEvent, AlertKind};
use crate::error::NotifyError;
use crate::lot::time_model::format_duration;
use crate::store::record::StoredItem;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Delivers rendered alerts to a human.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

fn headline(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::NewDeal => "NEW OFFER FOUND",
        AlertKind::Updated => "OFFER UPDATED",
        AlertKind::ClosingSoon => "OFFER CLOSING SOON",
    }
}

/// Message text listing every field, with a live countdown instead of the captured one.
pub fn render_message(event: &AlertEvent) -> String {
    let fields = StoredItem::from_record(&event.item);
    let reserve = if fields.reserve_price.is_empty() {
        "Unknown"
    } else {
        fields.reserve_price.as_str()
    };

    format!(
        "{}:\n\n\
         title : {}\n\
         price : {}\n\
         time : {}\n\
         url : {}\n\
         estimated_price : {}\n\
         reserve_price : {}\n",
        headline(event.kind),
        fields.title,
        fields.price,
        format_duration(event.remaining.num_seconds()),
        fields.url,
        fields.estimated_price,
        reserve,
    )
}

/// Telegram `sendMessage` payload.
#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

pub struct TelegramNotifier {
    bot_token: Option<SecretString>,
    chat_ids: Vec<String>,
    api_base_url: String,
    http: reqwest::Client,
    limiter: Arc<Limiter>,
    enabled: bool,
}

impl TelegramNotifier {
    pub fn new(
        bot_token: Option<SecretString>,
        chat_ids: Vec<String>,
        api_base_url: &str,
        messages_per_second: u32,
        enabled: bool,
    ) -> Self {
        Self {
            enabled: enabled && bot_token.is_some() && !chat_ids.is_empty(),
            bot_token,
            chat_ids,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            limiter: create_rate_limiter(messages_per_second),
        }
    }

    async fn send_to(&self, token: &str, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        self.limiter.until_ready().await;

        let url = format!("{}/bot{}/sendMessage", self.api_base_url, token);
        let payload = SendMessage {
            chat_id,
            text,
            disable_web_page_preview: false,
        };

        let response = self.http.post(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                chat_id: chat_id.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    /// Send to every chat; the first failure is reported after all chats were tried.
    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        if !self.enabled {
            return Err(NotifyError::Disabled);
        }
        let Some(ref token) = self.bot_token else {
            return Err(NotifyError::Disabled);
        };

        let text = render_message(event);
        let mut first_error = None;

        for chat_id in &self.chat_ids {
            match self.send_to(token.expose_secret(), chat_id, &text).await {
                Ok(()) => info!(chat_id = %chat_id, kind = %event.kind, url = %event.item.url, "Alert sent"),
                Err(e) => {
                    warn!(chat_id = %chat_id, error = %e, "Failed to send Telegram alert");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

fn create_rate_limiter(messages_per_second: u32) -> Arc<Limiter> {
    let rate = NonZeroU32::new(messages_per_second).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(rate)))
}
