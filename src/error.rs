//! Error taxonomy for the collaborator seams.
//!
//! Only `StoreError` can abort a poll cycle. Parse errors are recovered at the
//! record boundary, fetch errors feed the retry budget, and notifier errors
//! are logged and dropped.

use std::path::PathBuf;

use thiserror::Error;

/// A numeric or duration field could not be parsed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid amount {0:?}")]
    Amount(String),

    #[error("invalid estimate range {0:?}")]
    Estimate(String),

    #[error("no duration units in {0:?}")]
    Duration(String),

    #[error("invalid capture timestamp {0}")]
    Timestamp(f64),
}

/// The listing source could not produce a snapshot on this attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("listing service returned status {0}")]
    Status(u16),

    #[error("malformed listing snapshot: {0}")]
    Decode(String),
}

/// Persistence read/write failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode items: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Alert delivery failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat {chat_id} rejected the message with status {status}")]
    Rejected { chat_id: String, status: u16 },

    #[error("notifier is disabled")]
    Disabled,
}
