use async_trait::async_trait;
use serde::Deserialize;
use serde_with::{DefaultOnError, DefaultOnNull, DisplayFromStr, PickFirst, serde_as};
use thiserror::Error;

use crate::queries::accounts::Registry;

// DB Types

/// One registered owner and the account they asked us to watch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedAccount {
    pub owner_id: String,
    pub external_name: String,
    /// Timestamp of the last submission we have seen. `0` means never observed.
    pub last_seen_timestamp: i64,
}

// JSON Types

/// The most recent submission reported for an account.
///
/// Every field falls back to an empty value when the remote payload leaves it
/// out or sends something unexpected, so a half-broken record still decodes.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub title: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, rename = "statusDisplay")]
    pub status_label: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, rename = "lang")]
    pub language_label: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default, rename = "titleSlug")]
    pub slug: String,
    // LeetCode sends the timestamp as a string of seconds
    #[serde_as(as = "DefaultOnError<PickFirst<(DisplayFromStr, _)>>")]
    #[serde(default)]
    pub timestamp: i64,
}

// Collaborator seams

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("remote returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed payload: {0}")]
    Payload(String),
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("telegram rejected the message with status {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Looks up the latest activity of an external account.
#[async_trait]
pub trait ActivityFetcher: Send + Sync {
    async fn fetch_latest(&self, external_name: &str)
    -> Result<Option<ActivityRecord>, FetchError>;
}

/// Delivers a text message to a chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &str, text: &str) -> Result<(), SendError>;
}

// Server Types

pub struct AppState {
    pub registry: Registry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_submission() {
        let record: ActivityRecord = serde_json::from_str(
            r#"{"title":"Two Sum","titleSlug":"two-sum","timestamp":"1700000000","statusDisplay":"Accepted","lang":"python3"}"#,
        )
        .unwrap();

        assert_eq!(record.title, "Two Sum");
        assert_eq!(record.slug, "two-sum");
        assert_eq!(record.status_label, "Accepted");
        assert_eq!(record.language_label, "python3");
        assert_eq!(record.timestamp, 1_700_000_000);
    }

    #[test]
    fn numeric_timestamp_is_accepted() {
        let record: ActivityRecord = serde_json::from_str(r#"{"timestamp":200}"#).unwrap();
        assert_eq!(record.timestamp, 200);
    }

    #[test]
    fn missing_or_broken_fields_fall_back_to_defaults() {
        let record: ActivityRecord =
            serde_json::from_str(r#"{"title":null,"timestamp":"yesterday"}"#).unwrap();
        assert_eq!(record, ActivityRecord::default());

        let record: ActivityRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record.timestamp, 0);
        assert!(record.title.is_empty());
    }
}
