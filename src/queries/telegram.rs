use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

use crate::types::{Notifier, SendError};

/// How long Telegram may hold a `getUpdates` request open.
pub const LONG_POLL_SECS: u64 = 30;

/// A client for the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_base: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct BotUser {
    username: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    pub id: i64,
}

impl TelegramClient {
    pub fn new(api_url: &Url, bot_token: &str) -> Result<Self, SendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_SECS + 10))
            .build()?;
        let api_base = format!("{}/bot{bot_token}", api_url.as_str().trim_end_matches('/'));

        Ok(TelegramClient { client, api_base })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &impl Serialize,
    ) -> Result<T, SendError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await?;
        let status = response.status();

        let body = response.text().await?;
        match serde_json::from_str::<ApiResponse<T>>(&body) {
            Ok(ApiResponse {
                ok: true,
                result: Some(result),
                ..
            }) => Ok(result),
            Ok(ApiResponse { description, .. }) => Err(SendError::Rejected {
                status,
                body: description.unwrap_or(body),
            }),
            Err(_) => Err(SendError::Rejected { status, body }),
        }
    }

    /// The bot's own username, used to tell our `/cmd@Bot` commands from other bots'.
    pub async fn get_me(&self) -> Result<String, SendError> {
        let me: BotUser = self.call("getMe", &serde_json::json!({})).await?;
        Ok(me.username.unwrap_or_default())
    }

    /// Long-polls for new updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, SendError> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: LONG_POLL_SECS,
                allowed_updates: ["message"],
            },
        )
        .await
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, destination: &str, text: &str) -> Result<(), SendError> {
        let payload = SendMessage {
            chat_id: destination,
            text,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SendError::Rejected { status, body });
        }

        Ok(())
    }
}
