use std::time::Duration;

use async_trait::async_trait;
use dd_core::{Error, InlineKeyboard, Result, SentMessage, Transport};
use serde::Deserialize;
use serde_json::{json, Value};

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<Value>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message_id: i64,
    chat: ApiChat,
}

#[derive(Debug, Deserialize)]
struct ApiChat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
    username: Option<String>,
}

/// Bot API transport for one chat.
#[derive(Clone)]
pub struct TelegramTransport {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: i64,
}

impl TelegramTransport {
    pub fn new(bot_token: impl Into<String>, chat_id: i64, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: API_BASE.to_string(),
            bot_token: bot_token.into(),
            chat_id,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn call(&self, method: &str, mut body: Value) -> Result<Option<Value>> {
        body["chat_id"] = json!(self.chat_id);
        body["parse_mode"] = json!("HTML");
        let url = format!("{}/bot{}/{}", self.api_base, self.bot_token, method);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", method, e)))?;
        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", method, e)))?;
        interpret(envelope(status, &raw)?)
    }
}

/// Proxies and outages answer with bodies that are not API envelopes.
fn envelope(status: reqwest::StatusCode, raw: &str) -> Result<ApiResponse> {
    serde_json::from_str(raw).map_err(|_| {
        let body: String = raw.trim().chars().take(200).collect();
        Error::Transport(format!("HTTP {}: {}", status, body))
    })
}

/// Telegram reports failures inside a 200/400 envelope.
fn interpret(response: ApiResponse) -> Result<Option<Value>> {
    if response.ok {
        return Ok(response.result);
    }
    let description = response.description.unwrap_or_else(|| "unknown error".to_string());
    if description.contains("message is not modified") {
        return Ok(None);
    }
    Err(Error::Transport(description))
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(&self, text: &str, markup: &InlineKeyboard) -> Result<SentMessage> {
        let result = self
            .call("sendMessage", json!({ "text": text, "reply_markup": markup }))
            .await?
            .ok_or_else(|| Error::Transport("sendMessage returned no message".to_string()))?;
        let message: ApiMessage = serde_json::from_value(result)?;
        Ok(SentMessage {
            chat_type: message.chat.kind,
            chat_id: message.chat.id,
            chat_username: message.chat.username,
            message_id: message.message_id,
        })
    }

    async fn edit_message(&self, message_id: i64, text: &str, markup: &InlineKeyboard) -> Result<()> {
        self.call(
            "editMessageText",
            json!({ "message_id": message_id, "text": text, "reply_markup": markup }),
        )
        .await?;
        Ok(())
    }
}
