use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::Result;

/// One inline button row under a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub url: String,
}

impl InlineKeyboard {
    pub fn single(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            inline_keyboard: vec![vec![InlineButton {
                text: text.into(),
                url: url.into(),
            }]],
        }
    }
}

/// Identity of a message the transport confirmed as sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub chat_type: String,
    pub chat_id: i64,
    pub chat_username: Option<String>,
    pub message_id: i64,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Post a new message to the channel
    async fn send_message(&self, text: &str, markup: &InlineKeyboard) -> Result<SentMessage>;

    /// Replace text and markup of an existing message. An unchanged message is not an error.
    async fn edit_message(&self, message_id: i64, text: &str, markup: &InlineKeyboard) -> Result<()>;
}
