//! Minimal Telegram Bot API client: long polling, text and photo messages,
//! callback answers.

use crate::messenger::{Messenger, MessengerError};
use crate::models::UserId;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

pub const POLL_TIMEOUT_SECS: u64 = 30;

// --- Incoming types ---

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    /// Available sizes of a photo, smallest first.
    pub photo: Option<Vec<PhotoSize>>,
    pub caption: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

// --- Outgoing types ---

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Keyboard {
        keyboard: Vec<Vec<KeyboardButton>>,
        resize_keyboard: bool,
        one_time_keyboard: bool,
    },
    Remove {
        remove_keyboard: bool,
    },
    Inline {
        inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
    },
}

impl ReplyMarkup {
    pub fn keyboard<S: Into<String>>(rows: Vec<Vec<S>>, one_time: bool) -> Self {
        ReplyMarkup::Keyboard {
            keyboard: rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|text| KeyboardButton { text: text.into() })
                        .collect()
                })
                .collect(),
            resize_keyboard: true,
            one_time_keyboard: one_time,
        }
    }

    pub fn remove() -> Self {
        ReplyMarkup::Remove {
            remove_keyboard: true,
        }
    }

    pub fn inline(buttons: Vec<InlineKeyboardButton>) -> Self {
        ReplyMarkup::Inline {
            inline_keyboard: buttons.into_iter().map(|button| vec![button]).collect(),
        }
    }
}

/// Escapes user-provided text for the legacy `Markdown` parse mode.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Clone)]
pub struct TelegramClient {
    base_url: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self, MessengerError> {
        // Long polls hold the request open for POLL_TIMEOUT_SECS.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 15))
            .build()?;

        Ok(Self {
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            client,
        })
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<R, MessengerError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(&params)
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let body = response.json::<ApiResponse<R>>().await?;

        match body {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            other => Err(MessengerError::Rejected {
                status_code: other.error_code.unwrap_or(status_code),
                description: other
                    .description
                    .unwrap_or_else(|| format!("{} returned no result", method)),
            }),
        }
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, MessengerError> {
        let mut params = json!({
            "timeout": POLL_TIMEOUT_SECS,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            params["offset"] = json!(offset);
        }
        self.call("getUpdates", params).await
    }

    /// Discards updates queued while the bot was offline and returns the
    /// offset to resume from.
    pub async fn drop_pending_updates(&self) -> Result<Option<i64>, MessengerError> {
        let pending: Vec<Update> = self
            .call("getUpdates", json!({ "offset": -1, "timeout": 0 }))
            .await?;
        Ok(pending.last().map(|update| update.update_id + 1))
    }

    pub async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        markdown: bool,
        reply_markup: Option<&ReplyMarkup>,
    ) -> Result<Message, MessengerError> {
        let mut params = json!({ "chat_id": chat_id, "text": text });
        if markdown {
            params["parse_mode"] = json!("Markdown");
        }
        if let Some(markup) = reply_markup {
            params["reply_markup"] = json!(markup);
        }
        self.call("sendMessage", params).await
    }

    pub async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<Message, MessengerError> {
        let mut params = json!({ "chat_id": chat_id, "photo": file_id });
        if let Some(caption) = caption {
            params["caption"] = json!(caption);
        }
        self.call("sendPhoto", params).await
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), MessengerError> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                json!({ "callback_query_id": callback_query_id }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, user_id: UserId, text: &str) -> Result<(), MessengerError> {
        // Private chats share their id with the user.
        self.send_text(user_id, text, true, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_and_photo_updates() {
        let raw = r#"[
            {"update_id": 10, "message": {"message_id": 1, "chat": {"id": 42, "type": "private"},
              "from": {"id": 42, "is_bot": false, "first_name": "Ana"}, "date": 0, "text": "/start"}},
            {"update_id": 11, "message": {"message_id": 2, "chat": {"id": 42, "type": "private"},
              "from": {"id": 42, "is_bot": false, "first_name": "Ana"}, "date": 0,
              "photo": [{"file_id": "small", "width": 90, "height": 90},
                        {"file_id": "large", "width": 800, "height": 800}],
              "caption": "new leaf"}},
            {"update_id": 12, "callback_query": {"id": "cb1", "from": {"id": 42, "is_bot": false, "first_name": "Ana"},
              "data": "photos_3"}}
        ]"#;
        let updates: Vec<Update> = serde_json::from_str(raw).unwrap();

        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/start"));
        let photo = updates[1].message.as_ref().unwrap().photo.as_ref().unwrap();
        assert_eq!(photo.last().unwrap().file_id, "large");
        let callback = updates[2].callback_query.as_ref().unwrap();
        assert_eq!(callback.data.as_deref(), Some("photos_3"));
        assert_eq!(callback.from.id, 42);
    }

    #[test]
    fn serializes_keyboards_in_bot_api_shape() {
        let markup = ReplyMarkup::keyboard(vec![vec!["Fern"], vec!["Cancel"]], true);
        assert_eq!(
            serde_json::to_value(&markup).unwrap(),
            json!({
                "keyboard": [[{"text": "Fern"}], [{"text": "Cancel"}]],
                "resize_keyboard": true,
                "one_time_keyboard": true
            })
        );
        assert_eq!(
            serde_json::to_value(ReplyMarkup::remove()).unwrap(),
            json!({ "remove_keyboard": true })
        );
        let inline = ReplyMarkup::inline(vec![InlineKeyboardButton {
            text: "Fern".to_string(),
            callback_data: "photos_1".to_string(),
        }]);
        assert_eq!(
            serde_json::to_value(&inline).unwrap(),
            json!({ "inline_keyboard": [[{"text": "Fern", "callback_data": "photos_1"}]] })
        );
    }

    #[test]
    fn rejected_calls_carry_the_api_description() {
        let raw = r#"{"ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"}"#;
        let body: ApiResponse<Message> = serde_json::from_str(raw).unwrap();
        assert!(!body.ok);
        assert_eq!(body.error_code, Some(403));
        assert!(body.result.is_none());
    }

    #[test]
    fn escapes_markdown_entities() {
        assert_eq!(escape_markdown("snake_plant *big*"), "snake\\_plant \\*big\\*");
        assert_eq!(escape_markdown("Fern"), "Fern");
    }
}
