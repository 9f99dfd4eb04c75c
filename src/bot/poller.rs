use super::{Conversation, Input, Reply};
use crate::messenger::MessengerError;
use crate::models::UserId;
use crate::telegram::{TelegramClient, Update};
use std::sync::Arc;
use std::time::Duration;

const RETRY_DELAY: Duration = Duration::from_secs(10);

const GENERIC_ERROR: &str = "⚠️ Something went wrong. Please try again in a moment.";

#[derive(Debug, Clone, PartialEq)]
pub struct Incoming {
    pub chat_id: i64,
    pub user_id: UserId,
    pub first_name: String,
    pub input: Input,
    pub callback_id: Option<String>,
}

impl Incoming {
    /// Extracts what the conversation understands; other updates are ignored.
    pub fn from_update(update: Update) -> Option<Incoming> {
        if let Some(query) = update.callback_query {
            let chat_id = query
                .message
                .as_ref()
                .map(|message| message.chat.id)
                .unwrap_or(query.from.id);
            return Some(Incoming {
                chat_id,
                user_id: query.from.id,
                first_name: query.from.first_name,
                input: Input::Callback(query.data?),
                callback_id: Some(query.id),
            });
        }

        let message = update.message?;
        let from = message.from?;
        let input = match (message.text, message.photo) {
            (Some(text), _) => Input::Text(text),
            (None, Some(sizes)) => Input::Photo {
                // Largest size comes last.
                file_id: sizes.last()?.file_id.clone(),
                caption: message.caption,
            },
            (None, None) => return None,
        };

        Some(Incoming {
            chat_id: message.chat.id,
            user_id: from.id,
            first_name: from.first_name,
            input,
            callback_id: None,
        })
    }
}

/// Long-polls the Bot API forever. Transport failures restart polling
/// after a pause; updates queued while offline are dropped on each start.
pub async fn run_polling(client: TelegramClient, conversation: Arc<Conversation>) {
    loop {
        log::info!("Starting polling...");
        if let Err(e) = poll(&client, &conversation).await {
            log::error!("Polling error: {}", e);
            log::info!("Retrying in {} seconds...", RETRY_DELAY.as_secs());
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }
}

async fn poll(client: &TelegramClient, conversation: &Conversation) -> Result<(), MessengerError> {
    let mut offset = client.drop_pending_updates().await?;
    loop {
        for update in client.get_updates(offset).await? {
            offset = Some(update.update_id + 1);
            if let Some(incoming) = Incoming::from_update(update) {
                handle(client, conversation, incoming).await;
            }
        }
    }
}

async fn handle(client: &TelegramClient, conversation: &Conversation, incoming: Incoming) {
    if let Some(callback_id) = &incoming.callback_id {
        if let Err(e) = client.answer_callback_query(callback_id).await {
            log::warn!("Could not answer callback {}: {}", callback_id, e);
        }
    }

    let replies = match conversation
        .handle(incoming.user_id, &incoming.first_name, incoming.input)
        .await
    {
        Ok(replies) => replies,
        Err(e) => {
            log::error!("Error handling update from {}: {}", incoming.user_id, e);
            vec![Reply::text(GENERIC_ERROR)]
        }
    };

    for reply in replies {
        let sent = match &reply {
            Reply::Text {
                text,
                markdown,
                markup,
            } => client
                .send_text(incoming.chat_id, text, *markdown, markup.as_ref())
                .await
                .map(|_| ()),
            Reply::Photo { file_id, caption } => client
                .send_photo(incoming.chat_id, file_id, caption.as_deref())
                .await
                .map(|_| ()),
        };
        if let Err(e) = sent {
            log::error!("Error replying to {}: {}", incoming.chat_id, e);
        }
    }
}
