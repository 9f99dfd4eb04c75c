use crate::models::UserId;
use async_trait::async_trait;

/// Failure to deliver one message. Never fatal: callers log it and move on.
#[derive(thiserror::Error, Debug)]
pub enum MessengerError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rejected by the chat platform ({status_code}): {description}")]
    Rejected { status_code: u16, description: String },
    #[error("no answer after {0:?}")]
    Timeout(std::time::Duration),
}

/// Outbound side of the chat platform as seen by the notification dispatcher.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, user_id: UserId, text: &str) -> Result<(), MessengerError>;
}
