//! Where finished work is delivered: the chat platform and the Twitch relay.

use async_trait::async_trait;
use lighty_core::ChannelRef;

/// File attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
    /// Hidden behind a spoiler until clicked
    pub spoiler: bool,
}

impl Attachment {
    pub fn spoiler(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
            spoiler: true,
        }
    }
}

/// A message that was posted, addressed by its permanent link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub link: String,
}

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("Discord error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("Relay error: {0}")]
    Relay(String),
}

/// Outgoing side of the bot.
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn send_files(
        &self,
        channel: ChannelRef,
        content: &str,
        files: Vec<Attachment>,
    ) -> Result<PostedMessage, OutboxError>;

    async fn send_text(&self, channel: ChannelRef, content: &str)
    -> Result<PostedMessage, OutboxError>;

    /// Post a notice to the Twitch channel's chat.
    async fn relay_notice(&self, text: &str) -> Result<(), OutboxError>;
}
