//! Twitch side of the bot: channel-point redemptions in, chat notices out.

mod auth;
mod chat;
mod pubsub;

pub use auth::{TOKEN_URL, TwitchAuth};
pub use chat::{CHAT_URL, ChatConfig, TwitchChat, ping_reply, privmsg};
pub use pubsub::{
    PUBSUB_URL, Redemption, RedemptionListener, RedemptionOutcome, admit_redemption,
    parse_redemption,
};

#[derive(Debug, thiserror::Error)]
pub enum TwitchError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token refresh rejected ({status}): {body}")]
    RefreshRejected { status: u16, body: String },

    #[error("Token store error: {0}")]
    TokenStore(#[from] lighty_core::config::SecretsError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Twitch chat task is gone")]
    ChatClosed,

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
