mod bot;
mod interactions;
mod outbox;

use std::sync::Arc;

use lighty_core::config::Settings;
use serenity::prelude::*;
use tracing::info;

use crate::dispatcher::Dispatcher;

pub use bot::{Bot, strip_mentions};
pub use interactions::{CARD_COMMAND, PACK_COMMAND, admission_reply, command_pack_size};
pub use outbox::{DiscordOutbox, SPOILER_PREFIX};

/// Build the Discord client. Every result is delivered through it.
pub async fn start_discord_bot(
    token: String,
    dispatcher: Arc<Dispatcher>,
    settings: Arc<Settings>,
) -> Result<Client, DiscordError> {
    info!("Starting Discord bot...");

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let bot = Bot::new(dispatcher, settings);

    let client = Client::builder(&token, intents)
        .event_handler(bot)
        .await
        .map_err(|e| DiscordError::ClientError(e.to_string()))?;

    Ok(client)
}

/// Discord-related errors
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("Failed to create Discord client: {0}")]
    ClientError(String),
}
