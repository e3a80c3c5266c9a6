use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use lighty_core::ChannelRef;
use serenity::builder::{CreateAttachment, CreateMessage};
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::id::{ChannelId, GuildId};
use tracing::{debug, warn};

use crate::outbox::{Attachment, Outbox, OutboxError, PostedMessage};
use crate::twitch::TwitchChat;

/// Filename prefix that makes Discord blur an attachment.
pub const SPOILER_PREFIX: &str = "SPOILER_";

fn discord_filename(attachment: &Attachment) -> String {
    if attachment.spoiler && !attachment.filename.starts_with(SPOILER_PREFIX) {
        format!("{}{}", SPOILER_PREFIX, attachment.filename)
    } else {
        attachment.filename.clone()
    }
}

/// Jump link for a posted message.
///
/// Messages returned by REST calls carry no guild id, so the guild of the
/// channel is passed in.
fn message_link(message: &Message, guild: Option<GuildId>) -> String {
    message
        .id
        .link(message.channel_id, message.guild_id.or(guild))
}

/// Delivers to Discord channels over REST, relays notices to Twitch chat.
pub struct DiscordOutbox {
    http: Arc<Http>,
    relay: Option<TwitchChat>,
    guilds: Mutex<HashMap<ChannelId, Option<GuildId>>>,
}

impl DiscordOutbox {
    pub fn new(http: Arc<Http>, relay: Option<TwitchChat>) -> Self {
        Self {
            http,
            relay,
            guilds: Mutex::new(HashMap::new()),
        }
    }

    /// Guild owning `channel`, `None` for DMs. Fetched once per channel.
    async fn guild_of(&self, channel: ChannelId) -> Option<GuildId> {
        let cached = self
            .guilds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .copied();
        if let Some(guild) = cached {
            return guild;
        }

        match channel.to_channel(&*self.http).await {
            Ok(found) => {
                let guild = found.guild().map(|c| c.guild_id);
                self.guilds
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(channel, guild);
                guild
            }
            Err(e) => {
                warn!(channel = %channel, "Failed to look up channel guild: {}", e);
                None
            }
        }
    }

    async fn posted(&self, message: &Message) -> PostedMessage {
        let guild = match message.guild_id {
            Some(guild) => Some(guild),
            None => self.guild_of(message.channel_id).await,
        };
        PostedMessage {
            link: message_link(message, guild),
        }
    }
}

#[async_trait]
impl Outbox for DiscordOutbox {
    async fn send_files(
        &self,
        channel: ChannelRef,
        content: &str,
        files: Vec<Attachment>,
    ) -> Result<PostedMessage, OutboxError> {
        let files = files
            .into_iter()
            .map(|file| {
                let name = discord_filename(&file);
                CreateAttachment::bytes(file.data, name)
            })
            .collect::<Vec<_>>();
        let builder = CreateMessage::new().content(content).add_files(files);
        let message = ChannelId::new(channel.get())
            .send_message(&*self.http, builder)
            .await?;
        Ok(self.posted(&message).await)
    }

    async fn send_text(
        &self,
        channel: ChannelRef,
        content: &str,
    ) -> Result<PostedMessage, OutboxError> {
        let message = ChannelId::new(channel.get())
            .say(&*self.http, content)
            .await?;
        Ok(self.posted(&message).await)
    }

    async fn relay_notice(&self, text: &str) -> Result<(), OutboxError> {
        match &self.relay {
            Some(chat) => chat
                .say(text)
                .map_err(|e| OutboxError::Relay(e.to_string())),
            None => {
                debug!("No Twitch chat configured, dropping notice: {}", text);
                Ok(())
            }
        }
    }
}
