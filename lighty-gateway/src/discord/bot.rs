use std::sync::{Arc, LazyLock};

use lighty_core::config::Settings;
use lighty_core::{ChannelRef, QueueItem, Requester};
use regex::Regex;
use serenity::async_trait;
use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::{Command, CommandOptionType, Interaction};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{error, info, warn};

use crate::dispatcher::{AdmissionError, Dispatcher};

use super::interactions::{CARD_COMMAND, PACK_COMMAND};

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("mention regex"));

const CHAT_QUEUE_FULL: &str =
    "Queue limit has been reached, please wait for your previous gens to finish";

/// Remove user, role and channel tags from a message.
pub fn strip_mentions(content: &str) -> String {
    MENTION_RE.replace_all(content, "").trim_start().to_string()
}

/// Discord bot handler
///
/// Turns slash commands and mentions into queue items; everything after
/// admission happens in the dispatcher.
pub struct Bot {
    pub(super) dispatcher: Arc<Dispatcher>,
    pub(super) settings: Arc<Settings>,
}

impl Bot {
    pub fn new(dispatcher: Arc<Dispatcher>, settings: Arc<Settings>) -> Self {
        Self {
            dispatcher,
            settings,
        }
    }

    pub(super) fn allowed(&self, requester: &Requester) -> bool {
        self.settings.is_enabled_not_banned(&requester.ban_key())
    }
}

fn prompt_command(name: &str, description: &str) -> CreateCommand {
    CreateCommand::new(name).description(description).add_option(
        CreateCommandOption::new(CommandOptionType::String, "prompt", "What the card is about")
            .required(true),
    )
}

#[async_trait]
impl EventHandler for Bot {
    /// Mentions become chat requests
    async fn message(&self, ctx: Context, msg: Message) {
        // Ignore messages from bots (including ourselves)
        if msg.author.bot {
            return;
        }

        if !msg.mentions_me(&ctx).await.unwrap_or(false) {
            return;
        }

        let requester = Requester::discord(msg.author.id.get(), msg.author.name.clone());
        if !self.allowed(&requester) {
            return;
        }

        let prompt = strip_mentions(&msg.content);
        let item = QueueItem::chat(prompt.clone(), requester, ChannelRef(msg.channel_id.get()));

        match self.dispatcher.enqueue(item) {
            Ok(_) => info!(user = %msg.author.name, prompt = %prompt, "Chat queued"),
            Err(AdmissionError::QueueLimitReached) => {
                if let Err(e) = msg.channel_id.say(&ctx.http, CHAT_QUEUE_FULL).await {
                    warn!("Failed to send queue limit notice: {}", e);
                }
            }
            Err(AdmissionError::Closed) => {
                warn!(user = %msg.author.name, "Chat dropped, queue is closed");
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        self.handle_interaction(ctx, interaction).await;
    }

    /// Register slash commands once connected
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, userid = %ready.user.id, "Discord login successful");

        let commands = vec![
            prompt_command(CARD_COMMAND, "Generate a Lighty MTG card"),
            prompt_command(PACK_COMMAND, "Generate a pack of three Lighty MTG cards"),
        ];

        if let Err(e) = Command::set_global_commands(&ctx.http, commands).await {
            error!("Failed to register slash commands: {}", e);
        }
    }
}
