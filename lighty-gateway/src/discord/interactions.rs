use lighty_core::{ChannelRef, PackSize, QueueItem, Requester};
use serenity::builder::{CreateInteractionResponse, CreateInteractionResponseMessage};
use serenity::model::application::{CommandInteraction, Interaction};
use serenity::prelude::*;
use tracing::{info, warn};

use crate::dispatcher::AdmissionError;

use super::bot::Bot;

pub const CARD_COMMAND: &str = "lighty_mtg";
pub const PACK_COMMAND: &str = "lighty_mtg_three_pack";

const DISABLED_OR_BANNED: &str = "Disabled or user banned";
const CARD_ACCEPTED: &str = "Card Being Created:";
const CARD_QUEUE_FULL: &str =
    "Queue limit reached, please wait until your current gen or gens finish";
const QUEUE_CLOSED: &str = "The bot is shutting down, please try again later";

/// Pack size requested by a slash command, if it is one of ours.
pub fn command_pack_size(name: &str) -> Option<PackSize> {
    match name {
        CARD_COMMAND => Some(PackSize::Single),
        PACK_COMMAND => Some(PackSize::Triple),
        _ => None,
    }
}

/// Reply text for an admission outcome and whether only the requester sees it.
pub fn admission_reply(outcome: Result<usize, AdmissionError>) -> (&'static str, bool) {
    match outcome {
        Ok(_) => (CARD_ACCEPTED, true),
        Err(AdmissionError::QueueLimitReached) => (CARD_QUEUE_FULL, false),
        Err(AdmissionError::Closed) => (QUEUE_CLOSED, true),
    }
}

fn command_prompt(command: &CommandInteraction) -> String {
    command
        .data
        .options
        .iter()
        .find(|option| option.name == "prompt")
        .and_then(|option| option.value.as_str())
        .unwrap_or_default()
        .to_string()
}

async fn respond(ctx: &Context, command: &CommandInteraction, content: &str, ephemeral: bool) {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(ephemeral),
    );
    if let Err(e) = command.create_response(&ctx.http, response).await {
        warn!("Failed to answer interaction: {}", e);
    }
}

impl Bot {
    pub(super) async fn handle_interaction(&self, ctx: Context, interaction: Interaction) {
        let Some(command) = interaction.as_command() else {
            return;
        };
        let Some(pack) = command_pack_size(command.data.name.as_str()) else {
            return;
        };

        let requester = Requester::discord(command.user.id.get(), command.user.name.clone());
        if !self.allowed(&requester) {
            respond(&ctx, command, DISABLED_OR_BANNED, true).await;
            return;
        }

        let prompt = command_prompt(command);
        let item = QueueItem::card(
            prompt.clone(),
            requester,
            ChannelRef(command.channel_id.get()),
            pack,
        );

        let outcome = self.dispatcher.enqueue(item);
        if outcome.is_ok() {
            info!(user = %command.user.name, prompt = %prompt, "Card queued");
        }
        let (content, ephemeral) = admission_reply(outcome);
        respond(&ctx, command, content, ephemeral).await;
    }
}
