use std::sync::Arc;
use std::time::Duration;

use lighty_core::config::Settings;
use tracing::{error, info, warn};

use lighty_gateway::cards::{CardAssets, TemplateForge};
use lighty_gateway::chat::TextChatResponder;
use lighty_gateway::discord::{DiscordOutbox, start_discord_bot};
use lighty_gateway::generation::{ImageGenerator, RetryPolicy, TextGenerator, TokioProcessRunner};
use lighty_gateway::twitch::{CHAT_URL, ChatConfig, RedemptionListener, TwitchAuth, TwitchChat};
use lighty_gateway::vault::FsCardVault;
use lighty_gateway::{Dispatcher, Pipeline};

const ONLINE_NOTICE: &str = "Lighty CCG Redemption Bot Online";
const OFFLINE_NOTICE: &str = "Lighty CCG Redemption Bot Offline";
const CHAT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lighty_core::load_dotenv();

    // Load configuration
    let config = lighty_core::Config::load()?;
    let _log_guard = lighty_gateway::logging::init(&config.settings.logging)?;
    info!(
        "Configuration loaded (queue depth {}, twitch {})",
        config.user_queue_depth(),
        if config.twitch_enabled() { "on" } else { "off" }
    );

    let settings = Arc::new(config.settings.clone());
    let dispatcher = Arc::new(Dispatcher::new(config.user_queue_depth()));

    // Generation processes
    let generation = &settings.generation;
    let runner = Arc::new(TokioProcessRunner::new(
        generation.timeout_seconds.map(Duration::from_secs),
    ));
    let text = Arc::new(TextGenerator::new(
        generation.text_command.clone(),
        runner.clone(),
    ));
    let art = Arc::new(
        ImageGenerator::new(
            generation.image_command.clone(),
            runner,
            RetryPolicy::from_settings(generation),
        )
        .with_negative_prompt(generation.negative_prompt.clone())
        .with_lora(generation.lora.clone()),
    );

    let assets_dir = settings.cards.assets_dir.clone();
    let assets = Arc::new(tokio::task::spawn_blocking(move || CardAssets::load(assets_dir)).await??);
    let forge = TemplateForge::new(assets, text.clone(), art, settings.cards.copyright.clone());

    // Twitch chat relay
    let twitch_chat = if config.twitch_enabled() {
        match config.secrets.twitch_chat_token.clone() {
            Some(token) => {
                let chat = TwitchChat::spawn(ChatConfig {
                    url: CHAT_URL.to_string(),
                    nick: settings.twitch.bot_nick.clone(),
                    token,
                    channel: settings.twitch.channel.clone(),
                });
                chat.say(ONLINE_NOTICE)?;
                Some(chat)
            }
            None => {
                warn!("TWITCH_CHAT_TOKEN not set, Twitch notices are disabled");
                None
            }
        }
    } else {
        None
    };

    // Discord is where every result lands, so it is required
    let token = config.discord_bot_token().unwrap_or_default().to_string();
    let mut client = start_discord_bot(token, dispatcher.clone(), settings.clone()).await?;

    let pipeline = Pipeline {
        forge: Arc::new(forge),
        chat: Arc::new(TextChatResponder::new(text)),
        outbox: Arc::new(DiscordOutbox::new(client.http.clone(), twitch_chat.clone())),
        vault: Arc::new(FsCardVault::new(settings.cards.users_dir.clone())),
        pack_viewer_url: settings.cards.pack_viewer_url.clone(),
    };
    tokio::spawn(dispatcher.clone().run_forever(pipeline));

    // Channel-point redemptions
    if config.twitch_enabled()
        && let (Some(client_id), Some(client_secret), Some(tokens)) = (
            config.secrets.twitch_client_id.clone(),
            config.secrets.twitch_client_secret.clone(),
            config.secrets.twitch_tokens.clone(),
        )
    {
        let auth = Arc::new(TwitchAuth::new(
            client_id,
            client_secret,
            tokens,
            Settings::token_store_path()?,
        ));
        let listener =
            RedemptionListener::new(dispatcher.clone(), settings.clone(), auth, twitch_chat.clone());
        tokio::spawn(listener.run());
        info!("Twitch redemption listener started");
    }

    let shard_manager = client.shard_manager.clone();
    tokio::select! {
        result = client.start() => {
            if let Err(e) = result {
                error!("Discord client error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    if let Some(chat) = &twitch_chat {
        if let Err(e) = chat.say(OFFLINE_NOTICE) {
            warn!("Failed to send offline notice: {}", e);
        }
        if tokio::time::timeout(CHAT_SHUTDOWN_TIMEOUT, chat.shutdown())
            .await
            .is_err()
        {
            warn!("Twitch chat did not close in time");
        }
    }
    shard_manager.shutdown_all().await;
    dispatcher.close();

    Ok(())
}
