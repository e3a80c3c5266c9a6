//! Configuration management for lighty.
//!
//! Secrets come from environment variables, settings from a TOML file.
//!
//! # Configuration Sources
//!
//! ## Secrets (Environment Variables)
//! - `DISCORD_BOT_TOKEN` - Discord bot token (required)
//! - `TWITCH_CLIENT_ID` / `TWITCH_CLIENT_SECRET` - Twitch application
//! - `TWITCH_ACCESS_TOKEN` / `TWITCH_REFRESH_TOKEN` - channel-points OAuth pair
//! - `TWITCH_CHAT_TOKEN` - chat token of the bot account
//!
//! ## Settings (TOML File)
//! Located at `~/.config/lighty/config.toml`:
//! ```toml
//! [bot]
//! user_queue_depth = 1
//! banned_users = "1234,5678"
//!
//! [twitch]
//! enabled = true
//! channel_id = 4242
//! ```

mod secrets;
mod settings;

pub use secrets::{Secrets, SecretsError, TwitchTokens};
pub use settings::{
    BotSettings, CardSettings, DiscordSettings, GenerationSettings, IdentityList,
    LoggingSettings, Settings, SettingsError, TwitchSettings,
};

/// Combined configuration containing both secrets and settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secrets loaded from environment variables
    pub secrets: Secrets,
    /// Settings loaded from TOML configuration file
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("user_queue_depth must be at least 1")]
    InvalidQueueDepth,

    #[error("Twitch is enabled but secrets are missing: {0}")]
    TwitchSecretsMissing(String),

    #[error("Twitch is enabled but twitch.channel_id is not set")]
    TwitchChannelIdMissing,

    #[error("Twitch is enabled but discord.card_channel_id is not set")]
    CardChannelMissing,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DISCORD_BOT_TOKEN` is missing
    /// - The TOML file cannot be read or parsed
    /// - Twitch is enabled without its secrets or channel ids
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Settings::load()?;
        let secrets = Secrets::from_env()?.with_token_store(&Settings::token_store_path()?)?;

        let config = Self { secrets, settings };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.bot.user_queue_depth == 0 {
            return Err(ConfigError::InvalidQueueDepth);
        }

        if self.settings.twitch.enabled {
            let missing = self.secrets.missing_twitch_secrets();
            if !missing.is_empty() {
                return Err(ConfigError::TwitchSecretsMissing(missing.join(", ")));
            }
            if self.settings.twitch.channel_id == 0 {
                return Err(ConfigError::TwitchChannelIdMissing);
            }
            if self.settings.discord.card_channel_id == 0 {
                return Err(ConfigError::CardChannelMissing);
            }
        }

        Ok(())
    }

    /// Discord bot token; `Secrets::from_env` refuses to load without one.
    pub fn discord_bot_token(&self) -> Option<&str> {
        self.secrets.discord_bot_token.as_deref()
    }

    /// Check if the Twitch adapter should start.
    pub fn twitch_enabled(&self) -> bool {
        self.settings.twitch.enabled && self.secrets.missing_twitch_secrets().is_empty()
    }

    pub fn user_queue_depth(&self) -> u32 {
        self.settings.bot.user_queue_depth
    }
}

/// Load .env file if it exists (for development convenience).
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}
