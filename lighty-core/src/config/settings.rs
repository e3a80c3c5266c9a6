//! Settings configuration loaded from TOML files.
//!
//! This module handles non-sensitive configuration stored in TOML format
//! in the XDG config directory (~/.config/lighty/config.toml).

use std::fs;
use std::path::PathBuf;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// List of requester identities (Discord snowflakes or Twitch logins).
///
/// Accepts either a comma-separated string (`"123,456"`) or a list
/// (`["123", "456"]`) in the TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityList(Vec<String>);

impl IdentityList {
    pub fn new(ids: Vec<String>) -> Self {
        Self(
            ids.into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, id: &str) -> bool {
        let id = id.trim();
        self.0.iter().any(|entry| entry.eq_ignore_ascii_case(id))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }
}

impl<'de> Deserialize<'de> for IdentityList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdentityListVisitor;

        impl<'de> Visitor<'de> for IdentityListVisitor {
            type Value = IdentityList;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a comma-separated string or a list of identities")
            }

            fn visit_str<E>(self, value: &str) -> Result<IdentityList, E>
            where
                E: de::Error,
            {
                Ok(IdentityList::new(
                    value.split(',').map(str::to_string).collect(),
                ))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<IdentityList, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut ids = Vec::new();
                while let Some(id) = seq.next_element::<String>()? {
                    ids.push(id);
                }
                Ok(IdentityList::new(ids))
            }
        }

        deserializer.deserialize_any(IdentityListVisitor)
    }
}

/// Default TOML configuration file content
const DEFAULT_CONFIG_TOML: &str = r#"# lighty configuration file
# Located at: ~/.config/lighty/config.toml
#
# This file contains non-sensitive configuration.
# Secrets are loaded from environment variables:
#   - DISCORD_BOT_TOKEN
#   - TWITCH_CLIENT_ID / TWITCH_CLIENT_SECRET
#   - TWITCH_ACCESS_TOKEN / TWITCH_REFRESH_TOKEN (channel points)
#   - TWITCH_CHAT_TOKEN (bot account chat)

[bot]
enabled = true
# Maximum outstanding generations per requester
user_queue_depth = 1
# Comma-separated string or list of Discord ids / Twitch logins
banned_users = ""

[discord]
# Channel that receives cards redeemed on Twitch
card_channel_id = 0

[twitch]
enabled = false
channel = "lighty"
channel_id = 0
reward_name = "Lighty Card"
bot_nick = "lightybot"

[generation]
# Each call runs the command once with a JSON job on stdin.
# Text: {"prompt_sets": [[{"role": ..., "content": ...}, ...], ...]} in,
#   {"prompt1": "...", "prompt2": "...", ...} out, one key per prompt set.
# Image: {"prompt", "negative_prompt", "width", "height", "lora"?} in,
#   PNG bytes out.
# Logs go to stderr; a non-zero exit fails the call.
text_command = ["python", "generators/text_stdio.py"]
image_command = ["python", "generators/image_stdio.py"]
# timeout_seconds = 600
image_max_attempts = 5
image_retry_base_ms = 2000
image_backoff_factor = 2.0
negative_prompt = "flash photography, suit, film grain"
# lora = "my-lora.safetensors"

[cards]
assets_dir = "assets"
users_dir = "users"
pack_viewer_url = "http://theblackgoat.net/cardflip-dynamic.html"
copyright = "Lightys Homeless Shelter"

[logging]
level = "info"
file_enabled = false
# file_path = "logs/bot.log"
"#;

/// Settings loaded from TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Admission and moderation
    #[serde(default)]
    pub bot: BotSettings,

    /// Discord bot configuration
    #[serde(default)]
    pub discord: DiscordSettings,

    /// Twitch channel-points configuration
    #[serde(default)]
    pub twitch: TwitchSettings,

    /// External generation processes
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Card assets and artifact storage
    #[serde(default)]
    pub cards: CardSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Admission and moderation settings
#[derive(Debug, Clone, Deserialize)]
pub struct BotSettings {
    /// Master switch for user-triggered actions
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum outstanding generations per requester
    #[serde(default = "default_user_queue_depth")]
    pub user_queue_depth: u32,

    /// Requesters who may not use the bot
    #[serde(default)]
    pub banned_users: IdentityList,
}

/// Discord bot settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordSettings {
    /// Channel that receives cards redeemed on Twitch
    #[serde(default)]
    pub card_channel_id: u64,
}

/// Twitch settings
#[derive(Debug, Clone, Deserialize)]
pub struct TwitchSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Channel login used for chat notices
    #[serde(default = "default_twitch_channel")]
    pub channel: String,

    /// Broadcaster id used for the channel-points topic
    #[serde(default)]
    pub channel_id: u64,

    /// Title of the channel-point reward that redeems a card pack
    #[serde(default = "default_reward_name")]
    pub reward_name: String,

    /// Login of the account that sends chat notices
    #[serde(default = "default_bot_nick")]
    pub bot_nick: String,
}

/// Generation subprocess settings
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSettings {
    /// Program and arguments for text generation
    #[serde(default = "default_text_command")]
    pub text_command: Vec<String>,

    /// Program and arguments for image generation
    #[serde(default = "default_image_command")]
    pub image_command: Vec<String>,

    /// Per-call timeout; unset means wait forever
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// Attempts before image generation reports a terminal failure
    #[serde(default = "default_image_max_attempts")]
    pub image_max_attempts: u32,

    /// Delay before the first image retry
    #[serde(default = "default_image_retry_base_ms")]
    pub image_retry_base_ms: u64,

    /// Multiplier applied to the delay after each failed attempt
    #[serde(default = "default_image_backoff_factor")]
    pub image_backoff_factor: f64,

    /// Negative prompt forwarded to the image generator
    #[serde(default = "default_negative_prompt")]
    pub negative_prompt: String,

    /// Optional LoRA weights forwarded to the image generator
    #[serde(default)]
    pub lora: Option<String>,
}

/// Card asset and storage settings
#[derive(Debug, Clone, Deserialize)]
pub struct CardSettings {
    /// Templates, icons, foils, fonts and JSON word lists
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// Root of the per-user artifact tree
    #[serde(default = "default_users_dir")]
    pub users_dir: PathBuf,

    /// Web page that flips through a stored pack
    #[serde(default = "default_pack_viewer_url")]
    pub pack_viewer_url: String,

    /// Holder printed in the copyright line
    #[serde(default = "default_copyright")]
    pub copyright: String,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to log to file
    #[serde(default)]
    pub file_enabled: bool,

    /// Log file path (if file_enabled is true)
    pub file_path: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_user_queue_depth() -> u32 {
    1
}

fn default_twitch_channel() -> String {
    "lighty".to_string()
}

fn default_reward_name() -> String {
    "Lighty Card".to_string()
}

fn default_bot_nick() -> String {
    "lightybot".to_string()
}

fn default_text_command() -> Vec<String> {
    vec!["python".to_string(), "generators/text_stdio.py".to_string()]
}

fn default_image_command() -> Vec<String> {
    vec!["python".to_string(), "generators/image_stdio.py".to_string()]
}

fn default_image_max_attempts() -> u32 {
    5
}

fn default_image_retry_base_ms() -> u64 {
    2000
}

fn default_image_backoff_factor() -> f64 {
    2.0
}

fn default_negative_prompt() -> String {
    "flash photography, suit, film grain".to_string()
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_users_dir() -> PathBuf {
    PathBuf::from("users")
}

fn default_pack_viewer_url() -> String {
    "http://theblackgoat.net/cardflip-dynamic.html".to_string()
}

fn default_copyright() -> String {
    "Lightys Homeless Shelter".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            user_queue_depth: default_user_queue_depth(),
            banned_users: IdentityList::default(),
        }
    }
}

impl Default for TwitchSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            channel: default_twitch_channel(),
            channel_id: 0,
            reward_name: default_reward_name(),
            bot_nick: default_bot_nick(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            text_command: default_text_command(),
            image_command: default_image_command(),
            timeout_seconds: None,
            image_max_attempts: default_image_max_attempts(),
            image_retry_base_ms: default_image_retry_base_ms(),
            image_backoff_factor: default_image_backoff_factor(),
            negative_prompt: default_negative_prompt(),
            lora: None,
        }
    }
}

impl Default for CardSettings {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            users_dir: default_users_dir(),
            pack_viewer_url: default_pack_viewer_url(),
            copyright: default_copyright(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: false,
            file_path: None,
        }
    }
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Directory holding `config.toml` and the Twitch token store.
    ///
    /// `LIGHTY_CONFIG_DIR` overrides the XDG location `~/.config/lighty`.
    pub fn config_dir() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("LIGHTY_CONFIG_DIR") {
            return Ok(PathBuf::from(override_dir));
        }

        Ok(dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("lighty"))
    }

    pub fn config_path() -> Result<PathBuf, SettingsError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Where refreshed Twitch tokens are persisted.
    pub fn token_store_path() -> Result<PathBuf, SettingsError> {
        Ok(Self::config_dir()?.join("twitch-tokens.toml"))
    }

    fn create_default_config(path: &PathBuf) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, DEFAULT_CONFIG_TOML)?;

        Ok(())
    }

    /// True when user actions are enabled and `identity` is not banned.
    pub fn is_enabled_not_banned(&self, identity: &str) -> bool {
        self.bot.enabled && !self.bot.banned_users.contains(identity)
    }
}
